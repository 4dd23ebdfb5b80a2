use tracing::debug;

use crate::error::CdcResult;
use crate::schema::SchemaStore;
use crate::types::{TableId, TableInfo, Ts};

/// Memoized table listings of the schema store.
///
/// Both listings are computed at most once between two invalidations. Invalidation must
/// happen after every schema mutation.
#[derive(Debug, Default)]
pub(crate) struct TableCache {
    tables: Option<Vec<TableInfo>>,
    physical_table_ids: Option<Vec<TableId>>,
}

impl TableCache {
    pub(crate) async fn tables<S>(
        &mut self,
        schema: &S,
        snapshot_ts: Ts,
    ) -> CdcResult<&[TableInfo]>
    where
        S: SchemaStore,
    {
        if self.tables.is_none() {
            let tables = schema.all_tables(snapshot_ts).await?;
            debug!(snapshot_ts, tables = tables.len(), "changefeed tables refreshed");
            self.tables = Some(tables);
        }

        Ok(self.tables.as_deref().unwrap_or_default())
    }

    pub(crate) async fn physical_table_ids<S>(
        &mut self,
        schema: &S,
        snapshot_ts: Ts,
    ) -> CdcResult<&[TableId]>
    where
        S: SchemaStore,
    {
        if self.physical_table_ids.is_none() {
            let physical_table_ids = schema.all_physical_tables(snapshot_ts).await?;
            debug!(
                snapshot_ts,
                physical_tables = physical_table_ids.len(),
                "changefeed physical tables refreshed"
            );
            self.physical_table_ids = Some(physical_table_ids);
        }

        Ok(self.physical_table_ids.as_deref().unwrap_or_default())
    }

    pub(crate) fn invalidate(&mut self) {
        self.tables = None;
        self.physical_table_ids = None;
    }

    #[cfg(test)]
    fn is_empty(&self) -> bool {
        self.tables.is_none() && self.physical_table_ids.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MemorySchemaStore, SchemaSnapshot};

    #[tokio::test]
    async fn listings_are_memoized_until_invalidated() {
        let snapshot = SchemaSnapshot::default()
            .with_schema(1, "test")
            .with_table(TableInfo::new("test", "t1", 10));
        let schema = MemorySchemaStore::new(100, snapshot);
        let mut cache = TableCache::default();
        assert!(cache.is_empty());

        assert_eq!(cache.physical_table_ids(&schema, 100).await.unwrap(), &[10]);
        assert!(!cache.is_empty());

        // The cached listing is returned even for a ts the store cannot serve.
        assert_eq!(cache.physical_table_ids(&schema, 1).await.unwrap(), &[10]);

        cache.invalidate();
        assert!(cache.is_empty());
        assert!(cache.physical_table_ids(&schema, 1).await.is_err());
        assert_eq!(cache.tables(&schema, 100).await.unwrap().len(), 1);
    }
}
