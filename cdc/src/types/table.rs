use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identity of a table or of a single partition of a table.
pub type TableId = i64;

/// Numeric identity of a schema (database).
pub type SchemaId = i64;

/// Fully qualified name of a table.
///
/// Names are ordered by schema, then table, then id. The ordering is used to break ties
/// deterministically whenever several tables have pending DDL events at the same commit ts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableName {
    pub schema: String,
    pub table: String,
    pub table_id: TableId,
    pub is_partition: bool,
}

impl TableName {
    pub fn new(schema: impl Into<String>, table: impl Into<String>, table_id: TableId) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            table_id,
            is_partition: false,
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`.`{}`", self.schema, self.table)
    }
}

/// Partition layout of a partitioned table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionInfo {
    /// Ids of every partition, in definition order.
    pub definitions: Vec<TableId>,
}

/// Descriptor of a table at a given schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub id: TableId,
    pub name: TableName,
    pub columns: Vec<String>,
    pub partition: Option<PartitionInfo>,
    /// Whether the table has a primary key or a not-null unique key.
    ///
    /// Tables without one cannot be replicated row by row and are ineligible for capture.
    pub has_unique_key: bool,
    pub is_view: bool,
}

impl TableInfo {
    /// Creates the descriptor of a regular, non partitioned table with a primary key.
    pub fn new(schema: impl Into<String>, table: impl Into<String>, id: TableId) -> Self {
        Self {
            id,
            name: TableName::new(schema, table, id),
            columns: Vec::new(),
            partition: None,
            has_unique_key: true,
            is_view: false,
        }
    }

    /// Creates a descriptor standing for a whole schema.
    ///
    /// Schema level DDL (create/drop database) are not attached to a table, so their events
    /// carry a descriptor with an empty table name and the schema id.
    pub fn schema_only(schema: impl Into<String>, schema_id: SchemaId) -> Self {
        Self {
            id: schema_id,
            name: TableName::new(schema, "", schema_id),
            columns: Vec::new(),
            partition: None,
            has_unique_key: true,
            is_view: false,
        }
    }

    pub fn with_columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_partitions(mut self, partition_ids: Vec<TableId>) -> Self {
        self.partition = Some(PartitionInfo {
            definitions: partition_ids,
        });
        self
    }

    pub fn without_unique_key(mut self) -> Self {
        self.has_unique_key = false;
        self
    }

    pub fn as_view(mut self) -> Self {
        self.is_view = true;
        self
    }

    /// Returns the table id followed by the ids of all its partitions.
    pub fn physical_table_ids(&self) -> Vec<TableId> {
        let mut ids = Vec::with_capacity(1);
        ids.push(self.id);
        if let Some(partition) = &self.partition {
            ids.extend(partition.definitions.iter().copied());
        }

        ids
    }

    pub fn is_partitioned(&self) -> bool {
        self.partition.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_table_ids_expand_partitions() {
        let plain = TableInfo::new("test", "t1", 10);
        assert_eq!(plain.physical_table_ids(), vec![10]);

        let partitioned = TableInfo::new("test", "t2", 20).with_partitions(vec![21, 22, 23]);
        assert!(partitioned.is_partitioned());
        assert_eq!(partitioned.physical_table_ids(), vec![20, 21, 22, 23]);
    }

    #[test]
    fn table_names_order_by_schema_then_table() {
        let mut names = vec![
            TableName::new("b", "a", 1),
            TableName::new("a", "z", 2),
            TableName::new("a", "b", 3),
        ];
        names.sort();

        assert_eq!(names[0].to_string(), "`a`.`b`");
        assert_eq!(names[1].to_string(), "`a`.`z`");
        assert_eq!(names[2].to_string(), "`b`.`a`");
    }
}
