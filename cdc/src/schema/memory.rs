use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{CdcResult, ErrorKind};
use crate::schema::SchemaStore;
use crate::types::{ActionType, DdlEvent, DdlJob, SchemaId, TableId, TableInfo, Ts};
use crate::{bail, cdc_error};

/// State of all schemas and tables at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSnapshot {
    schemas: BTreeMap<SchemaId, String>,
    tables: BTreeMap<TableId, TableInfo>,
}

impl SchemaSnapshot {
    pub fn with_schema(mut self, schema_id: SchemaId, name: impl Into<String>) -> Self {
        self.schemas.insert(schema_id, name.into());
        self
    }

    pub fn with_table(mut self, table_info: TableInfo) -> Self {
        self.tables.insert(table_info.id, table_info);
        self
    }

    pub fn table(&self, table_id: TableId) -> Option<&TableInfo> {
        self.tables.get(&table_id)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables.values()
    }

    pub fn schema_name(&self, schema_id: SchemaId) -> Option<&str> {
        self.schemas.get(&schema_id).map(String::as_str)
    }

    /// Returns tables that can be replicated, ordered by id.
    fn replicated_tables(&self) -> impl Iterator<Item = &TableInfo> {
        self.tables
            .values()
            .filter(|table| !table.is_view && table.has_unique_key)
    }

    fn existing_table(&self, job: &DdlJob, table_id: TableId) -> CdcResult<&TableInfo> {
        self.tables.get(&table_id).ok_or_else(|| {
            cdc_error!(
                ErrorKind::SchemaStoreError,
                "Table referenced by DDL job does not exist",
                format!(
                    "job {} ({}) references table {} which is not in the schema",
                    job.id, job.action, table_id
                )
            )
        })
    }

    fn insert_new_table(&mut self, job: &DdlJob, table_info: &TableInfo) -> CdcResult<()> {
        if self.tables.contains_key(&table_info.id) {
            bail!(
                ErrorKind::SchemaStoreError,
                "Table created by DDL job already exists",
                format!(
                    "job {} ({}) creates table {} with id {} which already exists",
                    job.id, job.action, table_info.name, table_info.id
                )
            );
        }

        self.tables.insert(table_info.id, table_info.clone());
        Ok(())
    }

    fn replace_table(&mut self, job: &DdlJob, table_info: &TableInfo) -> CdcResult<()> {
        self.existing_table(job, table_info.id)?;
        self.tables.insert(table_info.id, table_info.clone());
        Ok(())
    }

    fn remove_table(&mut self, job: &DdlJob, table_id: TableId) -> CdcResult<TableInfo> {
        self.existing_table(job, table_id)?;
        self.tables.remove(&table_id).ok_or_else(|| {
            cdc_error!(
                ErrorKind::SchemaStoreError,
                "Table removed by DDL job does not exist"
            )
        })
    }

    /// Applies `job` on top of this snapshot.
    fn apply(&mut self, job: &DdlJob) -> CdcResult<()> {
        match job.action {
            ActionType::CreateSchema => {
                self.schemas.insert(job.schema_id, job.schema_name.clone());
            }
            ActionType::DropSchema => {
                if self.schemas.remove(&job.schema_id).is_none() {
                    bail!(
                        ErrorKind::SchemaStoreError,
                        "Schema dropped by DDL job does not exist",
                        format!("job {} drops unknown schema {}", job.id, job.schema_name)
                    );
                }
                self.tables
                    .retain(|_, table| table.name.schema != job.schema_name);
            }
            ActionType::ModifySchemaCharsetAndCollate => {
                if !self.schemas.contains_key(&job.schema_id) {
                    bail!(
                        ErrorKind::SchemaStoreError,
                        "Schema altered by DDL job does not exist",
                        format!("job {} alters unknown schema {}", job.id, job.schema_name)
                    );
                }
            }
            ActionType::CreateTable
            | ActionType::CreateTables
            | ActionType::CreateView
            | ActionType::RecoverTable => {
                for table_info in post_table_infos(job)? {
                    self.insert_new_table(job, table_info)?;
                }
            }
            ActionType::DropTable | ActionType::DropView => {
                self.remove_table(job, job.table_id)?;
            }
            ActionType::TruncateTable | ActionType::RenameTable => {
                let table_info = post_table_info(job)?;
                self.remove_table(job, job.table_id)?;
                self.insert_new_table(job, table_info)?;
            }
            ActionType::RenameTables => {
                for table_info in post_table_infos(job)? {
                    self.replace_table(job, table_info)?;
                }
            }
            ActionType::ExchangeTablePartition => {
                let table_infos = post_table_infos(job)?;
                self.remove_table(job, job.table_id)?;
                for table_info in table_infos {
                    self.tables.insert(table_info.id, table_info.clone());
                }
            }
            ActionType::AddColumn
            | ActionType::DropColumn
            | ActionType::ModifyColumn
            | ActionType::SetDefaultValue
            | ActionType::AddIndex
            | ActionType::DropIndex
            | ActionType::RenameIndex
            | ActionType::AddPrimaryKey
            | ActionType::DropPrimaryKey
            | ActionType::AlterIndexVisibility
            | ActionType::MultiSchemaChange
            | ActionType::ModifyTableComment
            | ActionType::ModifyTableCharsetAndCollate
            | ActionType::RebaseAutoId
            | ActionType::AlterTtlInfo
            | ActionType::AlterTtlRemove
            | ActionType::AddTablePartition
            | ActionType::DropTablePartition
            | ActionType::TruncateTablePartition
            | ActionType::ReorganizePartition => {
                self.replace_table(job, post_table_info(job)?)?;
            }
        }

        Ok(())
    }
}

/// Returns the post-change descriptors of a job, failing when it carries none.
fn post_table_infos(job: &DdlJob) -> CdcResult<&[TableInfo]> {
    if job.table_infos.is_empty() {
        bail!(
            ErrorKind::InvalidDdlJob,
            "DDL job carries no table descriptor",
            format!("job {} ({}) has no table descriptor", job.id, job.action)
        );
    }

    Ok(&job.table_infos)
}

fn post_table_info(job: &DdlJob) -> CdcResult<&TableInfo> {
    post_table_infos(job).map(|table_infos| &table_infos[0])
}

/// In-memory, multi-version [`SchemaStore`].
///
/// Every applied job creates a new [`SchemaSnapshot`] keyed by the job's commit ts. Reads at
/// a ts use the newest snapshot at or below it. Garbage collection keeps the newest snapshot
/// at or below the gc ts so that reads at the gc ts itself keep working.
#[derive(Debug, Clone)]
pub struct MemorySchemaStore {
    versions: BTreeMap<Ts, Arc<SchemaSnapshot>>,
    resolved_ts: Ts,
    gc_ts: Ts,
}

impl MemorySchemaStore {
    /// Creates a store whose first version is `snapshot` at `start_ts`.
    pub fn new(start_ts: Ts, snapshot: SchemaSnapshot) -> Self {
        let mut versions = BTreeMap::new();
        versions.insert(start_ts, Arc::new(snapshot));

        Self {
            versions,
            resolved_ts: start_ts,
            gc_ts: 0,
        }
    }

    pub fn resolved_ts(&self) -> Ts {
        self.resolved_ts
    }

    pub fn gc_ts(&self) -> Ts {
        self.gc_ts
    }

    /// Returns the commit ts of the newest applied version.
    pub fn handled_ts(&self) -> Ts {
        self.versions.keys().next_back().copied().unwrap_or_default()
    }

    /// Returns the commit ts of every retained version, ascending.
    pub fn version_timestamps(&self) -> Vec<Ts> {
        self.versions.keys().copied().collect()
    }

    /// Returns the newest snapshot.
    pub fn latest(&self) -> Arc<SchemaSnapshot> {
        self.versions
            .values()
            .next_back()
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the snapshot valid at `ts`.
    pub fn snapshot_at(&self, ts: Ts) -> CdcResult<Arc<SchemaSnapshot>> {
        if ts < self.gc_ts {
            bail!(
                ErrorKind::SnapshotLost,
                "Schema snapshot was garbage collected",
                format!("snapshot at {} requested but gc ts is {}", ts, self.gc_ts)
            );
        }

        match self.versions.range(..=ts).next_back() {
            Some((_, snapshot)) => Ok(snapshot.clone()),
            None => bail!(
                ErrorKind::SnapshotLost,
                "No schema version exists at the requested ts",
                format!("snapshot at {ts} requested before the first schema version")
            ),
        }
    }
}

impl SchemaStore for MemorySchemaStore {
    fn build_ddl_events(&self, job: &DdlJob) -> CdcResult<Vec<DdlEvent>> {
        if job.commit_ts <= self.handled_ts() {
            return Ok(Vec::new());
        }

        let snapshot = self.latest();
        let event = |table_info: TableInfo, pre_table_info: Option<TableInfo>, query: String| {
            DdlEvent {
                commit_ts: job.commit_ts,
                action: job.action,
                table_info,
                pre_table_info,
                query,
            }
        };

        let events = match job.action {
            ActionType::CreateSchema
            | ActionType::DropSchema
            | ActionType::ModifySchemaCharsetAndCollate => vec![event(
                TableInfo::schema_only(job.schema_name.clone(), job.schema_id),
                None,
                job.query.clone(),
            )],
            ActionType::DropTable | ActionType::DropView => {
                let dropped = snapshot.existing_table(job, job.table_id)?.clone();
                vec![event(dropped, None, job.query.clone())]
            }
            ActionType::RenameTable
            | ActionType::TruncateTable
            | ActionType::ExchangeTablePartition => {
                let pre_table_info = snapshot.existing_table(job, job.table_id)?.clone();
                vec![event(
                    post_table_info(job)?.clone(),
                    Some(pre_table_info),
                    job.query.clone(),
                )]
            }
            ActionType::RenameTables => {
                let mut events = Vec::with_capacity(job.table_infos.len());
                for table_info in post_table_infos(job)? {
                    let pre_table_info = snapshot.existing_table(job, table_info.id)?.clone();
                    let query = format!(
                        "RENAME TABLE {} TO {}",
                        pre_table_info.name, table_info.name
                    );
                    events.push(event(table_info.clone(), Some(pre_table_info), query));
                }
                events
            }
            ActionType::CreateTables => {
                let table_infos = post_table_infos(job)?;
                let queries: Vec<&str> = job
                    .query
                    .split(';')
                    .map(str::trim)
                    .filter(|query| !query.is_empty())
                    .collect();

                table_infos
                    .iter()
                    .enumerate()
                    .map(|(index, table_info)| {
                        let query = if queries.len() == table_infos.len() {
                            queries[index].to_string()
                        } else {
                            job.query.clone()
                        };
                        event(table_info.clone(), None, query)
                    })
                    .collect()
            }
            _ => vec![event(
                post_table_info(job)?.clone(),
                None,
                job.query.clone(),
            )],
        };

        Ok(events)
    }

    fn handle_ddl(&mut self, job: &DdlJob) -> CdcResult<()> {
        let handled_ts = self.handled_ts();
        if job.commit_ts <= handled_ts {
            info!(
                job_id = job.id,
                commit_ts = job.commit_ts,
                handled_ts,
                "ignore a ddl job that is already part of the schema"
            );
            return Ok(());
        }

        let mut snapshot = SchemaSnapshot::clone(&self.latest());
        snapshot.apply(job)?;
        self.versions.insert(job.commit_ts, Arc::new(snapshot));

        debug!(
            job_id = job.id,
            commit_ts = job.commit_ts,
            action = %job.action,
            versions = self.versions.len(),
            "applied ddl job to schema"
        );

        Ok(())
    }

    async fn all_tables(&self, ts: Ts) -> CdcResult<Vec<TableInfo>> {
        let snapshot = self.snapshot_at(ts)?;
        Ok(snapshot.replicated_tables().cloned().collect())
    }

    async fn all_physical_tables(&self, ts: Ts) -> CdcResult<Vec<TableId>> {
        let snapshot = self.snapshot_at(ts)?;
        Ok(snapshot
            .replicated_tables()
            .flat_map(TableInfo::physical_table_ids)
            .collect())
    }

    fn is_ineligible_table_id(&self, table_id: TableId) -> bool {
        self.latest()
            .table(table_id)
            .is_some_and(|table| !table.is_view && !table.has_unique_key)
    }

    fn advance_resolved_ts(&mut self, resolved_ts: Ts) {
        self.resolved_ts = self.resolved_ts.max(resolved_ts);
    }

    fn do_gc(&mut self, ts: Ts) {
        let Some(&keep_from) = self.versions.range(..=ts).next_back().map(|(ts, _)| ts) else {
            return;
        };

        self.versions = self.versions.split_off(&keep_from);
        self.gc_ts = self.gc_ts.max(ts);

        debug!(
            gc_ts = self.gc_ts,
            versions = self.versions.len(),
            "schema versions garbage collected"
        );
    }
}
