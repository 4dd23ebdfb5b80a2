use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{SchemaId, TableId, TableInfo, TableName, Ts};

/// Kind of a schema change.
///
/// Every kind is classified as either global or non-global by [`ActionType::is_global`]. A
/// non-global DDL is known to affect only the table it names, so only that table has to be
/// held back before executing it. A global DDL may affect any table of the changefeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    // Schema level.
    CreateSchema,
    DropSchema,
    ModifySchemaCharsetAndCollate,

    // Table lifecycle.
    CreateTable,
    CreateTables,
    DropTable,
    TruncateTable,
    RecoverTable,
    RenameTable,
    RenameTables,
    CreateView,
    DropView,

    // Columns and indexes.
    AddColumn,
    DropColumn,
    ModifyColumn,
    SetDefaultValue,
    AddIndex,
    DropIndex,
    RenameIndex,
    AddPrimaryKey,
    DropPrimaryKey,
    AlterIndexVisibility,
    MultiSchemaChange,

    // Table options.
    ModifyTableComment,
    ModifyTableCharsetAndCollate,
    RebaseAutoId,
    AlterTtlInfo,
    AlterTtlRemove,

    // Partitions.
    AddTablePartition,
    DropTablePartition,
    TruncateTablePartition,
    ReorganizePartition,
    ExchangeTablePartition,
}

impl ActionType {
    /// Returns `true` when the DDL may affect tables other than the one it names.
    pub fn is_global(&self) -> bool {
        match self {
            ActionType::DropTable
            | ActionType::TruncateTable
            | ActionType::RecoverTable
            | ActionType::CreateView
            | ActionType::DropView
            | ActionType::AddColumn
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
            | ActionType::ReorganizePartition => false,
            // A created table has no pipeline yet, so nothing could hold it back locally.
            ActionType::CreateSchema
            | ActionType::DropSchema
            | ActionType::ModifySchemaCharsetAndCollate
            | ActionType::CreateTable
            | ActionType::CreateTables
            | ActionType::RenameTable
            | ActionType::RenameTables
            | ActionType::ExchangeTablePartition => true,
        }
    }

    /// Returns `true` for DDL that operate on a whole schema rather than on a table.
    pub fn is_schema_level(&self) -> bool {
        matches!(
            self,
            ActionType::CreateSchema
                | ActionType::DropSchema
                | ActionType::ModifySchemaCharsetAndCollate
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateSchema => "create schema",
            ActionType::DropSchema => "drop schema",
            ActionType::ModifySchemaCharsetAndCollate => "modify schema charset and collate",
            ActionType::CreateTable => "create table",
            ActionType::CreateTables => "create tables",
            ActionType::DropTable => "drop table",
            ActionType::TruncateTable => "truncate table",
            ActionType::RecoverTable => "recover table",
            ActionType::RenameTable => "rename table",
            ActionType::RenameTables => "rename tables",
            ActionType::CreateView => "create view",
            ActionType::DropView => "drop view",
            ActionType::AddColumn => "add column",
            ActionType::DropColumn => "drop column",
            ActionType::ModifyColumn => "modify column",
            ActionType::SetDefaultValue => "set default value",
            ActionType::AddIndex => "add index",
            ActionType::DropIndex => "drop index",
            ActionType::RenameIndex => "rename index",
            ActionType::AddPrimaryKey => "add primary key",
            ActionType::DropPrimaryKey => "drop primary key",
            ActionType::AlterIndexVisibility => "alter index visibility",
            ActionType::MultiSchemaChange => "multi-schema change",
            ActionType::ModifyTableComment => "modify table comment",
            ActionType::ModifyTableCharsetAndCollate => "modify table charset and collate",
            ActionType::RebaseAutoId => "rebase auto id",
            ActionType::AlterTtlInfo => "alter ttl info",
            ActionType::AlterTtlRemove => "alter ttl remove",
            ActionType::AddTablePartition => "add table partition",
            ActionType::DropTablePartition => "drop table partition",
            ActionType::TruncateTablePartition => "truncate table partition",
            ActionType::ReorganizePartition => "reorganize partition",
            ActionType::ExchangeTablePartition => "exchange table partition",
        }
    }

    /// All action kinds, in declaration order.
    pub const ALL: [ActionType; 33] = [
        ActionType::CreateSchema,
        ActionType::DropSchema,
        ActionType::ModifySchemaCharsetAndCollate,
        ActionType::CreateTable,
        ActionType::CreateTables,
        ActionType::DropTable,
        ActionType::TruncateTable,
        ActionType::RecoverTable,
        ActionType::RenameTable,
        ActionType::RenameTables,
        ActionType::CreateView,
        ActionType::DropView,
        ActionType::AddColumn,
        ActionType::DropColumn,
        ActionType::ModifyColumn,
        ActionType::SetDefaultValue,
        ActionType::AddIndex,
        ActionType::DropIndex,
        ActionType::RenameIndex,
        ActionType::AddPrimaryKey,
        ActionType::DropPrimaryKey,
        ActionType::AlterIndexVisibility,
        ActionType::MultiSchemaChange,
        ActionType::ModifyTableComment,
        ActionType::ModifyTableCharsetAndCollate,
        ActionType::RebaseAutoId,
        ActionType::AlterTtlInfo,
        ActionType::AlterTtlRemove,
        ActionType::AddTablePartition,
        ActionType::DropTablePartition,
        ActionType::TruncateTablePartition,
        ActionType::ReorganizePartition,
        ActionType::ExchangeTablePartition,
    ];
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished schema change job pulled from the upstream DDL stream.
///
/// `table_infos` holds the post-change descriptors of every table the job touches: one for
/// most table DDL, several for [`ActionType::RenameTables`] and [`ActionType::CreateTables`],
/// the partitioned table followed by the exchanged table for
/// [`ActionType::ExchangeTablePartition`], and none for schema level DDL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdlJob {
    pub id: i64,
    pub action: ActionType,
    pub schema_id: SchemaId,
    pub schema_name: String,
    /// Id of the table the job was issued against, before the change.
    pub table_id: TableId,
    pub query: String,
    pub commit_ts: Ts,
    pub table_infos: Vec<TableInfo>,
}

/// A schema change ready to be replicated downstream.
///
/// Events are immutable once built by the schema store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdlEvent {
    pub commit_ts: Ts,
    pub action: ActionType,
    /// Descriptor of the table after the change.
    pub table_info: TableInfo,
    /// Descriptor of the table before the change, set for renames, truncates and partition
    /// exchanges.
    pub pre_table_info: Option<TableInfo>,
    pub query: String,
}

impl DdlEvent {
    pub fn table_name(&self) -> &TableName {
        &self.table_info.name
    }

    pub fn is_global(&self) -> bool {
        self.action.is_global()
    }

    /// Returns the physical tables a non-global DDL blocks.
    ///
    /// The pre-change descriptor wins when present, so the table keeps being blocked under
    /// the identity it had upstream until the DDL lands.
    pub fn blocked_physical_table_ids(&self) -> Vec<TableId> {
        self.pre_table_info
            .as_ref()
            .unwrap_or(&self.table_info)
            .physical_table_ids()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_action_kind_has_exactly_one_class() {
        let all: HashSet<ActionType> = ActionType::ALL.into_iter().collect();
        assert_eq!(all.len(), ActionType::ALL.len());

        let global: Vec<_> = ActionType::ALL
            .into_iter()
            .filter(|action| action.is_global())
            .collect();
        let non_global: Vec<_> = ActionType::ALL
            .into_iter()
            .filter(|action| !action.is_global())
            .collect();

        assert_eq!(global.len() + non_global.len(), ActionType::ALL.len());
        assert_eq!(
            global,
            vec![
                ActionType::CreateSchema,
                ActionType::DropSchema,
                ActionType::ModifySchemaCharsetAndCollate,
                ActionType::CreateTable,
                ActionType::CreateTables,
                ActionType::RenameTable,
                ActionType::RenameTables,
                ActionType::ExchangeTablePartition,
            ]
        );
    }

    #[test]
    fn schema_level_actions_are_global() {
        for action in ActionType::ALL {
            if action.is_schema_level() {
                assert!(action.is_global(), "{action} should be global");
            }
        }
    }

    #[test]
    fn rename_blocks_the_pre_change_identity() {
        let event = DdlEvent {
            commit_ts: 10,
            action: ActionType::TruncateTable,
            table_info: TableInfo::new("test", "t1", 2).with_partitions(vec![3]),
            pre_table_info: Some(TableInfo::new("test", "t1", 1).with_partitions(vec![4, 5])),
            query: "TRUNCATE TABLE t1".to_string(),
        };

        assert_eq!(event.blocked_physical_table_ids(), vec![1, 4, 5]);
    }
}
