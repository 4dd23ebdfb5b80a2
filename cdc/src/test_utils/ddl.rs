use crate::types::{ActionType, DdlJob, SchemaId, TableId, TableInfo, Ts};

/// Name of the schema every test table lives in.
pub const TEST_SCHEMA: &str = "test";

/// Id of [`TEST_SCHEMA`].
pub const TEST_SCHEMA_ID: SchemaId = 1;

/// Creates the descriptor of a plain table in [`TEST_SCHEMA`].
pub fn test_table(name: &str, table_id: TableId) -> TableInfo {
    TableInfo::new(TEST_SCHEMA, name, table_id).with_columns(["id"])
}

fn job(action: ActionType, table_id: TableId, commit_ts: Ts, query: String) -> DdlJob {
    DdlJob {
        id: commit_ts as i64,
        action,
        schema_id: TEST_SCHEMA_ID,
        schema_name: TEST_SCHEMA.to_string(),
        table_id,
        query,
        commit_ts,
        table_infos: Vec::new(),
    }
}

pub fn create_schema_job(schema_id: SchemaId, schema: &str, commit_ts: Ts) -> DdlJob {
    DdlJob {
        schema_id,
        schema_name: schema.to_string(),
        ..job(
            ActionType::CreateSchema,
            0,
            commit_ts,
            format!("CREATE DATABASE `{schema}`"),
        )
    }
}

pub fn create_table_job(table: &TableInfo, commit_ts: Ts) -> DdlJob {
    DdlJob {
        table_infos: vec![table.clone()],
        ..job(
            ActionType::CreateTable,
            table.id,
            commit_ts,
            format!("CREATE TABLE {} (id INT PRIMARY KEY)", table.name),
        )
    }
}

pub fn drop_table_job(table: &TableInfo, commit_ts: Ts) -> DdlJob {
    job(
        ActionType::DropTable,
        table.id,
        commit_ts,
        format!("DROP TABLE {}", table.name),
    )
}

/// Adds `column` to `table` and returns the job together with the new descriptor.
pub fn add_column_job(table: &TableInfo, column: &str, commit_ts: Ts) -> (DdlJob, TableInfo) {
    let mut altered = table.clone();
    altered.columns.push(column.to_string());

    let job = DdlJob {
        table_infos: vec![altered.clone()],
        ..job(
            ActionType::AddColumn,
            table.id,
            commit_ts,
            format!("ALTER TABLE {} ADD COLUMN `{column}` INT", table.name),
        )
    };

    (job, altered)
}

/// Creates a job of a non-global `action` that keeps the descriptor of `table` unchanged.
pub fn table_job(action: ActionType, table: &TableInfo, commit_ts: Ts) -> DdlJob {
    DdlJob {
        table_infos: vec![table.clone()],
        ..job(
            action,
            table.id,
            commit_ts,
            format!("{} on {}", action.as_str().to_uppercase(), table.name),
        )
    }
}

pub fn rename_table_job(table: &TableInfo, new_name: &str, commit_ts: Ts) -> (DdlJob, TableInfo) {
    let mut renamed = table.clone();
    renamed.name.table = new_name.to_string();

    let job = DdlJob {
        table_infos: vec![renamed.clone()],
        ..job(
            ActionType::RenameTable,
            table.id,
            commit_ts,
            format!(
                "RENAME TABLE {} TO `{}`.`{new_name}`",
                table.name, table.name.schema
            ),
        )
    };

    (job, renamed)
}

pub fn truncate_table_job(
    table: &TableInfo,
    new_table_id: TableId,
    commit_ts: Ts,
) -> (DdlJob, TableInfo) {
    let mut truncated = table.clone();
    truncated.id = new_table_id;
    truncated.name.table_id = new_table_id;

    let job = DdlJob {
        table_infos: vec![truncated.clone()],
        ..job(
            ActionType::TruncateTable,
            table.id,
            commit_ts,
            format!("TRUNCATE TABLE {}", table.name),
        )
    };

    (job, truncated)
}
