use crate::infrastructure::error::InfraError;
use rusqlite::Connection;
use std::path::Path;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn initialize_database_creates_snapshot_table_and_is_idempotent() {
        let dir = std::env::temp_dir().join(format!("pomocycle-storage-tests-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("create temp dir");
        let path = dir.join("schema.sqlite");

        initialize_database(&path).expect("first initialization");
        initialize_database(&path).expect("second initialization");

        let connection = Connection::open(&path).expect("open database");
        let tables: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'snapshots'",
                [],
                |row| row.get(0),
            )
            .expect("query sqlite_master");
        assert_eq!(tables, 1);

        let _ = fs::remove_dir_all(&dir);
    }
}
