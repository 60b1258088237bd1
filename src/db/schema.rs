//! Schema 初始化子模块
//!
//! ## 职责
//! - 创建/迁移数据库表结构与索引
//! - 设置 SQLite 运行参数（WAL、外键）
//!
//! ## 输入/输出
//! - 输入：`&Connection`
//! - 输出：`Result<(), AppError>`
//!
//! ## 错误语义
//! - DDL 失败统一映射为 `AppError::Database`

use rusqlite::Connection;

use crate::error::AppError;

const SCHEMA_VERSION: i64 = 1;

fn get_user_version(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| AppError::Database(format!("读取数据库版本失败: {}", e)))
}

fn set_user_version(conn: &Connection, version: i64) -> Result<(), AppError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| AppError::Database(format!("写入数据库版本失败: {}", e)))
}

fn create_base_tables(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS clipboard_items (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content BLOB NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('text', 'image')),
            timestamp INTEGER NOT NULL,
            favorite INTEGER NOT NULL DEFAULT 0 CHECK (favorite IN (0, 1))
        );
        CREATE TABLE IF NOT EXISTS entry_tags (
            entry_id INTEGER NOT NULL,
            tag TEXT NOT NULL,
            PRIMARY KEY (entry_id, tag),
            FOREIGN KEY (entry_id) REFERENCES clipboard_items(id) ON DELETE CASCADE
        );",
    )
    .map_err(|e| AppError::Database(format!("创建基础表失败: {}", e)))?;

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_items_timestamp ON clipboard_items(timestamp);
         CREATE INDEX IF NOT EXISTS idx_items_favorite_timestamp ON clipboard_items(favorite, timestamp DESC);
         CREATE INDEX IF NOT EXISTS idx_entry_tags_entry_id ON entry_tags(entry_id);",
    )
    .map_err(|e| AppError::Database(format!("创建索引失败: {}", e)))?;

    Ok(())
}

pub(super) fn initialize_schema(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .ok();

    create_base_tables(conn)?;

    let mut version = get_user_version(conn)?;
    if version < 1 {
        set_user_version(conn, 1)?;
        version = 1;
    }

    if version != SCHEMA_VERSION {
        return Err(AppError::Database(format!(
            "数据库版本不匹配: current={}, expected={}",
            version, SCHEMA_VERSION
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rusqlite::Connection;

    use super::initialize_schema;

    #[test]
    fn initialize_schema_is_idempotent() {
        let conn = Connection::open_in_memory().expect("create memory db");

        initialize_schema(&conn).expect("first init should succeed");
        initialize_schema(&conn).expect("second init should succeed");

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='clipboard_items'",
                [],
                |row| row.get(0),
            )
            .expect("query table count");

        let tags_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='entry_tags'",
                [],
                |row| row.get(0),
            )
            .expect("query entry_tags table count");

        assert_eq!(count, 1, "clipboard_items table should exist exactly once");
        assert_eq!(tags_count, 1, "entry_tags table should exist exactly once");
    }

    #[test]
    fn initialize_schema_creates_expected_columns_and_indexes() {
        let conn = Connection::open_in_memory().expect("create memory db");
        initialize_schema(&conn).expect("init should succeed");

        let mut stmt = conn
            .prepare("PRAGMA table_info(clipboard_items)")
            .expect("prepare table_info");
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query columns")
            .collect::<Result<Vec<_>, _>>()
            .expect("collect columns");
        let column_set: HashSet<String> = columns.into_iter().collect();

        for required in ["id", "content", "kind", "timestamp", "favorite"] {
            assert!(
                column_set.contains(required),
                "missing required column: {required}"
            );
        }

        let mut index_stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
            .expect("prepare index query");
        let index_names = index_stmt
            .query_map([], |row| row.get::<_, String>(0))
            .expect("query indexes")
            .collect::<Result<Vec<_>, _>>()
            .expect("collect indexes");
        let index_set: HashSet<String> = index_names.into_iter().collect();

        for required in [
            "idx_items_timestamp",
            "idx_items_favorite_timestamp",
            "idx_entry_tags_entry_id",
        ] {
            assert!(
                index_set.contains(required),
                "missing required index: {required}"
            );
        }

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .expect("query user_version");
        assert_eq!(version, super::SCHEMA_VERSION);
    }

    #[test]
    fn initialize_schema_enforces_kind_and_favorite_checks() {
        let conn = Connection::open_in_memory().expect("create memory db");
        initialize_schema(&conn).expect("init should succeed");

        let invalid_kind = conn.execute(
            "INSERT INTO clipboard_items (content, kind, timestamp) VALUES (?1, ?2, ?3)",
            (b"x".as_slice(), "video", 1_i64),
        );
        assert!(invalid_kind.is_err(), "CHECK 约束应拒绝未知类型");

        let invalid_favorite = conn.execute(
            "INSERT INTO clipboard_items (content, kind, timestamp, favorite) VALUES (?1, ?2, ?3, ?4)",
            (b"x".as_slice(), "text", 1_i64, 2_i32),
        );
        assert!(invalid_favorite.is_err(), "CHECK 约束应拒绝无效收藏标志");
    }
}
