//! 标签子模块
//!
//! ## 职责
//! - 管理条目与标签的关联关系（`entry_tags`）
//! - 同一条目的标签去重，保留首次添加的顺序
//!
//! ## 错误语义
//! - 查询与写入失败统一映射为 `AppError::Database`
//! - 条目不存在返回 `None`，不是错误

use rusqlite::{Connection, params};

use crate::error::AppError;

use super::DbState;

fn entry_exists(conn: &Connection, entry_id: i64) -> Result<bool, AppError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM clipboard_items WHERE id = ?1",
            params![entry_id],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Database(format!("检查条目存在失败: {}", e)))?;
    Ok(count > 0)
}

fn entry_tags(conn: &Connection, entry_id: i64) -> Result<Vec<String>, AppError> {
    let mut stmt = conn
        .prepare("SELECT tag FROM entry_tags WHERE entry_id = ?1 ORDER BY rowid")
        .map_err(|e| AppError::Database(format!("准备查询失败: {}", e)))?;

    let tags = stmt
        .query_map(params![entry_id], |row| row.get::<_, String>(0))
        .map_err(|e| AppError::Database(format!("查询标签失败: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(format!("读取行失败: {}", e)))?;

    Ok(tags)
}

fn add_tag(conn: &Connection, entry_id: i64, tag: &str) -> Result<Option<Vec<String>>, AppError> {
    if !entry_exists(conn, entry_id)? {
        return Ok(None);
    }

    // 主键 (entry_id, tag) 天然去重，重复添加是无操作
    conn.execute(
        "INSERT OR IGNORE INTO entry_tags (entry_id, tag) VALUES (?1, ?2)",
        params![entry_id, tag],
    )
    .map_err(|e| AppError::Database(format!("添加标签失败: {}", e)))?;

    entry_tags(conn, entry_id).map(Some)
}

fn remove_tag(conn: &Connection, entry_id: i64, tag: &str) -> Result<Option<Vec<String>>, AppError> {
    if !entry_exists(conn, entry_id)? {
        return Ok(None);
    }

    conn.execute(
        "DELETE FROM entry_tags WHERE entry_id = ?1 AND tag = ?2",
        params![entry_id, tag],
    )
    .map_err(|e| AppError::Database(format!("移除标签失败: {}", e)))?;

    entry_tags(conn, entry_id).map(Some)
}

fn all_tags(conn: &Connection) -> Result<Vec<String>, AppError> {
    let mut stmt = conn
        .prepare("SELECT DISTINCT tag FROM entry_tags ORDER BY tag ASC")
        .map_err(|e| AppError::Database(format!("准备查询失败: {}", e)))?;

    let tags = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| AppError::Database(format!("查询标签失败: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(format!("读取行失败: {}", e)))?;

    Ok(tags)
}

// ============================================================================
// 对外包装
// ============================================================================

pub fn db_entry_tags(state: &DbState, entry_id: i64) -> Result<Option<Vec<String>>, AppError> {
    super::with_conn(state, |conn| {
        if !entry_exists(conn, entry_id)? {
            return Ok(None);
        }
        entry_tags(conn, entry_id).map(Some)
    })
}

pub fn db_add_tag(state: &DbState, entry_id: i64, tag: &str) -> Result<Option<Vec<String>>, AppError> {
    super::with_conn(state, |conn| add_tag(conn, entry_id, tag))
}

pub fn db_remove_tag(state: &DbState, entry_id: i64, tag: &str) -> Result<Option<Vec<String>>, AppError> {
    super::with_conn(state, |conn| remove_tag(conn, entry_id, tag))
}

pub fn db_all_tags(state: &DbState) -> Result<Vec<String>, AppError> {
    super::with_conn(state, all_tags)
}
