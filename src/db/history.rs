//! 历史条目子模块
//!
//! ## 职责
//! - 条目的插入、查询、删除、收藏切换与批量清理
//! - 查询统一按时间戳倒序返回（最新在前）
//!
//! ## 错误语义
//! - 查询与写入失败统一映射为 `AppError::Database`
//! - 缺失 id 返回 `None` / `false`，不是错误

use rusqlite::{Connection, ToSql, params, params_from_iter};

use crate::error::AppError;

use super::{ClipEntry, DbState, EntryKind};

/// 条目查询的过滤条件
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// 解码后文本内容的区分大小写子串匹配，只命中文本条目
    pub search: Option<String>,
    pub kind: Option<EntryKind>,
    pub favorites_only: bool,
}

const BASE_SELECT: &str = "
    SELECT c.id, c.content, c.kind, c.timestamp, c.favorite,
           COALESCE((
               SELECT json_group_array(tag)
               FROM (SELECT tag FROM entry_tags WHERE entry_id = c.id ORDER BY rowid)
           ), '[]') AS tags
    FROM clipboard_items c";

fn map_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<ClipEntry> {
    let kind_raw: String = row.get(2)?;
    let tags_json: String = row.get(5)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).unwrap_or_default();
    Ok(ClipEntry {
        id: row.get(0)?,
        content: row.get(1)?,
        // CHECK 约束保证只有两个取值，未知值按文本处理
        kind: EntryKind::parse(&kind_raw).unwrap_or(EntryKind::Text),
        timestamp: row.get(3)?,
        favorite: row.get::<_, i64>(4)? != 0,
        tags,
    })
}

fn add_entry(conn: &Connection, content: &[u8], kind: EntryKind) -> Result<i64, AppError> {
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT INTO clipboard_items (content, kind, timestamp, favorite) VALUES (?1, ?2, ?3, 0)",
        params![content, kind.as_str(), now],
    )
    .map_err(|e| AppError::Database(format!("插入条目失败: {}", e)))?;

    Ok(conn.last_insert_rowid())
}

fn recent_entries(conn: &Connection, limit: i64) -> Result<Vec<ClipEntry>, AppError> {
    if limit <= 0 {
        return Ok(Vec::new());
    }

    let sql = format!("{} ORDER BY c.timestamp DESC, c.id DESC LIMIT ?1", BASE_SELECT);
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| AppError::Database(format!("准备查询失败: {}", e)))?;

    let entries = stmt
        .query_map(params![limit], map_entry)
        .map_err(|e| AppError::Database(format!("查询最近条目失败: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(format!("读取行失败: {}", e)))?;

    Ok(entries)
}

fn list_entries(conn: &Connection, filter: &EntryFilter) -> Result<Vec<ClipEntry>, AppError> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut bound: Vec<Box<dyn ToSql>> = Vec::new();

    // 搜索只在文本条目的解码内容上进行，图片条目永不命中
    if filter.search.as_deref().is_some_and(|s| !s.trim().is_empty()) {
        clauses.push("c.kind = 'text'");
    }
    if let Some(kind) = filter.kind {
        clauses.push("c.kind = ?");
        bound.push(Box::new(kind.as_str().to_string()));
    }
    if filter.favorites_only {
        clauses.push("c.favorite = 1");
    }

    let mut sql = String::from(BASE_SELECT);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY c.timestamp DESC, c.id DESC");

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| AppError::Database(format!("准备查询失败: {}", e)))?;

    let entries = stmt
        .query_map(params_from_iter(bound.iter().map(|b| b.as_ref())), map_entry)
        .map_err(|e| AppError::Database(format!("查询条目失败: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(format!("读取行失败: {}", e)))?;

    // 子串匹配在解码后的文本上统一进行，避免依赖后端特定的 BLOB 搜索语义
    if let Some(needle) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        return Ok(entries
            .into_iter()
            .filter(|entry| entry.text().is_some_and(|text| text.contains(needle)))
            .collect());
    }

    Ok(entries)
}

fn get_entry(conn: &Connection, id: i64) -> Result<Option<ClipEntry>, AppError> {
    let sql = format!("{} WHERE c.id = ?1", BASE_SELECT);
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| AppError::Database(format!("准备查询失败: {}", e)))?;

    let mut rows = stmt
        .query_map(params![id], map_entry)
        .map_err(|e| AppError::Database(format!("查询条目失败: {}", e)))?;

    match rows.next() {
        Some(row) => Ok(Some(
            row.map_err(|e| AppError::Database(format!("读取行失败: {}", e)))?,
        )),
        None => Ok(None),
    }
}

fn delete_entry(conn: &Connection, id: i64) -> Result<bool, AppError> {
    let affected = conn
        .execute("DELETE FROM clipboard_items WHERE id = ?1", params![id])
        .map_err(|e| AppError::Database(format!("删除条目失败: {}", e)))?;
    Ok(affected > 0)
}

fn toggle_favorite(conn: &Connection, id: i64) -> Result<Option<bool>, AppError> {
    let affected = conn
        .execute(
            "UPDATE clipboard_items SET favorite = 1 - favorite WHERE id = ?1",
            params![id],
        )
        .map_err(|e| AppError::Database(format!("切换收藏失败: {}", e)))?;

    if affected == 0 {
        return Ok(None);
    }

    let favorite: i64 = conn
        .query_row(
            "SELECT favorite FROM clipboard_items WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Database(format!("读取收藏状态失败: {}", e)))?;

    Ok(Some(favorite != 0))
}

fn clear_history(conn: &Connection, keep_favorites: bool) -> Result<i64, AppError> {
    let affected = if keep_favorites {
        conn.execute("DELETE FROM clipboard_items WHERE favorite = 0", [])
    } else {
        conn.execute("DELETE FROM clipboard_items", [])
    }
    .map_err(|e| AppError::Database(format!("清理历史失败: {}", e)))?;

    log::info!("已清理 {} 条历史记录 (keep_favorites={})", affected, keep_favorites);
    Ok(affected as i64)
}

// ============================================================================
// 对外包装（按逻辑操作加锁）
// ============================================================================

pub fn db_add_entry(state: &DbState, content: &[u8], kind: EntryKind) -> Result<i64, AppError> {
    super::with_conn(state, |conn| add_entry(conn, content, kind))
}

pub fn db_recent_entries(state: &DbState, limit: i64) -> Result<Vec<ClipEntry>, AppError> {
    super::with_conn(state, |conn| recent_entries(conn, limit))
}

pub fn db_list_entries(state: &DbState, filter: &EntryFilter) -> Result<Vec<ClipEntry>, AppError> {
    super::with_conn(state, |conn| list_entries(conn, filter))
}

pub fn db_get_entry(state: &DbState, id: i64) -> Result<Option<ClipEntry>, AppError> {
    super::with_conn(state, |conn| get_entry(conn, id))
}

pub fn db_delete_entry(state: &DbState, id: i64) -> Result<bool, AppError> {
    super::with_conn(state, |conn| delete_entry(conn, id))
}

pub fn db_toggle_favorite(state: &DbState, id: i64) -> Result<Option<bool>, AppError> {
    super::with_conn(state, |conn| toggle_favorite(conn, id))
}

pub fn db_clear_history(state: &DbState, keep_favorites: bool) -> Result<i64, AppError> {
    super::with_conn(state, |conn| clear_history(conn, keep_favorites))
}
