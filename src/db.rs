//! 数据库模块
//!
//! # 设计思路
//!
//! 将所有 SQLite 操作集中到本模块，CLI / 监控循环 / Web API 统一通过
//! 这里的操作契约访问历史记录。使用 `rusqlite` 直接操作 SQLite。
//!
//! # 优势
//!
//! - **类型安全**：Rust struct + 枚举，编译期保证数据结构正确
//! - **一致性**：单一数据源，所有前端行为一致
//! - **可维护性**：SQL 逻辑集中在一个模块
//!
//! # 契约
//!
//! - 所有返回条目的查询按时间戳倒序（最新在前）。
//! - 缺失 id 是正常结果（`None` / `false`），绝不作为错误抛出。
//! - 单条目的变更操作是原子的，不会出现部分更新。

use std::fs;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use serde::Serialize;

use crate::error::AppError;

mod history;
mod schema;
mod tags;

pub use history::*;
pub use tags::*;

// ============================================================================
// 数据模型
// ============================================================================

/// 条目类型：文本或图片
///
/// 决定 `content` 字段的解释方式：文本条目按 UTF-8（替换无效字节）解码，
/// 图片条目视为不透明的编码字节（PNG/JPEG 等）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Text,
    Image,
}

impl EntryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Text => "text",
            EntryKind::Image => "image",
        }
    }

    pub fn parse(value: &str) -> Option<EntryKind> {
        match value {
            "text" => Some(EntryKind::Text),
            "image" => Some(EntryKind::Image),
            _ => None,
        }
    }
}

/// 剪贴板历史条目
#[derive(Debug, Clone)]
pub struct ClipEntry {
    pub id: i64,
    pub content: Vec<u8>,
    pub kind: EntryKind,
    /// 毫秒级时间戳，插入时生成，之后不变
    pub timestamp: i64,
    pub favorite: bool,
    /// 有序去重的标签列表，来自 `entry_tags` 关联表
    pub tags: Vec<String>,
}

impl ClipEntry {
    /// 将文本条目内容解码为字符串（无效字节替换为 U+FFFD）。
    /// 图片条目返回 `None`。
    pub fn text(&self) -> Option<String> {
        match self.kind {
            EntryKind::Text => Some(String::from_utf8_lossy(&self.content).into_owned()),
            EntryKind::Image => None,
        }
    }
}

// ============================================================================
// 数据库状态
// ============================================================================

/// 数据库连接封装
///
/// 单连接 + 互斥锁：监控线程与前台线程各自按逻辑操作加锁，
/// 不存在跨操作的长事务。
pub struct DbState(pub Mutex<Connection>);

pub(crate) fn with_conn<T>(
    state: &DbState,
    op: impl FnOnce(&Connection) -> Result<T, AppError>,
) -> Result<T, AppError> {
    let conn = state
        .0
        .lock()
        .map_err(|e| AppError::Database(format!("获取数据库锁失败: {}", e)))?;
    op(&conn)
}

// ============================================================================
// 数据库初始化
// ============================================================================

/// 初始化数据库连接与 Schema
///
/// 在进程启动阶段调用一次，创建表结构并执行迁移。
/// 初始化失败的处理由调用方决定：交互模式快速失败，
/// 服务模式降级运行（数据接口返回 503）。
pub fn init_db(db_path: &Path) -> Result<DbState, AppError> {
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| AppError::Storage(format!("创建数据库目录失败: {}", e)))?;
    }
    log::info!("数据库路径: {}", db_path.display());

    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Database(format!("打开数据库失败: {}", e)))?;

    schema::initialize_schema(&conn)?;

    Ok(DbState(Mutex::new(conn)))
}

/// 测试与内嵌场景使用的内存数据库
pub fn init_memory_db() -> Result<DbState, AppError> {
    let conn = Connection::open_in_memory()
        .map_err(|e| AppError::Database(format!("打开内存数据库失败: {}", e)))?;
    schema::initialize_schema(&conn)?;
    Ok(DbState(Mutex::new(conn)))
}
