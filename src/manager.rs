//! 查询 / 变更门面
//!
//! # 设计思路
//!
//! CLI 与 Web API 共享的唯一业务入口：所有历史查询、条目变更、监控
//! 生命周期与回写剪贴板都经由 `ClipboardManager`。两个前端不各自碰
//! 存储或适配器，保证行为一致。
//!
//! # 回写抑制
//!
//! `copy_entry` 把历史内容写回系统剪贴板后，监控循环下一轮会把同样
//! 的内容当作"新变化"再次捕获。门面在成功写入后置位 `ignore_next`
//! 标志；监控线程消费该标志（一次性），把下一次观察吸收进去重状态
//! 而不入库。标志归本实例所有，多个实例互不影响。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::clipboard::{ClipboardMonitor, ClipboardPort};
use crate::db::{self, ClipEntry, DbState, EntryFilter, EntryKind};
use crate::error::AppError;

/// `copy_entry` 的结果
///
/// 区分"条目不存在"与"写剪贴板失败"：前者是正常结果，
/// 后者通过 `clipboard_set = false` 报告，两者都不是错误。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    NotFound,
    Text { clipboard_set: bool, preview: String },
    Image { clipboard_set: bool },
}

pub struct ClipboardManager {
    db: Arc<DbState>,
    port: Arc<dyn ClipboardPort>,
    track_images: Arc<AtomicBool>,
    ignore_next: Arc<AtomicBool>,
    monitor: Mutex<ClipboardMonitor>,
}

impl ClipboardManager {
    pub fn new(db: Arc<DbState>, port: Arc<dyn ClipboardPort>, track_images: bool) -> Self {
        let track_images = Arc::new(AtomicBool::new(track_images));
        let ignore_next = Arc::new(AtomicBool::new(false));
        let monitor = ClipboardMonitor::new(
            Arc::clone(&db),
            Arc::clone(&port),
            Arc::clone(&track_images),
            Arc::clone(&ignore_next),
        );
        Self {
            db,
            port,
            track_images,
            ignore_next,
            monitor: Mutex::new(monitor),
        }
    }

    // ------------------------------------------------------------------
    // 监控生命周期
    // ------------------------------------------------------------------

    pub fn start_monitoring(&self) {
        if let Ok(mut monitor) = self.monitor.lock() {
            monitor.start();
        }
    }

    pub fn stop_monitoring(&self) {
        if let Ok(mut monitor) = self.monitor.lock() {
            monitor.stop();
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor.lock().map(|m| m.is_running()).unwrap_or(false)
    }

    /// 运行期切换图片跟踪，最迟在下一个轮询周期生效
    pub fn set_track_images(&self, enabled: bool) {
        self.track_images.store(enabled, Ordering::SeqCst);
        log::info!("图片跟踪: {}", if enabled { "开启" } else { "关闭" });
    }

    pub fn track_images(&self) -> bool {
        self.track_images.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // 查询
    // ------------------------------------------------------------------

    /// 最近 n 条，最新在前；n <= 0 返回空列表
    pub fn recent(&self, limit: i64) -> Result<Vec<ClipEntry>, AppError> {
        db::db_recent_entries(&self.db, limit)
    }

    /// 解码文本上的区分大小写子串搜索，只命中文本条目
    pub fn search(&self, query: &str) -> Result<Vec<ClipEntry>, AppError> {
        let filter = EntryFilter {
            search: Some(query.to_string()),
            ..Default::default()
        };
        db::db_list_entries(&self.db, &filter)
    }

    pub fn list(&self, filter: &EntryFilter) -> Result<Vec<ClipEntry>, AppError> {
        db::db_list_entries(&self.db, filter)
    }

    pub fn get_entry(&self, id: i64) -> Result<Option<ClipEntry>, AppError> {
        db::db_get_entry(&self.db, id)
    }

    // ------------------------------------------------------------------
    // 变更
    // ------------------------------------------------------------------

    /// 手工添加文本条目；纯空白文本被拒绝，返回 `None`
    pub fn add_text(&self, text: &str) -> Result<Option<i64>, AppError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        db::db_add_entry(&self.db, text.as_bytes(), EntryKind::Text).map(Some)
    }

    /// 把指定条目的内容写回系统剪贴板
    ///
    /// 写入成功时置位一次性忽略标志，监控循环不会把这次回写
    /// 再次入库。
    pub fn copy_entry(&self, id: i64) -> Result<CopyOutcome, AppError> {
        let Some(entry) = db::db_get_entry(&self.db, id)? else {
            return Ok(CopyOutcome::NotFound);
        };

        match entry.kind {
            EntryKind::Text => {
                let text = entry.text().unwrap_or_default();
                let clipboard_set = self.port.set_text(&text);
                if clipboard_set {
                    self.ignore_next.store(true, Ordering::SeqCst);
                } else {
                    log::warn!("写回剪贴板文本失败 (id={})", id);
                }
                Ok(CopyOutcome::Text {
                    clipboard_set,
                    preview: preview_of(&text, 100),
                })
            }
            EntryKind::Image => {
                let clipboard_set = self.port.set_image(&entry.content);
                if clipboard_set {
                    self.ignore_next.store(true, Ordering::SeqCst);
                } else {
                    log::warn!("写回剪贴板图片失败 (id={})", id);
                }
                Ok(CopyOutcome::Image { clipboard_set })
            }
        }
    }

    /// 切换收藏；返回新状态，条目不存在返回 `None`
    pub fn toggle_favorite(&self, id: i64) -> Result<Option<bool>, AppError> {
        db::db_toggle_favorite(&self.db, id)
    }

    /// 删除条目；`false` 表示条目不存在
    pub fn delete_entry(&self, id: i64) -> Result<bool, AppError> {
        db::db_delete_entry(&self.db, id)
    }

    /// 批量清理，返回删除条数
    pub fn clear_history(&self, keep_favorites: bool) -> Result<i64, AppError> {
        db::db_clear_history(&self.db, keep_favorites)
    }

    // ------------------------------------------------------------------
    // 标签
    // ------------------------------------------------------------------

    pub fn entry_tags(&self, id: i64) -> Result<Option<Vec<String>>, AppError> {
        db::db_entry_tags(&self.db, id)
    }

    pub fn add_tag(&self, id: i64, tag: &str) -> Result<Option<Vec<String>>, AppError> {
        db::db_add_tag(&self.db, id, tag)
    }

    pub fn remove_tag(&self, id: i64, tag: &str) -> Result<Option<Vec<String>>, AppError> {
        db::db_remove_tag(&self.db, id, tag)
    }

    pub fn all_tags(&self) -> Result<Vec<String>, AppError> {
        db::db_all_tags(&self.db)
    }
}

impl Drop for ClipboardManager {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

/// 按字符边界截断的预览，超长时追加省略号
pub fn preview_of(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut preview: String = text.chars().take(max_chars).collect();
    preview.push_str("...");
    preview
}
