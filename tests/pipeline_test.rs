//! 端到端流水线测试：监控循环 → 去重 → 存储 → 门面查询 / 回写抑制

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use clipboard_manager::clipboard::ClipboardPort;
use clipboard_manager::db::{init_db, init_memory_db};
use clipboard_manager::manager::{ClipboardManager, CopyOutcome};

/// 进程内假剪贴板：写入的内容会像真实剪贴板一样持续驻留
#[derive(Default)]
struct FakeClipboard {
    text: Mutex<Option<String>>,
    image: Mutex<Option<Vec<u8>>>,
}

impl FakeClipboard {
    /// 模拟外部应用向剪贴板写入文本
    fn place_text(&self, text: &str) {
        *self.text.lock().expect("lock text") = Some(text.to_string());
    }
}

impl ClipboardPort for FakeClipboard {
    fn get_text(&self) -> Option<String> {
        self.text.lock().expect("lock text").clone()
    }

    fn set_text(&self, text: &str) -> bool {
        *self.text.lock().expect("lock text") = Some(text.to_string());
        true
    }

    fn get_image(&self) -> Option<Vec<u8>> {
        self.image.lock().expect("lock image").clone()
    }

    fn set_image(&self, data: &[u8]) -> bool {
        *self.image.lock().expect("lock image") = Some(data.to_vec());
        true
    }
}

fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    pred()
}

fn entry_count(manager: &ClipboardManager) -> usize {
    manager.recent(100).expect("recent").len()
}

#[test]
fn monitoring_captures_dedups_and_suppresses_copy_back() {
    let clipboard = Arc::new(FakeClipboard::default());
    let db = Arc::new(init_memory_db().expect("init db"));
    let manager = ClipboardManager::new(db, clipboard.clone(), true);

    manager.start_monitoring();
    assert!(manager.is_monitoring());

    // 捕获：外部写入的文本在一个轮询周期内入库
    clipboard.place_text("first");
    assert!(wait_until(Duration::from_secs(5), || entry_count(&manager) == 1));
    assert_eq!(
        manager.recent(1).expect("recent")[0].text().as_deref(),
        Some("first")
    );

    // 去重：内容驻留剪贴板，后续轮询不再重复入库
    std::thread::sleep(Duration::from_millis(2500));
    assert_eq!(entry_count(&manager), 1);

    // 新内容照常捕获
    clipboard.place_text("second");
    assert!(wait_until(Duration::from_secs(5), || entry_count(&manager) == 2));

    // 历史重复（非连续）重新入库
    clipboard.place_text("first");
    assert!(wait_until(Duration::from_secs(5), || entry_count(&manager) == 3));

    // 回写抑制：copy_entry 写回的内容被监控吸收而不再入库
    let second_id = manager
        .search("second")
        .expect("search")
        .first()
        .map(|entry| entry.id)
        .expect("second exists");
    let outcome = manager.copy_entry(second_id).expect("copy");
    assert!(matches!(outcome, CopyOutcome::Text { clipboard_set: true, .. }));
    assert_eq!(clipboard.get_text().as_deref(), Some("second"));

    std::thread::sleep(Duration::from_millis(2500));
    assert_eq!(entry_count(&manager), 3);

    manager.stop_monitoring();
    assert!(!manager.is_monitoring());
}

#[test]
fn clear_history_keeps_favorites_by_default() {
    let db = Arc::new(init_memory_db().expect("init db"));
    let manager = ClipboardManager::new(db, Arc::new(FakeClipboard::default()), true);

    let keep = manager.add_text("keep me").expect("add").expect("accepted");
    manager.add_text("drop me").expect("add").expect("accepted");
    manager.add_text("drop me too").expect("add").expect("accepted");
    assert_eq!(manager.toggle_favorite(keep).expect("favorite"), Some(true));

    assert_eq!(manager.clear_history(true).expect("clear"), 2);
    let remaining = manager.recent(10).expect("recent");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, keep);
    assert!(remaining[0].favorite);

    assert_eq!(manager.clear_history(false).expect("clear all"), 1);
    assert!(manager.recent(10).expect("recent").is_empty());
}

#[test]
fn search_is_case_sensitive_and_tags_round_trip() {
    let db = Arc::new(init_memory_db().expect("init db"));
    let manager = ClipboardManager::new(db, Arc::new(FakeClipboard::default()), true);

    let id = manager.add_text("Meeting notes").expect("add").expect("accepted");
    manager.add_text("groceries").expect("add").expect("accepted");

    assert_eq!(manager.search("Meeting").expect("search").len(), 1);
    assert!(manager.search("meeting").expect("search").is_empty());

    let tags = manager.add_tag(id, "work").expect("tag").expect("entry exists");
    assert_eq!(tags, vec!["work"]);
    manager.add_tag(id, "work").expect("duplicate tag").expect("entry exists");
    assert_eq!(
        manager.entry_tags(id).expect("tags").expect("entry exists"),
        vec!["work"]
    );
    assert_eq!(manager.all_tags().expect("all tags"), vec!["work"]);

    let after = manager.remove_tag(id, "work").expect("remove").expect("entry exists");
    assert!(after.is_empty());
    assert!(manager.add_tag(999, "x").expect("missing entry").is_none());
}

#[test]
fn history_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("history.db");

    {
        let db = Arc::new(init_db(&db_path).expect("init db"));
        let manager = ClipboardManager::new(db, Arc::new(FakeClipboard::default()), true);
        let id = manager.add_text("durable").expect("add").expect("accepted");
        manager.toggle_favorite(id).expect("favorite");
    }

    let db = Arc::new(init_db(&db_path).expect("reopen db"));
    let manager = ClipboardManager::new(db, Arc::new(FakeClipboard::default()), true);
    let entries = manager.recent(10).expect("recent");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].text().as_deref(), Some("durable"));
    assert!(entries[0].favorite);
}
