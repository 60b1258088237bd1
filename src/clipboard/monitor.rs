//! 剪贴板监控循环
//!
//! # 设计思路
//!
//! 一个可取消的后台线程：按固定间隔（约 1 秒）轮询适配器，观察值经
//! 去重过滤后写入存储。状态机只有 `Stopped` 与 `Running` 两态：
//! `start()` 幂等（已运行时记录警告），`stop()` 协作式取消——置位停止
//! 标志后在约 1 秒内等待线程退出，超时则放弃等待，但保证停止信号被
//! 观察到之后不会再开始新的轮询迭代。
//!
//! # 轮询 vs 事件通知
//!
//! 事件驱动的剪贴板变化订阅可以消除轮询延迟与空转，但并非所有目标
//! 平台（尤其是命令行后备后端）都有统一的通知机制，因此这里保留固定
//! 间隔轮询 + 去重过滤，代价是最多一个轮询周期的捕获延迟。
//!
//! # 失败语义
//!
//! 单次轮询中读适配器或写存储的任何失败只记录日志，循环继续下一轮；
//! 单次失败绝不终止监控。持续性失败（如数据库不可达）仅通过日志暴露，
//! 不做退避或熔断，这是已知的局限。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::db::{self, DbState, EntryKind};

use super::adapter::ClipboardPort;
use super::detector::ChangeDetector;

const POLL_INTERVAL: Duration = Duration::from_secs(1);
/// 轮询休眠切片，保证停止信号在 100ms 内被观察到
const SLEEP_SLICE: Duration = Duration::from_millis(100);
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// 运行中的轮询线程及其专属停止标志
///
/// 停止标志随线程一起分配：`stop()` 置位的永远是它要停掉的那个线程
/// 的标志，后续 `start()` 不可能撤销已经发出的停止信号。
struct PollHandle {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// 剪贴板监控器
///
/// 去重状态（上次接受的文本 / 图片指纹）归轮询线程私有，
/// 前台线程从不读写；进程重启时重置。
pub struct ClipboardMonitor {
    db: Arc<DbState>,
    port: Arc<dyn ClipboardPort>,
    track_images: Arc<AtomicBool>,
    ignore_next: Arc<AtomicBool>,
    running: Option<PollHandle>,
}

/// 单次轮询：读适配器 → 去重 → 写存储。
/// 任何失败记录日志后返回，由调用方继续下一轮。
///
/// `ignore_next` 是一次性抑制标志：应用自身刚写入过剪贴板时置位，
/// 仅在某个观察值真正被检测器接受时消费——观察值吸收为"已见"但
/// 不写入存储。空轮询（适配器暂时失败）不消耗标志；轮询模式下
/// 内容会停留在剪贴板上，单纯跳过一个周期无法抑制重复捕获。
fn poll_once(
    db: &DbState,
    port: &dyn ClipboardPort,
    detector: &mut ChangeDetector,
    track_images: bool,
    ignore_next: &AtomicBool,
) {
    if let Some(text) = port.get_text() {
        if detector.accept_text(&text) {
            if ignore_next.swap(false, Ordering::SeqCst) {
                log::debug!("⏭️  忽略应用自身写入的剪贴板文本");
            } else {
                match db::db_add_entry(db, text.as_bytes(), EntryKind::Text) {
                    Ok(id) => log::debug!("📋 新文本已入库 (id={})", id),
                    Err(err) => log::error!("写入文本条目失败: {}", err),
                }
            }
        }
    }

    // 图片跟踪关闭时整条通道跳过：不取指纹，不写存储
    if track_images {
        if let Some(data) = port.get_image() {
            if detector.accept_image(&data) {
                if ignore_next.swap(false, Ordering::SeqCst) {
                    log::debug!("⏭️  忽略应用自身写入的剪贴板图片");
                } else {
                    match db::db_add_entry(db, &data, EntryKind::Image) {
                        Ok(id) => log::debug!("📋 新图片已入库 (id={}, {} 字节)", id, data.len()),
                        Err(err) => log::error!("写入图片条目失败: {}", err),
                    }
                }
            }
        }
    }
}

impl ClipboardMonitor {
    pub(crate) fn new(
        db: Arc<DbState>,
        port: Arc<dyn ClipboardPort>,
        track_images: Arc<AtomicBool>,
        ignore_next: Arc<AtomicBool>,
    ) -> Self {
        Self {
            db,
            port,
            track_images,
            ignore_next,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|poll| !poll.handle.is_finished())
    }

    /// 启动监控线程（`Stopped -> Running`）
    ///
    /// 已处于 `Running` 时为无操作，仅记录警告。
    /// 每次启动分配全新的停止标志：即使上一次 `stop()` 超时返回时旧线程
    /// 仍阻塞在适配器调用中，它的标志保持置位，醒来后立即退出，
    /// 不会与新线程并行轮询。
    pub fn start(&mut self) {
        if self.is_running() {
            log::warn!("剪贴板监控已在运行");
            return;
        }

        let db = Arc::clone(&self.db);
        let port = Arc::clone(&self.port);
        let track_images = Arc::clone(&self.track_images);
        let ignore_next = Arc::clone(&self.ignore_next);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_for_thread = Arc::clone(&stop);

        let handle = thread::spawn(move || {
            let stop = stop_for_thread;
            let mut detector = ChangeDetector::new();

            while !stop.load(Ordering::SeqCst) {
                poll_once(
                    &db,
                    &*port,
                    &mut detector,
                    track_images.load(Ordering::SeqCst),
                    &ignore_next,
                );

                // 切片休眠，停止信号到达时在切片边界退出
                let wake_at = Instant::now() + POLL_INTERVAL;
                while Instant::now() < wake_at {
                    if stop.load(Ordering::SeqCst) {
                        return;
                    }
                    thread::sleep(SLEEP_SLICE);
                }
            }
        });

        self.running = Some(PollHandle { stop, handle });
        log::info!("📋 剪贴板监控已启动");
    }

    /// 停止监控线程（`Running -> Stopped`）
    ///
    /// 置位停止标志后最多等待约 1 秒；超时返回时不保证线程已完全退出，
    /// 但保证其观察到信号后不再开始新的轮询迭代。
    pub fn stop(&mut self) {
        let Some(poll) = self.running.take() else {
            log::warn!("剪贴板监控未在运行");
            return;
        };

        poll.stop.store(true, Ordering::SeqCst);

        let deadline = Instant::now() + STOP_JOIN_TIMEOUT;
        while Instant::now() < deadline {
            if poll.handle.is_finished() {
                let _ = poll.handle.join();
                log::info!("📋 剪贴板监控已停止");
                return;
            }
            thread::sleep(Duration::from_millis(20));
        }

        // 线程仍在一次阻塞的适配器调用中；标志已置位，它退出后不再轮询
        log::warn!("剪贴板监控未在限时内退出，放弃等待");
    }
}

impl Drop for ClipboardMonitor {
    fn drop(&mut self) {
        if let Some(poll) = self.running.as_ref() {
            poll.stop.store(true, Ordering::SeqCst);
        }
    }
}
