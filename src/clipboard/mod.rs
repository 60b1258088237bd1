//! 剪贴板子系统
//!
//! 三个层次：
//! - `adapter`：平台剪贴板能力接口与各操作系统后端
//! - `detector`：变化检测与连续重复的去重过滤
//! - `monitor`：后台轮询循环，把新内容写入存储

pub mod adapter;
pub mod detector;
pub mod monitor;

pub use adapter::{ClipboardPort, system_clipboard};
pub use detector::ChangeDetector;
pub use monitor::ClipboardMonitor;
