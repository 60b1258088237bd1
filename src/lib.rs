//! 剪贴板历史管理器
//!
//! 后台轮询系统剪贴板，把新的文本与图片存入 SQLite 历史库，
//! 通过交互式 CLI 与 HTTP API 提供查询、回拷、收藏、标签与清理。
//!
//! # 架构
//!
//! ```text
//!   ┌─────────┐   ┌─────────┐
//!   │   CLI   │   │ Web API │
//!   └────┬────┘   └────┬────┘
//!        └───────┬─────┘
//!        ┌───────▼────────┐
//!        │ ClipboardManager│  查询 / 变更门面
//!        └───┬────────┬───┘
//!     ┌──────▼──┐  ┌──▼──────────┐
//!     │   db    │  │  clipboard  │
//!     │ SQLite  │  │ 适配器+监控 │
//!     └─────────┘  └─────────────┘
//! ```
//!
//! 监控循环与前端共享同一个门面实例；去重状态归监控线程私有，
//! 回写抑制通过实例级的一次性忽略标志协作。

pub mod cli;
pub mod clipboard;
pub mod db;
pub mod error;
pub mod manager;
pub mod settings;
pub mod web;
