//! 运行配置
//!
//! 全部来自环境变量，进程启动时读取一次：
//! - `CLIPBOARD_DB`：数据库文件路径，缺省为 `~/.clipboard-manager/clipboard_history.db`
//! - `CLIPBOARD_TRACK_IMAGES`：是否跟踪图片，缺省开启
//! - `PORT`：Web 服务监听端口，缺省 5000
//!
//! 解析逻辑拆成接受字符串的纯函数，便于测试时不碰进程环境。

use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 5000;
const DB_DIR_NAME: &str = ".clipboard-manager";
const DB_FILE_NAME: &str = "clipboard_history.db";

#[derive(Debug, Clone)]
pub struct Settings {
    pub db_path: PathBuf,
    pub track_images: bool,
    pub port: u16,
}

impl Settings {
    /// 从进程环境变量读取配置
    pub fn from_env() -> Settings {
        Settings {
            db_path: resolve_db_path(std::env::var("CLIPBOARD_DB").ok()),
            track_images: parse_bool(std::env::var("CLIPBOARD_TRACK_IMAGES").ok().as_deref(), true),
            port: parse_port(std::env::var("PORT").ok().as_deref(), DEFAULT_PORT),
        }
    }
}

fn resolve_db_path(explicit: Option<String>) -> PathBuf {
    if let Some(path) = explicit.filter(|p| !p.trim().is_empty()) {
        return PathBuf::from(path);
    }
    // 无家目录时退回当前目录下的同名文件
    let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join(DB_DIR_NAME).join(DB_FILE_NAME)
}

/// 宽松的布尔解析：`1` / `true` / `yes` / `on` 为真（不区分大小写），
/// `0` / `false` / `no` / `off` 为假，其余取缺省值
fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw.map(|s| s.trim().to_ascii_lowercase()) {
        Some(v) if ["1", "true", "yes", "on"].contains(&v.as_str()) => true,
        Some(v) if ["0", "false", "no", "off"].contains(&v.as_str()) => false,
        _ => default,
    }
}

fn parse_port(raw: Option<&str>, default: u16) -> u16 {
    match raw.and_then(|s| s.trim().parse::<u16>().ok()) {
        Some(port) if port > 0 => port,
        _ => default,
    }
}
