//! 进程入口
//!
//! 三种运行模式：
//! - 缺省：交互式 CLI（可用 `start` 启动监控）
//! - `--monitor`：直接启动监控再进入 CLI
//! - `--serve`：启动 Web 服务（可与 `--monitor` 组合）
//! - `--recent N`：打印最近 N 条后退出
//!
//! 失败语义按模式区分：交互模式下存储初始化失败立即退出（exit 1）；
//! 服务模式下降级运行，数据接口统一返回 503。

use std::process;
use std::sync::Arc;

use clap::Parser;

use clipboard_manager::cli;
use clipboard_manager::clipboard::system_clipboard;
use clipboard_manager::db::init_db;
use clipboard_manager::manager::ClipboardManager;
use clipboard_manager::settings::Settings;
use clipboard_manager::web;

#[derive(Debug, Parser)]
#[command(name = "clipboard-manager", about = "剪贴板历史管理器", version)]
struct Args {
    /// 启动时立即开始剪贴板监控
    #[arg(long)]
    monitor: bool,

    /// 打印最近 N 条记录后退出
    #[arg(long, value_name = "N")]
    recent: Option<i64>,

    /// 以 Web 服务模式运行
    #[arg(long)]
    serve: bool,

    /// Web 服务端口（覆盖 PORT 环境变量）
    #[arg(long)]
    port: Option<u16>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let settings = Settings::from_env();
    let port = args.port.unwrap_or(settings.port);

    let manager = match init_db(&settings.db_path) {
        Ok(db) => {
            let manager = Arc::new(ClipboardManager::new(
                Arc::new(db),
                system_clipboard(),
                settings.track_images,
            ));
            if args.monitor {
                manager.start_monitoring();
            }
            Some(manager)
        }
        Err(err) => {
            if args.serve {
                // 服务模式降级运行，让探活接口与错误语义可见
                log::error!("🚫 存储初始化失败，进入降级模式: {}", err);
                None
            } else {
                log::error!("存储初始化失败: {}", err);
                process::exit(1);
            }
        }
    };

    if let Some(n) = args.recent {
        let Some(manager) = manager else {
            process::exit(1);
        };
        match manager.recent(n) {
            Ok(entries) => {
                for entry in &entries {
                    match entry.text() {
                        Some(text) => println!("[{}] {}", entry.id, text.replace('\n', " ")),
                        None => println!("[{}] [图片 {} 字节]", entry.id, entry.content.len()),
                    }
                }
            }
            Err(err) => {
                log::error!("查询失败: {}", err);
                process::exit(1);
            }
        }
        return;
    }

    if args.serve {
        if let Err(err) = web::serve(manager, port) {
            log::error!("Web 服务退出: {}", err);
            process::exit(1);
        }
        return;
    }

    let Some(manager) = manager else {
        process::exit(1);
    };
    cli::run(manager);
}
