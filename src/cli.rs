//! 交互式命令行
//!
//! 一个阻塞的 REPL：逐行读取命令，经门面执行后把结果打印到标准输出。
//! 无法识别的命令给出提示但不退出；`exit` / `quit` 或输入流结束时
//! 停止监控并返回。
//!
//! 命令解析拆成纯函数 `parse_command`，与 I/O 无关，便于测试。

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use chrono::{Local, TimeZone};

use crate::db::{ClipEntry, EntryKind};
use crate::manager::{ClipboardManager, CopyOutcome, preview_of};

/// REPL 中单行输入解析出的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Recent(i64),
    Search(String),
    Add(String),
    Copy(i64),
    Favorite(i64),
    Delete(i64),
    /// `keep_favorites`：`clear` 保留收藏，`clear all` 全部删除
    Clear { keep_favorites: bool },
    Images(bool),
    Help,
    Exit,
    Empty,
    Unknown(String),
}

const DEFAULT_RECENT: i64 = 5;

/// 解析单行输入；参数缺失或非法时返回 `Unknown` 并附带提示
pub fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }

    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head.to_ascii_lowercase().as_str() {
        "start" => Command::Start,
        "stop" => Command::Stop,
        "recent" => {
            if rest.is_empty() {
                return Command::Recent(DEFAULT_RECENT);
            }
            match rest.parse::<i64>() {
                Ok(n) => Command::Recent(n),
                Err(_) => Command::Unknown(format!("recent 的参数必须是整数: {}", rest)),
            }
        }
        "search" => {
            if rest.is_empty() {
                Command::Unknown("用法: search <关键词>".to_string())
            } else {
                Command::Search(rest.to_string())
            }
        }
        "add" => {
            if rest.is_empty() {
                Command::Unknown("用法: add <文本>".to_string())
            } else {
                Command::Add(rest.to_string())
            }
        }
        "copy" => parse_id(rest, "copy").map_or_else(Command::Unknown, Command::Copy),
        "favorite" | "fav" => {
            parse_id(rest, "favorite").map_or_else(Command::Unknown, Command::Favorite)
        }
        "delete" | "del" => parse_id(rest, "delete").map_or_else(Command::Unknown, Command::Delete),
        "clear" => match rest {
            "" => Command::Clear { keep_favorites: true },
            "all" => Command::Clear { keep_favorites: false },
            other => Command::Unknown(format!("clear 只接受可选参数 all: {}", other)),
        },
        "images" => match rest {
            "on" => Command::Images(true),
            "off" => Command::Images(false),
            _ => Command::Unknown("用法: images on|off".to_string()),
        },
        "help" | "?" => Command::Help,
        "exit" | "quit" => Command::Exit,
        other => Command::Unknown(format!("未知命令: {}（输入 help 查看帮助）", other)),
    }
}

fn parse_id(rest: &str, name: &str) -> Result<i64, String> {
    rest.parse::<i64>()
        .map_err(|_| format!("用法: {} <条目 id>", name))
}

/// 毫秒时间戳格式化为本地时间
fn format_timestamp(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => format!("@{}", millis),
    }
}

/// 单条目的列表行：`[id] ★ 时间  内容预览 #标签`
fn format_entry(entry: &ClipEntry) -> String {
    let star = if entry.favorite { "★" } else { " " };
    let body = match entry.kind {
        EntryKind::Text => preview_of(&entry.text().unwrap_or_default().replace('\n', " "), 60),
        EntryKind::Image => format!("[图片 {} 字节]", entry.content.len()),
    };
    let mut line = format!(
        "[{}] {} {}  {}",
        entry.id,
        star,
        format_timestamp(entry.timestamp),
        body
    );
    for tag in &entry.tags {
        line.push_str(&format!(" #{}", tag));
    }
    line
}

fn print_entries(entries: &[ClipEntry]) {
    if entries.is_empty() {
        println!("（无记录）");
        return;
    }
    for entry in entries {
        println!("{}", format_entry(entry));
    }
}

fn print_help() {
    println!("可用命令:");
    println!("  start            启动剪贴板监控");
    println!("  stop             停止剪贴板监控");
    println!("  recent [n]       显示最近 n 条记录（缺省 {}）", DEFAULT_RECENT);
    println!("  search <关键词>  搜索文本记录（区分大小写）");
    println!("  add <文本>       手工添加一条文本记录");
    println!("  copy <id>        把记录内容复制回剪贴板");
    println!("  favorite <id>    切换收藏状态");
    println!("  delete <id>      删除记录");
    println!("  clear [all]      清理历史（缺省保留收藏，all 全部删除）");
    println!("  images on|off    开关图片跟踪");
    println!("  help             显示本帮助");
    println!("  exit             退出");
}

/// 二次确认：读一行，仅 `y` / `yes` 视为确认
fn confirm(input: &mut impl BufRead, prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    let _ = io::stdout().flush();
    let mut line = String::new();
    if input.read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// 运行 REPL，直到 `exit` 或输入流结束
pub fn run(manager: Arc<ClipboardManager>) {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    println!("剪贴板历史管理器（输入 help 查看命令）");

    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match input.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }

        match parse_command(&line) {
            Command::Empty => {}
            Command::Exit => break,
            Command::Help => print_help(),
            Command::Unknown(message) => println!("{}", message),
            command => {
                if !execute(&manager, command, &mut input) {
                    break;
                }
            }
        }
    }

    manager.stop_monitoring();
}

/// 执行单条命令；返回 `false` 表示应结束 REPL
fn execute(manager: &ClipboardManager, command: Command, input: &mut impl BufRead) -> bool {
    match command {
        Command::Start => {
            manager.start_monitoring();
            println!("监控已启动");
        }
        Command::Stop => {
            manager.stop_monitoring();
            println!("监控已停止");
        }
        Command::Recent(n) => match manager.recent(n) {
            Ok(entries) => print_entries(&entries),
            Err(err) => println!("查询失败: {}", err),
        },
        Command::Search(query) => match manager.search(&query) {
            Ok(entries) => print_entries(&entries),
            Err(err) => println!("搜索失败: {}", err),
        },
        Command::Add(text) => match manager.add_text(&text) {
            Ok(Some(id)) => println!("已添加 (id={})", id),
            Ok(None) => println!("空白文本不会被记录"),
            Err(err) => println!("添加失败: {}", err),
        },
        Command::Copy(id) => match manager.copy_entry(id) {
            Ok(CopyOutcome::NotFound) => println!("记录 {} 不存在", id),
            Ok(CopyOutcome::Text { clipboard_set: true, preview }) => {
                println!("已复制: {}", preview)
            }
            Ok(CopyOutcome::Image { clipboard_set: true }) => println!("图片已复制"),
            Ok(CopyOutcome::Text { clipboard_set: false, .. })
            | Ok(CopyOutcome::Image { clipboard_set: false }) => {
                println!("写入系统剪贴板失败")
            }
            Err(err) => println!("复制失败: {}", err),
        },
        Command::Favorite(id) => match manager.toggle_favorite(id) {
            Ok(Some(true)) => println!("已收藏 (id={})", id),
            Ok(Some(false)) => println!("已取消收藏 (id={})", id),
            Ok(None) => println!("记录 {} 不存在", id),
            Err(err) => println!("操作失败: {}", err),
        },
        Command::Delete(id) => match manager.delete_entry(id) {
            Ok(true) => println!("已删除 (id={})", id),
            Ok(false) => println!("记录 {} 不存在", id),
            Err(err) => println!("删除失败: {}", err),
        },
        Command::Clear { keep_favorites } => {
            let prompt = if keep_favorites {
                "确认清理历史（保留收藏）？"
            } else {
                "确认删除全部历史（包括收藏）？"
            };
            if !confirm(input, prompt) {
                println!("已取消");
                return true;
            }
            match manager.clear_history(keep_favorites) {
                Ok(count) => println!("已清理 {} 条记录", count),
                Err(err) => println!("清理失败: {}", err),
            }
        }
        Command::Images(enabled) => {
            manager.set_track_images(enabled);
            println!("图片跟踪已{}", if enabled { "开启" } else { "关闭" });
        }
        Command::Empty | Command::Help | Command::Exit | Command::Unknown(_) => {}
    }
    true
}
