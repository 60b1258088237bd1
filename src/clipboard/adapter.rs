//! 平台剪贴板适配器
//!
//! # 设计思路
//!
//! 对上层暴露统一的四操作能力接口 [`ClipboardPort`]：
//! `get_text` / `set_text` / `get_image` / `set_image`。
//! 所有操作尽力而为且不抛错：底层失败（工具缺失、权限拒绝、数据损坏）
//! 一律返回 `None` / `false`，调用方视为"下个轮询周期再试"。
//!
//! # 实现思路
//!
//! - 首选 [`ArboardClipboard`]：`arboard` 工具库绑定，图片经 `image` crate
//!   在 RGBA 与 PNG 编码字节之间转换。
//! - 各操作系统各有一个子进程后备实现（powershell / pbpaste / xclip），
//!   启动时按宿主平台选择，`arboard` 初始化失败时兜底。
//! - `set_image` 在任何系统调用之前先校验字节能解码为合法图片。
//! - 临时文件一律使用 `tempfile::NamedTempFile`，`Drop` 保证所有退出
//!   路径（成功、失败、panic）都会清理；轮询每秒一次，泄漏会快速累积。

use std::borrow::Cow;
use std::io::{Cursor, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;

use image::ImageFormat;

/// 宿主剪贴板的统一能力接口
///
/// 契约：所有操作不向调用方抛错；内容缺失与操作失败都是正常结果。
pub trait ClipboardPort: Send + Sync {
    /// 读取剪贴板文本，不可用时返回 `None`
    fn get_text(&self) -> Option<String>;
    /// 写入剪贴板文本，返回是否成功
    fn set_text(&self, text: &str) -> bool;
    /// 读取剪贴板图片的编码字节（PNG 等），不可用时返回 `None`
    fn get_image(&self) -> Option<Vec<u8>>;
    /// 校验并写入剪贴板图片，非法字节直接拒绝（不发起系统调用）
    fn set_image(&self, data: &[u8]) -> bool;
}

/// 校验字节是否为可解码的合法图片
pub(crate) fn is_valid_image(data: &[u8]) -> bool {
    image::load_from_memory(data).is_ok()
}

/// 猜测图片字节的 MIME 类型，无法识别时按 PNG 处理
pub(crate) fn image_mime_type(data: &[u8]) -> &'static str {
    match image::guess_format(data) {
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Gif) => "image/gif",
        _ => "image/png",
    }
}

/// 按宿主平台选择剪贴板后端
///
/// 先探测 `arboard`（工具库绑定，无外部进程开销）；
/// 初始化失败（无显示服务等）时退回各平台的命令行实现。
pub fn system_clipboard() -> Arc<dyn ClipboardPort> {
    match arboard::Clipboard::new() {
        Ok(_) => {
            log::info!("📋 剪贴板后端: arboard");
            Arc::new(ArboardClipboard)
        }
        Err(err) => {
            log::warn!("arboard 初始化失败（{}），退回命令行后端", err);
            command_clipboard()
        }
    }
}

#[cfg(target_os = "windows")]
fn command_clipboard() -> Arc<dyn ClipboardPort> {
    log::info!("📋 剪贴板后端: powershell");
    Arc::new(WindowsClipboard)
}

#[cfg(target_os = "macos")]
fn command_clipboard() -> Arc<dyn ClipboardPort> {
    log::info!("📋 剪贴板后端: pbcopy/pbpaste");
    Arc::new(MacosClipboard)
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn command_clipboard() -> Arc<dyn ClipboardPort> {
    log::info!("📋 剪贴板后端: xclip/xsel");
    Arc::new(LinuxClipboard)
}

// ============================================================================
// arboard 后端
// ============================================================================

/// `arboard` 工具库绑定后端
///
/// 每次操作新建 `Clipboard` 句柄；轮询频率约 1Hz，开销可以接受，
/// 也避免了跨线程共享句柄的互斥成本。
pub struct ArboardClipboard;

impl ClipboardPort for ArboardClipboard {
    fn get_text(&self) -> Option<String> {
        let mut clipboard = arboard::Clipboard::new().ok()?;
        clipboard.get_text().ok()
    }

    fn set_text(&self, text: &str) -> bool {
        match arboard::Clipboard::new() {
            Ok(mut clipboard) => match clipboard.set_text(text.to_string()) {
                Ok(()) => true,
                Err(err) => {
                    log::error!("写入剪贴板文本失败: {}", err);
                    false
                }
            },
            Err(err) => {
                log::error!("打开剪贴板失败: {}", err);
                false
            }
        }
    }

    fn get_image(&self) -> Option<Vec<u8>> {
        let mut clipboard = arboard::Clipboard::new().ok()?;
        let image_data = clipboard.get_image().ok()?;

        let width = image_data.width as u32;
        let height = image_data.height as u32;
        let buffer =
            image::RgbaImage::from_raw(width, height, image_data.bytes.into_owned())?;

        let mut encoded = Vec::new();
        match buffer.write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png) {
            Ok(()) => Some(encoded),
            Err(err) => {
                log::error!("编码剪贴板图片失败: {}", err);
                None
            }
        }
    }

    fn set_image(&self, data: &[u8]) -> bool {
        let decoded = match image::load_from_memory(data) {
            Ok(img) => img,
            Err(err) => {
                log::error!("无效的图片数据: {}", err);
                return false;
            }
        };

        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        let payload = arboard::ImageData {
            width: width as usize,
            height: height as usize,
            bytes: Cow::Owned(rgba.into_raw()),
        };

        match arboard::Clipboard::new() {
            Ok(mut clipboard) => match clipboard.set_image(payload) {
                Ok(()) => true,
                Err(err) => {
                    log::error!("写入剪贴板图片失败: {}", err);
                    false
                }
            },
            Err(err) => {
                log::error!("打开剪贴板失败: {}", err);
                false
            }
        }
    }
}

// ============================================================================
// 子进程工具函数
// ============================================================================

fn run_capture(program: &str, args: &[&str]) -> Option<Vec<u8>> {
    let output = Command::new(program).args(args).output().ok()?;
    if output.status.success() {
        Some(output.stdout)
    } else {
        None
    }
}

fn run_with_stdin(program: &str, args: &[&str], input: &[u8]) -> bool {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn();

    let mut child = match child {
        Ok(child) => child,
        Err(_) => return false,
    };

    if let Some(mut stdin) = child.stdin.take() {
        if stdin.write_all(input).is_err() {
            let _ = child.wait();
            return false;
        }
    }

    child.wait().map(|status| status.success()).unwrap_or(false)
}

// ============================================================================
// Windows：powershell
// ============================================================================

#[cfg(target_os = "windows")]
pub struct WindowsClipboard;

#[cfg(target_os = "windows")]
impl ClipboardPort for WindowsClipboard {
    fn get_text(&self) -> Option<String> {
        let stdout = run_capture("powershell", &["-command", "Get-Clipboard"])?;
        let text = String::from_utf8_lossy(&stdout)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        Some(text)
    }

    fn set_text(&self, text: &str) -> bool {
        run_with_stdin(
            "powershell",
            &["-command", "$input | Set-Clipboard"],
            text.as_bytes(),
        )
    }

    fn get_image(&self) -> Option<Vec<u8>> {
        let temp = tempfile::Builder::new().suffix(".png").tempfile().ok()?;
        let path = temp.path().to_string_lossy().to_string();

        let script = format!(
            "Add-Type -Assembly System.Windows.Forms; \
             $img = [Windows.Forms.Clipboard]::GetImage(); \
             if ($img) {{ $img.Save(\"{path}\"); exit 0 }} else {{ exit 1 }}"
        );
        run_capture("powershell", &["-command", &script])?;

        std::fs::read(temp.path()).ok().filter(|data| !data.is_empty())
    }

    fn set_image(&self, data: &[u8]) -> bool {
        if !is_valid_image(data) {
            log::error!("无效的图片数据，拒绝写入剪贴板");
            return false;
        }

        let Ok(mut temp) = tempfile::Builder::new().suffix(".png").tempfile() else {
            return false;
        };
        if temp.write_all(data).is_err() || temp.flush().is_err() {
            return false;
        }

        let path = temp.path().to_string_lossy().to_string();
        let script = format!(
            "Add-Type -Assembly System.Windows.Forms; \
             Add-Type -Assembly System.Drawing; \
             $img = [System.Drawing.Image]::FromFile(\"{path}\"); \
             [Windows.Forms.Clipboard]::SetImage($img)"
        );
        run_capture("powershell", &["-command", &script]).is_some()
    }
}

// ============================================================================
// macOS：pbpaste / pbcopy / pngpaste / osascript
// ============================================================================

#[cfg(target_os = "macos")]
pub struct MacosClipboard;

#[cfg(target_os = "macos")]
impl ClipboardPort for MacosClipboard {
    fn get_text(&self) -> Option<String> {
        let stdout = run_capture("pbpaste", &[])?;
        Some(String::from_utf8_lossy(&stdout).into_owned())
    }

    fn set_text(&self, text: &str) -> bool {
        run_with_stdin("pbcopy", &[], text.as_bytes())
    }

    fn get_image(&self) -> Option<Vec<u8>> {
        let temp = tempfile::Builder::new().suffix(".png").tempfile().ok()?;
        let path = temp.path().to_string_lossy().to_string();

        run_capture("pngpaste", &[&path])?;
        std::fs::read(temp.path()).ok().filter(|data| !data.is_empty())
    }

    fn set_image(&self, data: &[u8]) -> bool {
        if !is_valid_image(data) {
            log::error!("无效的图片数据，拒绝写入剪贴板");
            return false;
        }

        let Ok(mut temp) = tempfile::Builder::new().suffix(".png").tempfile() else {
            return false;
        };
        if temp.write_all(data).is_err() || temp.flush().is_err() {
            return false;
        }

        let script = format!(
            "set the clipboard to (read (POSIX file \"{}\") as «class PNGf»)",
            temp.path().to_string_lossy()
        );
        run_capture("osascript", &["-e", &script]).is_some()
    }
}

// ============================================================================
// Linux：xclip / xsel
// ============================================================================

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub struct LinuxClipboard;

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
impl ClipboardPort for LinuxClipboard {
    fn get_text(&self) -> Option<String> {
        for (program, args) in [
            ("xclip", &["-selection", "clipboard", "-o"][..]),
            ("xsel", &["-b", "-o"][..]),
        ] {
            if let Some(stdout) = run_capture(program, args) {
                return Some(String::from_utf8_lossy(&stdout).into_owned());
            }
        }
        log::debug!("读取剪贴板失败: xclip/xsel 不可用");
        None
    }

    fn set_text(&self, text: &str) -> bool {
        for (program, args) in [
            ("xclip", &["-selection", "clipboard"][..]),
            ("xsel", &["-b", "-i"][..]),
        ] {
            if run_with_stdin(program, args, text.as_bytes()) {
                return true;
            }
        }
        log::debug!("写入剪贴板失败: xclip/xsel 不可用");
        false
    }

    fn get_image(&self) -> Option<Vec<u8>> {
        for mime in ["image/png", "image/jpeg", "image/bmp"] {
            if let Some(data) = run_capture("xclip", &["-selection", "clipboard", "-t", mime, "-o"])
            {
                if !data.is_empty() {
                    return Some(data);
                }
            }
        }
        None
    }

    fn set_image(&self, data: &[u8]) -> bool {
        if !is_valid_image(data) {
            log::error!("无效的图片数据，拒绝写入剪贴板");
            return false;
        }

        let mime = image_mime_type(data);
        run_with_stdin("xclip", &["-selection", "clipboard", "-t", mime], data)
    }
}
