//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 定义全局统一的 `AppError` 枚举，替代各模块中分散的
//! `.map_err(|e| e.to_string())`、`format!(...)` 等不一致模式。
//!
//! 组件内部通过 `?` 传播；在边界（CLI 输出 / HTTP 响应 / 监控循环）
//! 捕获并记录日志，对用户只呈现简短消息，不暴露内部堆栈。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - 实现 `Serialize` 将错误序列化为字符串，供 Web API 的 JSON 响应使用。

use serde::Serialize;

/// 应用级统一错误类型
///
/// 存储、剪贴板与配置层均返回此类型，确保各前端收到一致的错误格式。
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 剪贴板读写操作失败
    #[error("剪贴板操作失败: {0}")]
    Clipboard(String),

    /// 图片内容无效或解码失败
    #[error("图片处理失败: {0}")]
    Image(String),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),

    /// 配置或存储目录不可用
    #[error("存储目录不可用: {0}")]
    Storage(String),

    /// 数据库操作失败
    #[error("数据库错误: {0}")]
    Database(String),
}

/// Web API 的错误响应需要 JSON 序列化。
/// 将错误序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
