//! 多部分流解析错误类型
//!
//! 区分底层读取失败、协议违例和缓冲区约束三类错误。
//! 解析错误一律不重试，由调用方决定如何处理。

use thiserror::Error;

/// 多部分流解析错误
#[derive(Debug, Error)]
pub enum MultipartError {
    /// 在终止边界之前流就结束了
    #[error("多部分流意外结束")]
    UnexpectedEof,

    /// 单行数据超出了预读窗口（失控的头部行或边界行）
    #[error("预读缓冲区已满，无法继续填充")]
    BufferOverflow,

    /// 部分头部块格式非法
    #[error("非法的部分头部: {0}")]
    Header(String),

    /// 违反多部分协议（媒体类型、参数或边界结构不符合预期）
    #[error("多部分协议错误: {0}")]
    Protocol(String),

    /// 底层字节流读取失败
    #[error("底层流读取失败: {0}")]
    Io(#[from] std::io::Error),
}

impl MultipartError {
    /// 判断是否为底层传输错误（而非报文本身的问题）
    pub fn is_io(&self) -> bool {
        matches!(self, MultipartError::Io(_))
    }
}
