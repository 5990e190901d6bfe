//! 客户端统一错误类型
//!
//! 区分四类失败：底层传输、协议违例、服务端上报的 System.Exception、
//! 以及无法归类的非 2xx 状态。库内部从不重试，每个请求只上报一次。

use thiserror::Error;

use crate::multipart::MultipartError;

/// AVS 客户端错误
#[derive(Debug, Error)]
pub enum AvsError {
    /// TCP / TLS / HTTP2 层的失败，原样透传
    #[error("传输错误: {0}")]
    Transport(#[from] reqwest::Error),

    /// 服务端上报的 System.Exception（多部分体内或错误响应体）
    #[error("{code}: {description}")]
    Exception { code: String, description: String },

    /// 非 2xx 且响应体无法解析出异常码
    #[error("request failed with {0}")]
    Status(u16),

    /// 响应结构不符合协议预期（缺少 directive 字段、未知部分等）
    #[error("协议错误: {0}")]
    Protocol(String),

    /// 多部分流解析失败
    #[error(transparent)]
    Multipart(#[from] MultipartError),

    /// JSON 编解码失败
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl AvsError {
    /// 是否为服务端明确上报的异常
    pub fn is_server_exception(&self) -> bool {
        matches!(self, AvsError::Exception { .. })
    }

    /// 服务端异常码（如 `UNAUTHORIZED`）
    pub fn exception_code(&self) -> Option<&str> {
        match self {
            AvsError::Exception { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_display() {
        let err = AvsError::Exception {
            code: "UNAUTHORIZED".to_string(),
            description: "Bad token".to_string(),
        };
        assert_eq!(err.to_string(), "UNAUTHORIZED: Bad token");
        assert!(err.is_server_exception());
        assert_eq!(err.exception_code(), Some("UNAUTHORIZED"));
    }

    #[test]
    fn test_status_display() {
        let err = AvsError::Status(503);
        assert_eq!(err.to_string(), "request failed with 503");
        assert!(!err.is_server_exception());
    }
}
