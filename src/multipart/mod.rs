//! 开放流上的 MIME 多部分编解码
//!
//! AVS 的响应和下行通道都是 multipart/MIME 信封：一段 JSON 报文加上
//! 若干以 Content-ID 引用的二进制附件。下行通道的响应体永不关闭，
//! 因此这里的读取器按增量方式工作，预读有上界。
//!
//! # 主要组件
//!
//! - `reader`: 开放流上的增量多部分读取器
//! - `writer`: 出站 multipart/form-data 渲染
//! - `mime`: 媒体类型与参数解析
//! - `error`: 本模块的错误类型

mod error;
mod mime;
mod reader;
mod writer;


pub use error::MultipartError;
pub use mime::parse_media_type;
pub use reader::{ByteStream, MultipartReader, Part, PEEK_BUFFER_SIZE};
pub use writer::MultipartWriter;
