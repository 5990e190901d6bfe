//! Amazon Alexa Voice Service (AVS) 的 HTTP/2 异步客户端
//!
//! 设备把用户语音和状态事件送上云端，云端以带类型的指令应答：
//! 既有随请求同步返回的，也有经由长连"下行通道"异步推送的。两个
//! 方向都是 multipart/MIME 信封，即一段 JSON 报文加上以 Content-ID
//! 引用的二进制附件。
//!
//! # 主要组件
//!
//! - `client`: HTTP/2 传输、事件请求（`execute`）、下行通道和心跳
//! - `message`: 信封模型、带类型的指令变体、事件与上下文工厂
//! - `multipart`: 开放流上的多部分增量解析与出站报文渲染
//! - `error`: 统一错误类型
//!
//! # 发送 Recognize 事件
//!
//! ```ignore
//! use voicecast::{Client, Request, TypedMessage, message::event, message::new_message_id};
//!
//! let client = Client::new();
//! let audio = tokio::fs::File::open("./request.wav").await?;
//! let response = client
//!     .post_recognize(&access_token, &new_message_id(), &dialog_id, audio)
//!     .await?;
//! for directive in response.directives {
//!     match directive.typed() {
//!         TypedMessage::Speak(speak) => {
//!             if let Some(cid) = speak.payload.content_id() {
//!                 std::fs::write("./speak.mp3", &response.content[cid])?;
//!             }
//!         }
//!         other => println!("未处理的指令: {}", other.message()),
//!     }
//! }
//! ```
//!
//! # 消费下行通道
//!
//! ```ignore
//! let mut downchannel = client.create_downchannel(&access_token).await?;
//! while let Some(directive) = downchannel.next().await {
//!     match directive?.typed() {
//!         TypedMessage::SetAlert(alert) => {
//!             println!("设闹钟: {}", alert.payload.scheduled_time);
//!         }
//!         other => println!("未处理的指令: {}", other.message()),
//!     }
//! }
//! ```
//!
//! 访问令牌的获取与刷新、音频采集与播放都在本库职责之外，调用方
//! 提供现成的 Bearer token 和音频字节源即可。

pub mod client;
pub mod error;
pub mod message;
pub mod multipart;

pub use client::{
    AudioSource, Client, Downchannel, Request, Response, DEFAULT_ENDPOINT, DIRECTIVES_PATH,
    EVENTS_PATH, PING_PATH,
};
pub use error::AvsError;
pub use message::{new_message_id, Directive, Message, TypedMessage};
pub use multipart::{MultipartError, MultipartReader, MultipartWriter, Part};
