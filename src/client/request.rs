//! 发往 AVS 的请求

use std::fmt;

use tokio::io::AsyncRead;

use crate::message::Message;

/// 惰性的音频字节源；请求发送时才被读取，边读边传
pub type AudioSource = Box<dyn AsyncRead + Send + Unpin>;

/// 一次事件请求：一个事件、可选的音频采集和若干状态上下文
///
/// `access_token` 只进请求头，不会被序列化进报文。上下文按加入
/// 顺序上线。
pub struct Request {
    pub access_token: String,
    pub audio: Option<AudioSource>,
    pub context: Vec<Message>,
    pub event: Message,
}

impl Request {
    pub fn new(access_token: impl Into<String>, event: Message) -> Self {
        Self {
            access_token: access_token.into(),
            audio: None,
            context: Vec::new(),
            event,
        }
    }

    /// 附加音频采集源（例如 Recognize 的拾音流）
    pub fn with_audio(mut self, audio: impl AsyncRead + Send + Unpin + 'static) -> Self {
        self.audio = Some(Box::new(audio));
        self
    }

    /// 追加一条状态上下文，顺序保留
    pub fn add_context(&mut self, context: Message) {
        self.context.push(context);
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("event", &self.event.canonical_name())
            .field("context", &self.context.len())
            .field("audio", &self.audio.is_some())
            .finish()
    }
}
