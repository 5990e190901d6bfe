//! AVS 报文模型
//!
//! 指令、事件和上下文共用同一种信封：一个字符串到字符串的头部表加
//! 一个 JSON 负载。入站信封可以按 `"<namespace>.<name>"` 规范名提升
//! 为带类型的变体，提升是无损且幂等的，未注册的规范名保持原始信封。
//!
//! # 主要组件
//!
//! - `payloads`: 各变体的负载结构与取值枚举
//! - `event`: 出站事件的工厂函数
//! - `context`: 出站上下文的工厂函数

pub mod context;
pub mod event;
pub mod payloads;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use self::payloads::{
    Alert, ClearQueuePayload, DeleteAlertPayload, ExceptionPayload, ExpectSpeechPayload,
    MutePayload, PlayPayload, SetEndpointPayload, SpeakPayload, VolumePayload,
};

/// 生成一个随机的报文标识（UUID v4）
pub fn new_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// 指令、事件和上下文共用的信封
///
/// 入站信封在构造之后不再修改；出站信封由 `event`/`context` 模块的
/// 工厂函数构造。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub header: BTreeMap<String, String>,
    /// 未解码的 JSON 负载；线上缺省时为 null
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl Message {
    /// 构造一个事件信封；`dialog_request_id` 只在语音轮次内的事件上出现
    pub fn event(
        namespace: &str,
        name: &str,
        message_id: &str,
        dialog_request_id: Option<&str>,
    ) -> Self {
        let mut header = BTreeMap::new();
        header.insert("namespace".to_string(), namespace.to_string());
        header.insert("name".to_string(), name.to_string());
        header.insert("messageId".to_string(), message_id.to_string());
        if let Some(dialog_request_id) = dialog_request_id {
            header.insert("dialogRequestId".to_string(), dialog_request_id.to_string());
        }
        Self {
            header,
            payload: Value::Null,
        }
    }

    /// 构造一个上下文信封（没有 messageId / dialogRequestId）
    pub fn context(namespace: &str, name: &str) -> Self {
        let mut header = BTreeMap::new();
        header.insert("namespace".to_string(), namespace.to_string());
        header.insert("name".to_string(), name.to_string());
        Self {
            header,
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.header.get("namespace").map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.header.get("name").map(String::as_str)
    }

    pub fn message_id(&self) -> Option<&str> {
        self.header.get("messageId").map(String::as_str)
    }

    pub fn dialog_request_id(&self) -> Option<&str> {
        self.header.get("dialogRequestId").map(String::as_str)
    }

    /// 规范名 `"<namespace>.<name>"`，变体分发的键
    pub fn canonical_name(&self) -> String {
        format!(
            "{}.{}",
            self.namespace().unwrap_or_default(),
            self.name().unwrap_or_default()
        )
    }

    /// 把信封提升为带类型的变体
    ///
    /// 未注册的规范名和负载解码失败都回落为 `TypedMessage::Raw`，
    /// 不会报错；信封本身总是原样保留。
    pub fn typed(self) -> TypedMessage {
        match self.canonical_name().as_str() {
            "Alerts.DeleteAlert" => promote(self, TypedMessage::DeleteAlert),
            "Alerts.SetAlert" => promote(self, TypedMessage::SetAlert),
            "AudioPlayer.ClearQueue" => promote(self, TypedMessage::ClearQueue),
            "AudioPlayer.Play" => promote(self, TypedMessage::Play),
            "AudioPlayer.Stop" => TypedMessage::Stop(self),
            "Speaker.AdjustVolume" => promote(self, TypedMessage::AdjustVolume),
            "Speaker.SetMute" => promote(self, TypedMessage::SetMute),
            "Speaker.SetVolume" => promote(self, TypedMessage::SetVolume),
            "SpeechRecognizer.ExpectSpeech" => promote(self, TypedMessage::ExpectSpeech),
            "SpeechRecognizer.StopCapture" => TypedMessage::StopCapture(self),
            "SpeechSynthesizer.Speak" => promote(self, TypedMessage::Speak),
            "System.Exception" => promote(self, TypedMessage::Exception),
            "System.SetEndpoint" => promote(self, TypedMessage::SetEndpoint),
            "System.ResetUserInactivity" => TypedMessage::ResetUserInactivity(self),
            _ => TypedMessage::Raw(self),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical_name())
    }
}

/// 信封加解码后的负载
#[derive(Debug, Clone, PartialEq)]
pub struct Directive<P> {
    /// 原始信封，保留全部头部键
    pub message: Message,
    pub payload: P,
}

fn promote<P: DeserializeOwned>(
    message: Message,
    wrap: fn(Directive<P>) -> TypedMessage,
) -> TypedMessage {
    let raw = if message.payload.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        message.payload.clone()
    };
    match serde_json::from_value::<P>(raw) {
        Ok(payload) => wrap(Directive { message, payload }),
        Err(_) => TypedMessage::Raw(message),
    }
}

/// 带类型的报文：已注册规范名的封闭集合，加上原始信封兜底
///
/// # 示例
///
/// ```ignore
/// match directive.typed() {
///     TypedMessage::Speak(speak) => {
///         if let Some(cid) = speak.payload.content_id() {
///             let audio = &response.content[cid];
///             // 播放 audio ...
///         }
///     }
///     TypedMessage::Raw(message) => {
///         tracing::warn!("[AVS] 未处理的指令: {}", message);
///     }
///     _ => {}
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum TypedMessage {
    DeleteAlert(Directive<DeleteAlertPayload>),
    SetAlert(Directive<Alert>),
    ClearQueue(Directive<ClearQueuePayload>),
    Play(Directive<PlayPayload>),
    Stop(Message),
    AdjustVolume(Directive<VolumePayload>),
    SetMute(Directive<MutePayload>),
    SetVolume(Directive<VolumePayload>),
    ExpectSpeech(Directive<ExpectSpeechPayload>),
    StopCapture(Message),
    Speak(Directive<SpeakPayload>),
    Exception(Directive<ExceptionPayload>),
    SetEndpoint(Directive<SetEndpointPayload>),
    ResetUserInactivity(Message),
    /// 未注册的规范名，或负载无法按变体解码
    Raw(Message),
}

impl TypedMessage {
    /// 底层信封
    pub fn message(&self) -> &Message {
        match self {
            TypedMessage::DeleteAlert(d) => &d.message,
            TypedMessage::SetAlert(d) => &d.message,
            TypedMessage::ClearQueue(d) => &d.message,
            TypedMessage::Play(d) => &d.message,
            TypedMessage::Stop(m) => m,
            TypedMessage::AdjustVolume(d) => &d.message,
            TypedMessage::SetMute(d) => &d.message,
            TypedMessage::SetVolume(d) => &d.message,
            TypedMessage::ExpectSpeech(d) => &d.message,
            TypedMessage::StopCapture(m) => m,
            TypedMessage::Speak(d) => &d.message,
            TypedMessage::Exception(d) => &d.message,
            TypedMessage::SetEndpoint(d) => &d.message,
            TypedMessage::ResetUserInactivity(m) => m,
            TypedMessage::Raw(m) => m,
        }
    }

    /// 取回信封的所有权
    pub fn into_message(self) -> Message {
        match self {
            TypedMessage::DeleteAlert(d) => d.message,
            TypedMessage::SetAlert(d) => d.message,
            TypedMessage::ClearQueue(d) => d.message,
            TypedMessage::Play(d) => d.message,
            TypedMessage::Stop(m) => m,
            TypedMessage::AdjustVolume(d) => d.message,
            TypedMessage::SetMute(d) => d.message,
            TypedMessage::SetVolume(d) => d.message,
            TypedMessage::ExpectSpeech(d) => d.message,
            TypedMessage::StopCapture(m) => m,
            TypedMessage::Speak(d) => d.message,
            TypedMessage::Exception(d) => d.message,
            TypedMessage::SetEndpoint(d) => d.message,
            TypedMessage::ResetUserInactivity(m) => m,
            TypedMessage::Raw(m) => m,
        }
    }

    /// 提升已经完成，原样返回（幂等）
    pub fn typed(self) -> TypedMessage {
        self
    }
}
