//! AVS HTTP/2 客户端
//!
//! 所有请求走同一个连接池：事件请求（POST /events）、长连的下行
//! 通道（GET /directives）和心跳（GET /ping）在 HTTP/2 上多路复用。
//! 事件请求的多部分体在发送的同时生成，服务端因此可以在设备还在
//! 说话时就开始断句。
//!
//! # 主要组件
//!
//! - `Client`: 入口，持有端点地址和连接池，可跨任务并发使用
//! - `request` / `response`: 请求与响应模型
//! - `downchannel`: 服务端推送指令的长连消费

mod downchannel;
mod request;
mod response;

pub use downchannel::Downchannel;
pub use request::{AudioSource, Request};
pub use response::Response;

use std::collections::HashMap;

use bytes::Bytes;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::AvsError;
use crate::message::payloads::ExceptionPayload;
use crate::message::{event, Message, TypedMessage};
use crate::multipart::{parse_media_type, MultipartReader, MultipartWriter};

/// AVS 北美区的默认端点
pub const DEFAULT_ENDPOINT: &str = "https://avs-alexa-na.amazon.com";
/// 事件路径（POST）
pub const EVENTS_PATH: &str = "/v20160207/events";
/// 下行通道路径（GET，长轮询）
pub const DIRECTIVES_PATH: &str = "/v20160207/directives";
/// 心跳路径（GET）
pub const PING_PATH: &str = "/ping";

/// 音频源每次搬运的块大小
const AUDIO_CHUNK_SIZE: usize = 8192;
/// 请求体管道的深度（块数）
const BODY_CHANNEL_CAPACITY: usize = 8;

/// AVS 客户端
///
/// 只持有端点地址和 reqwest 连接池，没有可变状态，克隆和跨任务
/// 共享都是廉价的。
///
/// # 示例
///
/// ```ignore
/// let client = Client::new();
/// let request = Request::new(token, event::recognize("m1", "d1"))
///     .with_audio(tokio::fs::File::open("request.wav").await?);
/// let response = client.execute(request).await?;
/// for directive in response.directives {
///     match directive.typed() {
///         TypedMessage::Speak(speak) => { /* 播放 */ }
///         _ => {}
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Client {
    endpoint: String,
    http: reqwest::Client,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// 指向默认端点的客户端
    pub fn new() -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT)
    }

    /// 指向指定端点的客户端（其他区域，或测试服务器）
    ///
    /// AVS 要求 HTTP/2；客户端以 prior knowledge 模式建连，下行通道
    /// 是长轮询，因此不设整体超时。
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .http2_prior_knowledge()
            .build()
            .expect("初始化 HTTP/2 客户端失败");
        Self {
            endpoint: endpoint.into(),
            http,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 发送一次事件请求并解析完整响应
    ///
    /// 请求体由独立任务边生成边发送：先写 metadata JSON 部分，再把
    /// 音频源整块搬进管道。音频源出错会拆掉管道，请求随之以该错误
    /// 失败。取消等待中的调用会中止请求并回收生产任务。
    pub async fn execute(&self, request: Request) -> Result<Response, AvsError> {
        let Request {
            access_token,
            audio,
            context,
            event,
        } = request;
        debug!("[AVS] 发送事件 {}", event.canonical_name());

        let writer = MultipartWriter::new();
        let content_type = writer.form_data_content_type();
        let metadata = serde_json::to_vec(&Metadata {
            context: &context,
            event: &event,
        })?;

        let (tx, mut rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(BODY_CHANNEL_CAPACITY);
        tokio::spawn(produce_body(writer, metadata, audio, tx));
        let body_stream = futures::stream::poll_fn(move |cx| rx.poll_recv(cx));

        let response = self
            .http
            .post(format!("{}{}", self.endpoint, EVENTS_PATH))
            .header("Authorization", format!("Bearer {access_token}"))
            .header("Content-Type", content_type)
            .body(reqwest::Body::wrap_stream(body_stream))
            .send()
            .await?;
        let request_id = response
            .headers()
            .get("x-amzn-requestid")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let Some(response) = check_status(response).await? else {
            // 204：服务端没有任何指令要下发
            return Ok(Response {
                request_id,
                ..Default::default()
            });
        };

        let mut reader = multipart_reader_from_response(response)?;
        let mut directives = Vec::new();
        let mut content = HashMap::new();
        while let Some(mut part) = reader.next_part().await? {
            let content_id = part.content_id().map(str::to_owned);
            let media_type = match part.content_type() {
                Some(value) => Some(parse_media_type(value)?.0),
                None => None,
            };
            let data = part.read_to_end().await?;
            if let Some(id) = content_id {
                // 可被指令以 cid: 引用的附件
                content.insert(strip_content_id(&id).to_owned(), data);
            } else if media_type.as_deref() == Some("application/json") {
                directives.push(decode_directive(&data)?);
            } else {
                return Err(AvsError::Protocol(format!(
                    "无法处理的多部分段, Content-Type: {media_type:?}"
                )));
            }
        }
        // 附件可能晚于引用它的指令到达，所以等整个响应读完再校验
        if let Some(cid) = unresolved_attachment(&directives, &content) {
            return Err(AvsError::Protocol(format!(
                "指令引用了响应中不存在的附件: cid:{cid}"
            )));
        }
        debug!(
            "[AVS] 响应 {}: {} 条指令, {} 个附件",
            request_id,
            directives.len(),
            content.len()
        );
        Ok(Response {
            request_id,
            directives,
            content,
        })
    }

    /// 建立下行通道：一条长连的 GET，服务端经由它推送指令
    ///
    /// 返回的 [`Downchannel`] 按到达顺序产出指令，对端关闭、解析
    /// 出错或调用方放下通道时序列终止，且只终止一次。通道不会自动
    /// 重连，由调用方重新建立。
    pub async fn create_downchannel(&self, access_token: &str) -> Result<Downchannel, AvsError> {
        let response = self
            .http
            .get(format!("{}{}", self.endpoint, DIRECTIVES_PATH))
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await?;
        match check_status(response).await? {
            Some(response) => {
                debug!("[DOWNCHANNEL] 下行通道已建立");
                Downchannel::spawn(response)
            }
            None => Ok(Downchannel::closed()),
        }
    }

    /// 心跳，告知服务端连接仍然存活
    pub async fn ping(&self, access_token: &str) -> Result<(), AvsError> {
        let response = self
            .http
            .get(format!("{}{}", self.endpoint, PING_PATH))
            .header("Authorization", format!("Bearer {access_token}"))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    /// 发送单个事件（不带音频和上下文）
    pub async fn post_event(
        &self,
        access_token: &str,
        event: Message,
    ) -> Result<Response, AvsError> {
        self.execute(Request::new(access_token, event)).await
    }

    /// 发送 Recognize 事件并随请求流式上传音频采集
    pub async fn post_recognize(
        &self,
        access_token: &str,
        message_id: &str,
        dialog_request_id: &str,
        audio: impl tokio::io::AsyncRead + Send + Unpin + 'static,
    ) -> Result<Response, AvsError> {
        let request = Request::new(access_token, event::recognize(message_id, dialog_request_id))
            .with_audio(audio);
        self.execute(request).await
    }

    /// 发送 SynchronizeState 事件和全部状态上下文
    pub async fn post_synchronize_state(
        &self,
        access_token: &str,
        message_id: &str,
        context: Vec<Message>,
    ) -> Result<Response, AvsError> {
        let mut request = Request::new(access_token, event::synchronize_state(message_id));
        request.context = context;
        self.execute(request).await
    }
}

/// metadata 部分的报文形状：`{ "context": [...], "event": {...} }`
#[derive(Serialize)]
struct Metadata<'a> {
    context: &'a [Message],
    event: &'a Message,
}

/// 在独立任务里生成请求体
///
/// 任何一步失败都会向管道送入错误并停止，HTTP 层随即以该错误中止
/// 发送。调用方取消请求时管道关闭，任务在下一次 send 时退出。
async fn produce_body(
    mut writer: MultipartWriter,
    metadata: Vec<u8>,
    audio: Option<AudioSource>,
    tx: mpsc::Sender<Result<Bytes, std::io::Error>>,
) {
    if tx.send(Ok(writer.begin_json_part("metadata"))).await.is_err() {
        return;
    }
    if tx.send(Ok(Bytes::from(metadata))).await.is_err() {
        return;
    }
    if let Some(mut audio) = audio {
        if tx
            .send(Ok(writer.begin_file_part("audio", "audio.wav")))
            .await
            .is_err()
        {
            return;
        }
        let mut chunk = vec![0u8; AUDIO_CHUNK_SIZE];
        loop {
            match audio.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx
                        .send(Ok(Bytes::copy_from_slice(&chunk[..n])))
                        .await
                        .is_err()
                    {
                        return;
                    }
                }
                Err(e) => {
                    warn!("[AVS] 读取音频源失败: {e}");
                    let _ = tx.send(Err(e)).await;
                    return;
                }
            }
        }
    }
    let _ = tx.send(Ok(writer.finish())).await;
}

/// 状态码策略：200 继续解析，204 无内容，其余读出响应体并尽量
/// 解析成 System.Exception
async fn check_status(response: reqwest::Response) -> Result<Option<reqwest::Response>, AvsError> {
    match response.status().as_u16() {
        200 => Ok(Some(response)),
        204 => Ok(None),
        status => {
            let body = response.bytes().await.unwrap_or_default();
            if let Ok(envelope) = serde_json::from_slice::<ExceptionEnvelope>(&body) {
                if !envelope.payload.code.is_empty() {
                    return Err(AvsError::Exception {
                        code: envelope.payload.code,
                        description: envelope.payload.description,
                    });
                }
            }
            Err(AvsError::Status(status))
        }
    }
}

/// 非 2xx 错误响应体的形状：`{ "payload": { "code", "description" } }`
#[derive(Debug, Default, Deserialize)]
struct ExceptionEnvelope {
    #[serde(default)]
    payload: ExceptionPayload,
}

/// JSON 部分的形状：`{ "directive": <信封> }`
#[derive(Deserialize)]
struct DirectiveEnvelope {
    directive: Option<Message>,
}

pub(crate) fn decode_directive(data: &[u8]) -> Result<Message, AvsError> {
    let envelope: DirectiveEnvelope = serde_json::from_slice(data)?;
    envelope.directive.ok_or_else(|| {
        AvsError::Protocol(format!(
            "响应缺少 directive 字段: {}",
            String::from_utf8_lossy(data)
        ))
    })
}

/// 从响应的 Content-Type 解析出多部分边界
///
/// AVS 下行通道的 `type=application/json` 参数没加引号，严格的参数
/// 解析会拒绝它，先改写成带引号的形式。
fn boundary_from_content_type(content_type: &str) -> Result<String, AvsError> {
    let rewritten =
        content_type.replacen("type=application/json", r#"type="application/json""#, 1);
    let (media_type, params) = parse_media_type(&rewritten)?;
    if !media_type.starts_with("multipart/") {
        return Err(AvsError::Protocol(format!(
            "响应不是多部分报文, Content-Type: {media_type}"
        )));
    }
    params
        .get("boundary")
        .cloned()
        .ok_or_else(|| AvsError::Protocol("Content-Type 缺少 boundary 参数".to_string()))
}

pub(crate) fn multipart_reader_from_response(
    response: reqwest::Response,
) -> Result<MultipartReader, AvsError> {
    let content_type = response
        .headers()
        .get("Content-Type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let boundary = boundary_from_content_type(content_type)?;
    let stream = response
        .bytes_stream()
        .map(|item| item.map_err(std::io::Error::other));
    Ok(MultipartReader::new(stream, &boundary))
}

/// 找出第一个引用了缺失附件的指令，返回缺失的 Content-ID
fn unresolved_attachment(
    directives: &[Message],
    content: &HashMap<String, Vec<u8>>,
) -> Option<String> {
    for directive in directives {
        let content_id = match directive.clone().typed() {
            TypedMessage::Speak(speak) => speak.payload.content_id().map(str::to_owned),
            TypedMessage::Play(play) => play
                .payload
                .audio_item
                .stream
                .content_id()
                .map(str::to_owned),
            _ => None,
        };
        if let Some(content_id) = content_id {
            if !content.contains_key(&content_id) {
                return Some(content_id);
            }
        }
    }
    None
}

/// 去掉 Content-ID 两端成对的尖括号；没有成对出现就原样返回
fn strip_content_id(raw: &str) -> &str {
    raw.strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_content_id_matched_brackets_only() {
        assert_eq!(strip_content_id("<AUDIO>"), "AUDIO");
        assert_eq!(strip_content_id("AUDIO"), "AUDIO");
        assert_eq!(strip_content_id("<AUDIO"), "<AUDIO");
        assert_eq!(strip_content_id("AUDIO>"), "AUDIO>");
        assert_eq!(strip_content_id(""), "");
    }

    #[test]
    fn test_boundary_accepts_unquoted_type_param() {
        let boundary = boundary_from_content_type(
            "multipart/related; boundary=this-is-the-boundary; type=application/json",
        )
        .unwrap();
        assert_eq!(boundary, "this-is-the-boundary");
    }

    #[test]
    fn test_boundary_requires_multipart() {
        let err = boundary_from_content_type("application/json").unwrap_err();
        assert!(matches!(err, AvsError::Protocol(_)));
    }

    #[test]
    fn test_boundary_parameter_required() {
        let err = boundary_from_content_type("multipart/related").unwrap_err();
        assert!(matches!(err, AvsError::Protocol(_)));
    }

    #[test]
    fn test_unresolved_attachment_reference() {
        let speak = Message::event("SpeechSynthesizer", "Speak", "m1", None).with_payload(
            serde_json::json!({ "format": "AUDIO_MPEG", "url": "cid:MISSING", "token": "t" }),
        );
        let directives = vec![speak];
        let mut content = HashMap::new();
        assert_eq!(
            unresolved_attachment(&directives, &content),
            Some("MISSING".to_string())
        );
        content.insert("MISSING".to_string(), vec![1, 2, 3]);
        assert_eq!(unresolved_attachment(&directives, &content), None);
    }

    #[test]
    fn test_decode_directive_requires_field() {
        let message =
            decode_directive(br#"{"directive":{"header":{"namespace":"A","name":"B"}}}"#).unwrap();
        assert_eq!(message.canonical_name(), "A.B");

        let err = decode_directive(br#"{"other":1}"#).unwrap_err();
        assert!(matches!(err, AvsError::Protocol(_)));
    }

    #[test]
    fn test_metadata_wire_shape() {
        let event = event::synchronize_state("m1");
        let context = vec![crate::message::context::volume_state(10, false)];
        let json = serde_json::to_value(Metadata {
            context: &context,
            event: &event,
        })
        .unwrap();
        assert!(json["context"].is_array());
        assert_eq!(json["event"]["header"]["name"], "SynchronizeState");
    }
}
