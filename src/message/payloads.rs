//! 指令与上下文的负载结构
//!
//! 毫秒字段在线上是数字（整数或浮点都可能出现），这里统一用 `f64`
//! 接收并提供 `Duration` 访问器。以 `cid:` 开头的 url 表示引用同一
//! 响应里的附件，可通过 `content_id` 取出裸的 Content-ID。

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// 闹钟类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertType {
    /// 定时闹钟（某个具体时刻）
    Alarm,
    /// 倒计时
    Timer,
}

/// 清空播放队列的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClearBehavior {
    /// 连同当前播放的一起清空
    ClearAll,
    /// 只清空排队中的
    ClearEnqueued,
}

/// 音频项插入播放队列的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayBehavior {
    /// 排在当前队列之后
    Enqueue,
    /// 立即播放并丢弃整个队列
    ReplaceAll,
    /// 当前曲目播完后播放，替换排队中的
    ReplaceEnqueued,
}

/// 设备播放器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerActivity {
    BufferUnderrun,
    Idle,
    Paused,
    Playing,
    Finished,
}

/// 语音识别的拾音场景
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeechProfile {
    CloseTalk,
    NearField,
    FarField,
}

/// 一条闹钟记录（SetAlert 指令的负载，也出现在 AlertsState 上下文里）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub token: String,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    /// ISO-8601 时间串，原样透传
    #[serde(default, rename = "scheduledTime")]
    pub scheduled_time: String,
}

impl Alert {
    pub fn new(
        token: impl Into<String>,
        alert_type: AlertType,
        scheduled_time: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            alert_type,
            scheduled_time: scheduled_time.into(),
        }
    }
}

/// 进度上报的节奏
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    #[serde(
        default,
        rename = "progressReportDelayInMilliseconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub delay_in_milliseconds: Option<f64>,
    #[serde(
        default,
        rename = "progressReportIntervalInMilliseconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub interval_in_milliseconds: Option<f64>,
}

impl ProgressReport {
    pub fn delay(&self) -> Option<Duration> {
        self.delay_in_milliseconds.map(millis_to_duration)
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval_in_milliseconds.map(millis_to_duration)
    }
}

/// 可播放的音频流，可能是远程 URL，也可能引用响应附件
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStream {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub expiry_time: String,
    #[serde(default)]
    pub offset_in_milliseconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_previous_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_report: Option<ProgressReport>,
}

impl AudioStream {
    /// 音频随响应附带时，返回附件的 Content-ID
    pub fn content_id(&self) -> Option<&str> {
        self.url.strip_prefix("cid:")
    }

    pub fn offset(&self) -> Duration {
        millis_to_duration(self.offset_in_milliseconds)
    }
}

/// 一个待播放的音频项
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioItem {
    #[serde(default)]
    pub audio_item_id: String,
    #[serde(default)]
    pub stream: AudioStream,
}

/// `AudioPlayer.Play` 的负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayPayload {
    pub audio_item: AudioItem,
    pub play_behavior: PlayBehavior,
}

/// `AudioPlayer.ClearQueue` 的负载
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearQueuePayload {
    pub clear_behavior: ClearBehavior,
}

/// `Alerts.DeleteAlert` 的负载
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeleteAlertPayload {
    #[serde(default)]
    pub token: String,
}

/// `Speaker.SetVolume` / `Speaker.AdjustVolume` 的负载
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VolumePayload {
    #[serde(default)]
    pub volume: i64,
}

/// `Speaker.SetMute` 的负载
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MutePayload {
    #[serde(default)]
    pub mute: bool,
}

/// `SpeechRecognizer.ExpectSpeech` 的负载
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectSpeechPayload {
    #[serde(default)]
    pub timeout_in_milliseconds: f64,
}

impl ExpectSpeechPayload {
    /// 等待用户继续说话的超时；由调用方执行
    pub fn timeout(&self) -> Duration {
        millis_to_duration(self.timeout_in_milliseconds)
    }
}

/// `SpeechSynthesizer.Speak` 的负载
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeakPayload {
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
}

impl SpeakPayload {
    /// 语音随响应附带时，返回附件的 Content-ID
    pub fn content_id(&self) -> Option<&str> {
        self.url.strip_prefix("cid:")
    }
}

/// `System.SetEndpoint` 的负载
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SetEndpointPayload {
    #[serde(default)]
    pub endpoint: String,
}

/// `System.Exception` 的负载，也会出现在非 2xx 的错误响应体里
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExceptionPayload {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
}

fn millis_to_duration(ms: f64) -> Duration {
    Duration::from_secs_f64(ms.max(0.0) / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_form() {
        assert_eq!(serde_json::to_string(&AlertType::Alarm).unwrap(), "\"ALARM\"");
        assert_eq!(
            serde_json::to_string(&ClearBehavior::ClearEnqueued).unwrap(),
            "\"CLEAR_ENQUEUED\""
        );
        assert_eq!(
            serde_json::to_string(&PlayBehavior::ReplaceAll).unwrap(),
            "\"REPLACE_ALL\""
        );
        assert_eq!(
            serde_json::to_string(&PlayerActivity::BufferUnderrun).unwrap(),
            "\"BUFFER_UNDERRUN\""
        );
        assert_eq!(
            serde_json::to_string(&SpeechProfile::CloseTalk).unwrap(),
            "\"CLOSE_TALK\""
        );
    }

    #[test]
    fn test_millisecond_fields_accept_both_literals() {
        let int_form: ExpectSpeechPayload =
            serde_json::from_str(r#"{"timeoutInMilliseconds":4500}"#).unwrap();
        let float_form: ExpectSpeechPayload =
            serde_json::from_str(r#"{"timeoutInMilliseconds":4500.0}"#).unwrap();
        assert_eq!(int_form.timeout(), Duration::from_millis(4500));
        assert_eq!(float_form.timeout(), Duration::from_millis(4500));
    }

    #[test]
    fn test_speak_content_id() {
        let speak = SpeakPayload {
            format: "AUDIO_MPEG".to_string(),
            url: "cid:DEADBEEF".to_string(),
            token: "t".to_string(),
        };
        assert_eq!(speak.content_id(), Some("DEADBEEF"));

        let remote = SpeakPayload {
            url: "https://example.com/a.mp3".to_string(),
            ..Default::default()
        };
        assert_eq!(remote.content_id(), None);
    }

    #[test]
    fn test_play_payload_decodes_nested_stream() {
        let payload: PlayPayload = serde_json::from_str(
            r#"{
                "audioItem": {
                    "audioItemId": "item-1",
                    "stream": {
                        "token": "tok",
                        "url": "cid:AUDIO",
                        "expiryTime": "2024-01-01T00:00:00+0000",
                        "offsetInMilliseconds": 1500,
                        "progressReport": {
                            "progressReportDelayInMilliseconds": 100,
                            "progressReportIntervalInMilliseconds": 250.5
                        }
                    }
                },
                "playBehavior": "REPLACE_ALL"
            }"#,
        )
        .unwrap();
        assert_eq!(payload.play_behavior, PlayBehavior::ReplaceAll);
        let stream = &payload.audio_item.stream;
        assert_eq!(stream.content_id(), Some("AUDIO"));
        assert_eq!(stream.offset(), Duration::from_millis(1500));
        let report = stream.progress_report.unwrap();
        assert_eq!(report.delay(), Some(Duration::from_millis(100)));
        assert_eq!(report.interval(), Some(Duration::from_micros(250_500)));
    }

    #[test]
    fn test_alert_round_trip() {
        let alert = Alert::new("tok", AlertType::Timer, "2024-06-01T08:00:00+0000");
        let json = serde_json::to_string(&alert).unwrap();
        assert!(json.contains("\"type\":\"TIMER\""));
        assert!(json.contains("\"scheduledTime\""));
        let back: Alert = serde_json::from_str(&json).unwrap();
        assert_eq!(back, alert);
    }
}
