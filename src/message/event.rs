//! 出站事件的工厂函数
//!
//! 每个事件都是"信封 + 负载"：头部固定为
//! `{ namespace, name, messageId[, dialogRequestId] }`，负载随事件而定。
//! `message_id` 由调用方提供，通常来自 [`new_message_id`](super::new_message_id)。
//! 偏移量和时长在线上是毫秒整数。

use std::time::Duration;

use serde_json::json;

use super::payloads::{PlayerActivity, SpeechProfile};
use super::Message;

/// Recognize 事件携带的音频格式：16 kHz 单声道 16 位 PCM
pub const RECOGNIZE_AUDIO_FORMAT: &str = "AUDIO_L16_RATE_16000_CHANNELS_1";

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

// ============================================================================
// SpeechRecognizer
// ============================================================================

/// Recognize 事件（默认拾音场景 CLOSE_TALK）
///
/// 这是唯一属于语音轮次、需要 `dialog_request_id` 的事件。
pub fn recognize(message_id: &str, dialog_request_id: &str) -> Message {
    recognize_with_profile(message_id, dialog_request_id, SpeechProfile::CloseTalk)
}

/// 指定拾音场景的 Recognize 事件
pub fn recognize_with_profile(
    message_id: &str,
    dialog_request_id: &str,
    profile: SpeechProfile,
) -> Message {
    Message::event(
        "SpeechRecognizer",
        "Recognize",
        message_id,
        Some(dialog_request_id),
    )
    .with_payload(json!({
        "profile": profile,
        "format": RECOGNIZE_AUDIO_FORMAT,
    }))
}

/// ExpectSpeechTimedOut 事件
pub fn expect_speech_timed_out(message_id: &str) -> Message {
    Message::event("SpeechRecognizer", "ExpectSpeechTimedOut", message_id, None)
        .with_payload(json!({}))
}

// ============================================================================
// SpeechSynthesizer
// ============================================================================

/// SpeechStarted 事件
pub fn speech_started(message_id: &str, token: &str) -> Message {
    Message::event("SpeechSynthesizer", "SpeechStarted", message_id, None)
        .with_payload(json!({ "token": token }))
}

/// SpeechFinished 事件
pub fn speech_finished(message_id: &str, token: &str) -> Message {
    Message::event("SpeechSynthesizer", "SpeechFinished", message_id, None)
        .with_payload(json!({ "token": token }))
}

// ============================================================================
// AudioPlayer
// ============================================================================

fn playback_lifecycle(name: &str, message_id: &str, token: &str, offset: Duration) -> Message {
    Message::event("AudioPlayer", name, message_id, None).with_payload(json!({
        "token": token,
        "offsetInMilliseconds": millis(offset),
    }))
}

pub fn playback_started(message_id: &str, token: &str, offset: Duration) -> Message {
    playback_lifecycle("PlaybackStarted", message_id, token, offset)
}

pub fn playback_finished(message_id: &str, token: &str, offset: Duration) -> Message {
    playback_lifecycle("PlaybackFinished", message_id, token, offset)
}

pub fn playback_nearly_finished(message_id: &str, token: &str, offset: Duration) -> Message {
    playback_lifecycle("PlaybackNearlyFinished", message_id, token, offset)
}

pub fn playback_paused(message_id: &str, token: &str, offset: Duration) -> Message {
    playback_lifecycle("PlaybackPaused", message_id, token, offset)
}

pub fn playback_resumed(message_id: &str, token: &str, offset: Duration) -> Message {
    playback_lifecycle("PlaybackResumed", message_id, token, offset)
}

pub fn playback_stopped(message_id: &str, token: &str, offset: Duration) -> Message {
    playback_lifecycle("PlaybackStopped", message_id, token, offset)
}

pub fn playback_stutter_started(message_id: &str, token: &str, offset: Duration) -> Message {
    playback_lifecycle("PlaybackStutterStarted", message_id, token, offset)
}

pub fn playback_stutter_finished(
    message_id: &str,
    token: &str,
    offset: Duration,
    stutter_duration: Duration,
) -> Message {
    Message::event("AudioPlayer", "PlaybackStutterFinished", message_id, None).with_payload(
        json!({
            "token": token,
            "offsetInMilliseconds": millis(offset),
            "stutterDurationInMilliseconds": millis(stutter_duration),
        }),
    )
}

pub fn playback_queue_cleared(message_id: &str) -> Message {
    Message::event("AudioPlayer", "PlaybackQueueCleared", message_id, None)
        .with_payload(json!({}))
}

/// PlaybackFailed 事件；`error_type` 为 AVS 的媒体错误类型常量
pub fn playback_failed(
    message_id: &str,
    token: &str,
    offset: Duration,
    activity: PlayerActivity,
    error_type: &str,
    error_message: &str,
) -> Message {
    Message::event("AudioPlayer", "PlaybackFailed", message_id, None).with_payload(json!({
        "token": token,
        "currentPlaybackState": {
            "token": token,
            "offsetInMilliseconds": millis(offset),
            "playerActivity": activity,
        },
        "error": {
            "type": error_type,
            "message": error_message,
        },
    }))
}

pub fn progress_report_delay_elapsed(message_id: &str, token: &str, offset: Duration) -> Message {
    playback_lifecycle("ProgressReportDelayElapsed", message_id, token, offset)
}

pub fn progress_report_interval_elapsed(
    message_id: &str,
    token: &str,
    offset: Duration,
) -> Message {
    playback_lifecycle("ProgressReportIntervalElapsed", message_id, token, offset)
}

/// StreamMetadataExtracted 事件；metadata 为任意 JSON 对象
pub fn stream_metadata_extracted(
    message_id: &str,
    token: &str,
    metadata: serde_json::Value,
) -> Message {
    Message::event("AudioPlayer", "StreamMetadataExtracted", message_id, None).with_payload(
        json!({
            "token": token,
            "metadata": metadata,
        }),
    )
}

// ============================================================================
// PlaybackController
// ============================================================================

fn playback_command(name: &str, message_id: &str) -> Message {
    Message::event("PlaybackController", name, message_id, None).with_payload(json!({}))
}

pub fn play_command_issued(message_id: &str) -> Message {
    playback_command("PlayCommandIssued", message_id)
}

pub fn pause_command_issued(message_id: &str) -> Message {
    playback_command("PauseCommandIssued", message_id)
}

pub fn next_command_issued(message_id: &str) -> Message {
    playback_command("NextCommandIssued", message_id)
}

pub fn previous_command_issued(message_id: &str) -> Message {
    playback_command("PreviousCommandIssued", message_id)
}

// ============================================================================
// Alerts
// ============================================================================

fn alert_lifecycle(name: &str, message_id: &str, token: &str) -> Message {
    Message::event("Alerts", name, message_id, None).with_payload(json!({ "token": token }))
}

pub fn set_alert_succeeded(message_id: &str, token: &str) -> Message {
    alert_lifecycle("SetAlertSucceeded", message_id, token)
}

pub fn set_alert_failed(message_id: &str, token: &str) -> Message {
    alert_lifecycle("SetAlertFailed", message_id, token)
}

pub fn delete_alert_succeeded(message_id: &str, token: &str) -> Message {
    alert_lifecycle("DeleteAlertSucceeded", message_id, token)
}

pub fn delete_alert_failed(message_id: &str, token: &str) -> Message {
    alert_lifecycle("DeleteAlertFailed", message_id, token)
}

pub fn alert_started(message_id: &str, token: &str) -> Message {
    alert_lifecycle("AlertStarted", message_id, token)
}

pub fn alert_stopped(message_id: &str, token: &str) -> Message {
    alert_lifecycle("AlertStopped", message_id, token)
}

pub fn alert_entered_foreground(message_id: &str, token: &str) -> Message {
    alert_lifecycle("AlertEnteredForeground", message_id, token)
}

pub fn alert_entered_background(message_id: &str, token: &str) -> Message {
    alert_lifecycle("AlertEnteredBackground", message_id, token)
}

// ============================================================================
// Speaker
// ============================================================================

/// VolumeChanged 事件
pub fn volume_changed(message_id: &str, volume: i64, muted: bool) -> Message {
    Message::event("Speaker", "VolumeChanged", message_id, None).with_payload(json!({
        "volume": volume,
        "muted": muted,
    }))
}

/// MuteChanged 事件
pub fn mute_changed(message_id: &str, volume: i64, muted: bool) -> Message {
    Message::event("Speaker", "MuteChanged", message_id, None).with_payload(json!({
        "volume": volume,
        "muted": muted,
    }))
}

// ============================================================================
// Settings
// ============================================================================

/// SettingsUpdated 事件；`settings` 为键值对列表
pub fn settings_updated(message_id: &str, settings: &[(&str, &str)]) -> Message {
    let entries: Vec<_> = settings
        .iter()
        .map(|(key, value)| json!({ "key": key, "value": value }))
        .collect();
    Message::event("Settings", "SettingsUpdated", message_id, None)
        .with_payload(json!({ "settings": entries }))
}

// ============================================================================
// System
// ============================================================================

/// SynchronizeState 事件，通常随全部上下文一起发送
pub fn synchronize_state(message_id: &str) -> Message {
    Message::event("System", "SynchronizeState", message_id, None).with_payload(json!({}))
}

/// UserInactivityReport 事件；时长在线上是秒
pub fn user_inactivity_report(message_id: &str, inactive_time: Duration) -> Message {
    Message::event("System", "UserInactivityReport", message_id, None).with_payload(json!({
        "inactiveTimeInSeconds": inactive_time.as_secs(),
    }))
}

/// ExceptionEncountered 事件：上报一条设备无法执行的指令
pub fn exception_encountered(
    message_id: &str,
    unparsed_directive: &str,
    error_type: &str,
    error_message: &str,
) -> Message {
    Message::event("System", "ExceptionEncountered", message_id, None).with_payload(json!({
        "unparsedDirective": unparsed_directive,
        "error": {
            "type": error_type,
            "message": error_message,
        },
    }))
}
