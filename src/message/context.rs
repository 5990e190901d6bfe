//! 出站上下文的工厂函数
//!
//! 上下文是随事件一起上报的设备状态快照，信封与事件相同但没有
//! `messageId` / `dialogRequestId` 头部。

use std::time::Duration;

use serde_json::json;

use super::payloads::{Alert, PlayerActivity};
use super::Message;

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Alerts.AlertsState 上下文：设备上全部与活跃中的闹钟
pub fn alerts_state(all_alerts: &[Alert], active_alerts: &[Alert]) -> Message {
    Message::context("Alerts", "AlertsState").with_payload(json!({
        "allAlerts": all_alerts,
        "activeAlerts": active_alerts,
    }))
}

/// AudioPlayer.PlaybackState 上下文
pub fn playback_state(token: &str, offset: Duration, activity: PlayerActivity) -> Message {
    Message::context("AudioPlayer", "PlaybackState").with_payload(json!({
        "token": token,
        "offsetInMilliseconds": millis(offset),
        "playerActivity": activity,
    }))
}

/// Speaker.VolumeState 上下文
pub fn volume_state(volume: i64, muted: bool) -> Message {
    Message::context("Speaker", "VolumeState").with_payload(json!({
        "volume": volume,
        "muted": muted,
    }))
}

/// SpeechSynthesizer.SpeechState 上下文
pub fn speech_state(token: &str, offset: Duration, activity: PlayerActivity) -> Message {
    Message::context("SpeechSynthesizer", "SpeechState").with_payload(json!({
        "token": token,
        "offsetInMilliseconds": millis(offset),
        "playerActivity": activity,
    }))
}
