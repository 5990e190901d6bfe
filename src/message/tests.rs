//! 信封与分类的属性测试

use std::collections::BTreeMap;

use proptest::prelude::*;
use serde_json::{json, Value};

use super::payloads::SpeechProfile;
use super::{context, event, Message, TypedMessage};

fn arb_header() -> impl Strategy<Value = BTreeMap<String, String>> {
    proptest::collection::btree_map("[a-zA-Z][a-zA-Z0-9]{0,10}", "[ -~]{0,16}", 0..5)
}

fn arb_payload() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,16}".prop_map(Value::from),
        proptest::collection::btree_map("[a-z]{1,8}", "[ -~]{0,12}", 0..4)
            .prop_map(|m| json!(m)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// 编码后再解码得到同一个信封（头部集合和负载都保留）
    #[test]
    fn test_envelope_round_trip(header in arb_header(), payload in arb_payload()) {
        let message = Message { header, payload };
        let encoded = serde_json::to_string(&message).unwrap();
        let decoded: Message = serde_json::from_str(&encoded).unwrap();
        prop_assert_eq!(decoded, message);
    }

    /// 提升是幂等的：typed(typed(M)) ≡ typed(M)
    #[test]
    fn test_classification_idempotent(header in arb_header(), payload in arb_payload()) {
        let message = Message { header, payload };
        let once = message.clone().typed();
        let twice = message.typed().typed();
        prop_assert_eq!(once, twice);
    }
}

#[test]
fn test_known_names_classify() {
    let speak = Message::event("SpeechSynthesizer", "Speak", "m1", None).with_payload(json!({
        "format": "AUDIO_MPEG",
        "url": "cid:AUDIO",
        "token": "t",
    }));
    match speak.typed() {
        TypedMessage::Speak(directive) => {
            assert_eq!(directive.payload.content_id(), Some("AUDIO"));
            // 信封原样保留
            assert_eq!(directive.message.message_id(), Some("m1"));
        }
        other => panic!("应分类为 Speak，实际为 {other:?}"),
    }
}

#[test]
fn test_unknown_name_stays_raw() {
    let message = Message::event("Nonexistent", "Directive", "m1", None);
    let typed = message.clone().typed();
    assert_eq!(typed, TypedMessage::Raw(message));
}

#[test]
fn test_payload_decode_failure_stays_raw() {
    // Play 的负载要求对象，给一个数字必然解码失败
    let message =
        Message::event("AudioPlayer", "Play", "m1", None).with_payload(json!(42));
    let typed = message.clone().typed();
    assert_eq!(typed, TypedMessage::Raw(message));
}

#[test]
fn test_missing_payload_decodes_as_empty() {
    // 负载缺省的 Exception 仍然能提升，字段取零值
    let message = Message::event("System", "Exception", "m1", None);
    match message.typed() {
        TypedMessage::Exception(directive) => {
            assert_eq!(directive.payload.code, "");
            assert_eq!(directive.payload.description, "");
        }
        other => panic!("应分类为 Exception，实际为 {other:?}"),
    }
}

#[test]
fn test_classification_preserves_unrecognized_headers() {
    let mut message = Message::event("Speaker", "SetVolume", "m1", None)
        .with_payload(json!({ "volume": 40 }));
    message
        .header
        .insert("x-custom".to_string(), "kept".to_string());
    match message.typed() {
        TypedMessage::SetVolume(directive) => {
            assert_eq!(directive.payload.volume, 40);
            assert_eq!(directive.message.header.get("x-custom").unwrap(), "kept");
        }
        other => panic!("应分类为 SetVolume，实际为 {other:?}"),
    }
}

#[test]
fn test_recognize_event_shape() {
    let message = event::recognize("m", "d");
    assert_eq!(message.message_id(), Some("m"));
    assert_eq!(message.dialog_request_id(), Some("d"));
    assert_eq!(message.canonical_name(), "SpeechRecognizer.Recognize");
    assert_eq!(message.payload["profile"], "CLOSE_TALK");
    assert_eq!(message.payload["format"], "AUDIO_L16_RATE_16000_CHANNELS_1");

    let far = event::recognize_with_profile("m", "d", SpeechProfile::FarField);
    assert_eq!(far.payload["profile"], "FAR_FIELD");
}

#[test]
fn test_plain_events_omit_dialog_request_id() {
    let message = event::playback_started("m2", "tok", std::time::Duration::from_millis(1250));
    assert_eq!(message.message_id(), Some("m2"));
    assert_eq!(message.dialog_request_id(), None);
    assert_eq!(message.payload["offsetInMilliseconds"], 1250);
}

#[test]
fn test_contexts_have_no_message_id() {
    let message = context::volume_state(25, false);
    assert_eq!(message.canonical_name(), "Speaker.VolumeState");
    assert_eq!(message.message_id(), None);
    assert_eq!(message.payload["volume"], 25);
    assert_eq!(message.payload["muted"], false);
}

#[test]
fn test_new_message_id_is_unique() {
    let a = super::new_message_id();
    let b = super::new_message_id();
    assert_ne!(a, b);
    assert_eq!(a.len(), 36);
}
