//! Native messaging protocol tests
//!
//! Drive the full transport loop with framed byte streams.

use autosave_e2e_tests::harness::TestHost;
use autosave_e2e_tests::mocks::TestRequestFactory as Req;
use autosave_host::protocol::framing::FrameCodec;
use serde_json::json;

#[test]
fn test_closed_input_produces_no_output() {
    let mut host = TestHost::new_temp();
    let replies = host.run_raw(Vec::new());
    assert!(replies.is_empty());
    assert_eq!(host.server.requests_handled(), 0);
}

#[test]
fn test_each_request_gets_exactly_one_response_in_order() {
    let mut host = TestHost::new_temp();
    let replies = host.session(&[
        Req::ping(),
        Req::save_image("https://cdn.example.com/1.png"),
        Req::stats(),
        Req::cleanup_info(),
    ]);

    assert_eq!(replies.len(), 4);
    assert_eq!(replies[0]["message"], "pong");
    assert_eq!(replies[1]["success"], true);
    assert_eq!(replies[2]["data"]["total_images"], 1);
    assert_eq!(replies[3]["data"]["cleanup_mode"], "backup");
}

#[test]
fn test_unknown_and_missing_actions_are_rejected() {
    let mut host = TestHost::new_temp();
    let replies = host.session(&[
        Req::action("format_disk"),
        json!({"data": {"url": "x"}}),
        json!([1, 2, 3]),
    ]);

    assert_eq!(replies.len(), 3);
    for reply in &replies {
        assert_eq!(reply["success"], false);
    }
    assert_eq!(replies[0]["message"], "Unknown action");
    assert_eq!(replies[1]["message"], "Unknown action");
    assert!(host.on_disk(autosave_core::RecordKind::Image).is_empty());
}

#[test]
fn test_garbage_body_does_not_end_the_session() {
    let mut host = TestHost::new_temp();
    let mut input = Req::raw_frame(b"not json at all");
    input.extend(Req::raw_frame(&[0xff, 0xfe, 0x00]));
    input.extend(host.encode(&[Req::ping()]));

    let replies = host.run_raw(input);
    assert_eq!(replies.len(), 3);
    assert_eq!(replies[0]["success"], false);
    assert_eq!(replies[0]["message"], "Malformed message");
    assert_eq!(replies[1]["success"], false);
    assert_eq!(replies[2]["message"], "pong");
}

#[test]
fn test_oversized_frame_is_drained_and_stream_stays_aligned() {
    let mut host = TestHost::new_temp().with_codec(FrameCodec::new(64, 1024 * 1024));
    let big = json!({"action": "save_prompt", "data": {"content": "x".repeat(500)}});
    let input = host.encode(&[big, Req::ping()]);

    let replies = host.run_raw(input);
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["success"], false);
    assert!(replies[0]["error"].as_str().unwrap().contains("exceeds"));
    assert_eq!(replies[1]["message"], "pong");
    assert!(host.on_disk(autosave_core::RecordKind::Prompt).is_empty());
}

#[test]
fn test_truncated_trailing_frame_is_answered_then_session_ends() {
    let mut host = TestHost::new_temp();
    let mut input = host.encode(&[Req::ping()]);
    input.extend_from_slice(&100u32.to_le_bytes());
    input.extend_from_slice(b"{\"action\"");

    let replies = host.run_raw(input);
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["message"], "pong");
    assert_eq!(replies[1]["success"], false);
    assert!(replies[1]["error"].as_str().unwrap().contains("Truncated"));
}

#[test]
fn test_responses_are_compact_little_endian_frames() {
    let mut host = TestHost::new_temp();
    let mut output = Vec::new();
    let input = host.encode(&[Req::ping()]);
    autosave_host::StdioTransport::default()
        .serve(&mut host.server, std::io::Cursor::new(input), &mut output)
        .unwrap();

    let len = u32::from_le_bytes([output[0], output[1], output[2], output[3]]) as usize;
    assert_eq!(len, output.len() - 4);
    let body: serde_json::Value = serde_json::from_slice(&output[4..]).unwrap();
    assert_eq!(body["success"], true);
}
