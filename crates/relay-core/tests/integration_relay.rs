#![allow(unused_crate_dependencies)]
#![allow(clippy::tests_outside_test_module, reason = "integration tests live in tests/ dir")]
#![allow(clippy::expect_used, reason = "panics are the assertion mechanism in integration tests")]

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use gemini_relay_core::boundary;
use gemini_relay_core::transcription::{
    AudioInput, AudioPayload, ChunkedTranscriptionPipeline, FfmpegSegmenter, PipelineSettings, Transcriber,
};
use gemini_relay_core::{ResilientStreamController, ServiceState};
use gemini_relay_types::{
    BoundaryEvent, EventType, Fragment, GeminiConfig, ModelConfig, RelayConfig, RelayError, StreamRequest,
    TranscriptionConfig,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FLASH: &str = "gemini-1.5-flash-latest";

fn relay_config(server: &MockServer, keys: &[&str]) -> RelayConfig {
    let mut config = RelayConfig {
        gemini: GeminiConfig {
            api_keys: keys.iter().map(|k| (*k).to_string()).collect(),
            base_url: format!("{}/v1beta", server.uri()),
            transient_backoff_ms: vec![1, 1, 1],
            ..GeminiConfig::default()
        },
        ..RelayConfig::default()
    };
    config.gemini.models.insert(FLASH.to_string(), ModelConfig::default());
    config
}

fn state(config: &RelayConfig) -> Arc<ServiceState> {
    Arc::new(ServiceState::from_config(config).expect("valid config"))
}

fn sse_ok(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body.to_string())
}

#[tokio::test]
async fn test_hello_yields_single_content_fragment() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/v1beta/models/{FLASH}:streamGenerateContent")))
        .and(header("x-goog-api-key", "only-key"))
        .respond_with(sse_ok(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi\"}]}}]}\n\ndata: [DONE]\n\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let controller = ResilientStreamController::new(state(&relay_config(&server, &["only-key"])));
    let fragments: Vec<Fragment> = controller.stream(StreamRequest::new("hello")).collect().await;

    assert_eq!(fragments, vec![Fragment::content("Hi")]);
}

#[tokio::test]
async fn test_rotation_is_visible_at_the_boundary() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("x-goog-api-key", "key-a"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(header("x-goog-api-key", "key-b"))
        .respond_with(sse_ok("data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"ok\"}]}}]}\n\n"))
        .mount(&server)
        .await;

    let controller = ResilientStreamController::new(state(&relay_config(&server, &["key-a", "key-b"])));
    let events: Vec<BoundaryEvent> =
        boundary::framed(controller.stream(StreamRequest::new("hello"))).collect().await;

    let types: Vec<EventType> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec![EventType::System, EventType::Content, EventType::Done]);
    assert_eq!(events[1].content, "ok");

    let frame = boundary::to_sse_frame(&events[1]).expect("serializable");
    assert_eq!(frame, "data: {\"type\":\"content\",\"content\":\"ok\"}\n\n");
}

#[tokio::test]
async fn test_every_key_rate_limited_ends_in_one_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(429)).mount(&server).await;

    let controller = ResilientStreamController::new(state(&relay_config(&server, &["k1", "k2", "k3"])));
    let fragments: Vec<Fragment> = controller.stream(StreamRequest::new("hello")).collect().await;

    let errors: Vec<&Fragment> = fragments.iter().filter(|f| f.kind == gemini_relay_types::FragmentKind::Error).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].text.contains("rate limit"));
    assert!(!fragments.iter().any(Fragment::is_content));
}

struct Echo;

#[async_trait::async_trait]
impl Transcriber for Echo {
    async fn transcribe(&self, payload: AudioPayload) -> Result<String, RelayError> {
        Ok(format!("transcript of {}", payload.file_name))
    }
}

#[tokio::test]
async fn test_meeting_minutes_end_to_end_with_heartbeat() {
    let server = MockServer::start().await;
    let summary_model = TranscriptionConfig::default().summary_model;
    Mock::given(method("POST"))
        .and(path(format!("/v1beta/models/{summary_model}:streamGenerateContent")))
        .respond_with(sse_ok("data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Summary\"}]}}]}\n\n"))
        .mount(&server)
        .await;

    let mut config = relay_config(&server, &["k1"]);
    config.gemini.models.insert(summary_model.clone(), ModelConfig::default());
    let state = state(&config);

    let temp = tempfile::tempdir().expect("tempdir");
    let settings = PipelineSettings {
        temp_root: temp.path().to_path_buf(),
        ..PipelineSettings::from_config(&config.transcription)
    };
    let pipeline = ChunkedTranscriptionPipeline::new(
        Arc::new(ResilientStreamController::new(Arc::clone(&state))),
        Arc::new(Echo),
        Arc::new(FfmpegSegmenter::from_config(&config.transcription)),
        settings,
    );

    let events = pipeline.process(AudioInput::from_bytes(b"small clip".to_vec(), "clip.wav"), "clip.wav");
    let framed: Vec<BoundaryEvent> = boundary::with_heartbeat(events, Duration::from_secs(30)).collect().await;

    assert_eq!(framed.last().map(|e| e.event_type), Some(EventType::Done));

    let meaningful: Vec<(EventType, &str)> = framed
        .iter()
        .filter(|e| e.event_type != EventType::Heartbeat && e.event_type != EventType::Done)
        .map(|e| (e.event_type, e.content.as_str()))
        .collect();
    assert_eq!(
        meaningful,
        vec![
            (EventType::Status, "Processing audio file..."),
            (EventType::Transcription, "transcript of clip.wav"),
            (EventType::Status, "Running analysis..."),
            (EventType::Analysis, "Summary"),
        ]
    );
    assert!(!state.processing_locks().is_held("clip.wav"));
}
