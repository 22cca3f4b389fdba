//! Streamed output units and the framed events they map onto.

use serde::{Deserialize, Serialize};

/// Tag of a relay [`Fragment`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FragmentKind {
    /// Model text delta
    Content,
    /// Progress note such as a key rotation or model fallback
    System,
    /// Failure description; terminal when it is the last fragment
    Error,
}

/// One unit of streamed relay output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub text: String,
}

impl Fragment {
    pub fn content(text: impl Into<String>) -> Self {
        Self { kind: FragmentKind::Content, text: text.into() }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self { kind: FragmentKind::System, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { kind: FragmentKind::Error, text: text.into() }
    }

    pub fn is_content(&self) -> bool {
        self.kind == FragmentKind::Content
    }
}

/// Output of the transcription pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum PipelineEvent {
    Status(String),
    /// Whole transcript of the input or of one segment
    Transcription(String),
    /// Summary text delta
    Analysis(String),
    System(String),
    Error(String),
}

impl PipelineEvent {
    /// Re-tag a relay fragment produced during the analysis phase.
    pub fn from_analysis(fragment: Fragment) -> Self {
        match fragment.kind {
            FragmentKind::Content => Self::Analysis(fragment.text),
            FragmentKind::System => Self::System(fragment.text),
            FragmentKind::Error => Self::Error(fragment.text),
        }
    }
}

/// Event type on the caller-facing wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Content,
    Transcription,
    Analysis,
    Status,
    System,
    Error,
    Done,
    Heartbeat,
}

/// Framed event written to the caller: `{"type": .., "content": ..}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoundaryEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub content: String,
}

impl BoundaryEvent {
    pub fn new(event_type: EventType, content: impl Into<String>) -> Self {
        Self { event_type, content: content.into() }
    }

    pub fn heartbeat() -> Self {
        Self::new(EventType::Heartbeat, "keep-alive")
    }

    pub fn done() -> Self {
        Self::new(EventType::Done, "")
    }
}

impl From<Fragment> for BoundaryEvent {
    fn from(fragment: Fragment) -> Self {
        let event_type = match fragment.kind {
            FragmentKind::Content => EventType::Content,
            FragmentKind::System => EventType::System,
            FragmentKind::Error => EventType::Error,
        };
        Self::new(event_type, fragment.text)
    }
}

impl From<PipelineEvent> for BoundaryEvent {
    fn from(event: PipelineEvent) -> Self {
        match event {
            PipelineEvent::Status(text) => Self::new(EventType::Status, text),
            PipelineEvent::Transcription(text) => Self::new(EventType::Transcription, text),
            PipelineEvent::Analysis(text) => Self::new(EventType::Analysis, text),
            PipelineEvent::System(text) => Self::new(EventType::System, text),
            PipelineEvent::Error(text) => Self::new(EventType::Error, text),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_event_wire_shape() {
        let event = BoundaryEvent::from(Fragment::content("Hi"));
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"content","content":"Hi"}"#);

        let json = serde_json::to_string(&BoundaryEvent::heartbeat()).unwrap();
        assert_eq!(json, r#"{"type":"heartbeat","content":"keep-alive"}"#);
    }

    #[test]
    fn test_analysis_retagging() {
        assert_eq!(
            PipelineEvent::from_analysis(Fragment::content("delta")),
            PipelineEvent::Analysis("delta".to_string())
        );
        assert_eq!(
            PipelineEvent::from_analysis(Fragment::error("boom")),
            PipelineEvent::Error("boom".to_string())
        );
        let event: BoundaryEvent = PipelineEvent::Transcription("text".into()).into();
        assert_eq!(event.event_type, EventType::Transcription);
    }
}
