//! Google Gemini `streamGenerateContent`, file upload and model listing types.

use serde::{Deserialize, Serialize};

/// Request body: `{"contents": [...]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerateContentRequest {
    pub contents: Vec<GeminiContent>,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeminiContent {
    pub role: String,
    pub parts: Vec<GeminiPart>,
}

/// Gemini content part.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    FileData {
        #[serde(rename = "fileData")]
        file_data: GeminiFileData,
    },
}

impl GeminiPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiFileData {
    pub mime_type: String,
    pub file_uri: String,
}

/// One SSE payload of a streamed response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl StreamChunk {
    /// Non-empty text parts of the first candidate, in order.
    pub fn text_parts(&self) -> impl Iterator<Item = &str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsePart {
    #[serde(default)]
    pub text: Option<String>,
}

/// Metadata sent when starting a resumable upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadStartRequest {
    pub file: UploadFileMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFileMetadata {
    pub display_name: String,
}

/// Response of the finalize step: `{"file": {"uri": ..}}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub file: Option<UploadedFile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadedFile {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// OpenAI-compatible model listing: `{"data": [{"id": ..}]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelListResponse {
    #[serde(default)]
    pub data: Vec<ModelListEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelListEntry {
    pub id: String,
}
