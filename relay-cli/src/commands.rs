//! Command handlers. Each writes boundary events as SSE frames to stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use futures::{Stream, StreamExt};
use gemini_relay_core::modules::config::save_config;
use gemini_relay_core::relay::model_catalog::refresh::{ModelListRefresher, RefreshOutcome};
use gemini_relay_core::relay::upstream::DocumentUpload;
use gemini_relay_core::transcription::AudioInput;
use gemini_relay_core::{boundary, ChunkedTranscriptionPipeline, ResilientStreamController, ServiceState};
use gemini_relay_types::{BoundaryEvent, ChatMessage, DocumentData, ImageData, RelayConfig, StreamRequest};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct ChatArgs {
    pub prompt: String,
    pub model: Option<String>,
    pub history: Option<PathBuf>,
    pub images: Vec<PathBuf>,
    pub documents: Vec<PathBuf>,
    pub document_mime: String,
}

pub async fn chat(state: Arc<ServiceState>, args: ChatArgs, cancel: CancellationToken) -> Result<()> {
    let mut request = StreamRequest::new(args.prompt);
    request.model = args.model;

    if let Some(path) = &args.history {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read history {}", path.display()))?;
        request.history = serde_json::from_str::<Vec<ChatMessage>>(&content)
            .with_context(|| format!("Invalid history JSON in {}", path.display()))?;
    }

    for path in &args.images {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        request.images.push(ImageData {
            mime_type: image_mime(path).to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(data),
        });
    }

    for path in &args.documents {
        let file_uri = upload_file(&state, path, &args.document_mime).await?;
        request.documents.push(DocumentData { mime_type: args.document_mime.clone(), file_uri });
    }

    let controller = ResilientStreamController::new(state);
    write_frames(boundary::framed(controller.stream_with_cancel(request, cancel))).await
}

pub async fn minutes(
    state: Arc<ServiceState>,
    config: &RelayConfig,
    file: &Path,
    cancel: CancellationToken,
) -> Result<()> {
    let input = AudioInput::open(file)
        .await
        .with_context(|| format!("Failed to open audio {}", file.display()))?;
    let identity = input.file_name().to_string();
    info!(file = %file.display(), size = input.size(), "Starting meeting minutes");

    let pipeline = ChunkedTranscriptionPipeline::from_state(state, &config.transcription);
    let events = pipeline.process_with_cancel(input, identity, cancel);
    write_frames(boundary::with_heartbeat(events, Duration::from_secs(config.heartbeat_secs))).await
}

pub async fn upload(state: Arc<ServiceState>, file: &Path, mime: &str) -> Result<()> {
    let uri = upload_file(&state, file, mime).await?;
    let mut stdout = tokio::io::stdout();
    stdout.write_all(format!("{uri}\n").as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

pub async fn refresh_models(state: Arc<ServiceState>, mut config: RelayConfig, config_path: &Path) -> Result<()> {
    let refresher = ModelListRefresher::new(state.http().clone());
    match refresher.refresh(&config.gemini).await {
        RefreshOutcome::Updated { models, added } => {
            config.gemini.models = models;
            save_config(config_path, &config)?;
            info!(added = added.len(), path = %config_path.display(), "Saved refreshed model catalog");
            let mut stdout = tokio::io::stdout();
            for id in added {
                stdout.write_all(format!("{id}\n").as_bytes()).await?;
            }
            stdout.flush().await?;
        },
        RefreshOutcome::Skipped(reason) => {
            info!(%reason, "Model catalog left unchanged");
        },
    }
    Ok(())
}

async fn upload_file(state: &ServiceState, path: &Path, mime: &str) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read document {}", path.display()))?;
    let file_name = path
        .file_name()
        .map_or_else(|| "document".to_string(), |n| n.to_string_lossy().into_owned());
    let document = DocumentUpload {
        bytes: bytes::Bytes::from(bytes),
        display_name: Some(file_name.clone()),
        file_name,
        mime_type: mime.to_string(),
    };
    let uri = state.uploader().upload(state.key_pool(), &document).await?;
    info!(uri = %uri, "Document uploaded");
    Ok(uri)
}

async fn write_frames<S>(events: S) -> Result<()>
where
    S: Stream<Item = BoundaryEvent>,
{
    let mut events = std::pin::pin!(events);
    let mut stdout = tokio::io::stdout();
    while let Some(event) = events.next().await {
        let frame = boundary::to_sse_frame(&event)?;
        stdout.write_all(frame.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

fn image_mime(path: &Path) -> &'static str {
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        _ => "image/jpeg",
    }
}
