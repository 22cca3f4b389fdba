use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gemini-relay",
    about = "Resilient Gemini streaming relay",
    version = env!("CARGO_PKG_VERSION"),
    author,
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, help = "Path to relay_config.json")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, global = true, env = "GEMINI_RELAY_LOG_DIR", help = "Also write daily log files here")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Stream a chat completion as SSE frames")]
    Chat {
        #[arg(short, long, help = "User prompt")]
        prompt: String,

        #[arg(short, long, help = "Model id; the configured default when omitted")]
        model: Option<String>,

        #[arg(long, help = "JSON file with prior turns: [{\"role\":\"user\",\"content\":\"..\"}]")]
        history: Option<PathBuf>,

        #[arg(long = "image", help = "Image to attach inline (repeatable)")]
        images: Vec<PathBuf>,

        #[arg(long = "document", help = "Document to upload and attach (repeatable)")]
        documents: Vec<PathBuf>,

        #[arg(long, default_value = "application/pdf", help = "MIME type for --document")]
        document_mime: String,
    },

    #[command(about = "Transcribe a meeting recording and stream its minutes")]
    Minutes {
        #[arg(help = "Audio file")]
        file: PathBuf,
    },

    #[command(about = "Upload a document and print its file URI")]
    Upload {
        #[arg(help = "File to upload")]
        file: PathBuf,

        #[arg(long, default_value = "application/pdf")]
        mime: String,
    },

    #[command(about = "Sync the model catalog with the upstream listing and save it")]
    RefreshModels,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_with_attachments() {
        let cli = Cli::parse_from([
            "gemini-relay",
            "--config",
            "/tmp/relay.json",
            "chat",
            "--prompt",
            "hello",
            "--image",
            "a.png",
            "--image",
            "b.jpg",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/relay.json")));
        match cli.command {
            Commands::Chat { prompt, model, images, documents, .. } => {
                assert_eq!(prompt, "hello");
                assert!(model.is_none());
                assert_eq!(images.len(), 2);
                assert!(documents.is_empty());
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_minutes() {
        let cli = Cli::parse_from(["gemini-relay", "minutes", "standup.m4a"]);
        assert!(matches!(cli.command, Commands::Minutes { file } if file == PathBuf::from("standup.m4a")));
    }
}
