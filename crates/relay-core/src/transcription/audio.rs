use std::path::Path;

pub struct AudioProcessor;

/// Encoder output format for segments.
pub const SEGMENT_MIME: &str = "audio/opus";

const FALLBACK_MIME: &str = "application/octet-stream";

impl AudioProcessor {
    /// Detect MIME type from file magic bytes (signature)
    #[allow(clippy::missing_asserts_for_indexing, reason = "Length checked at function start")]
    pub fn detect_mime_type_from_bytes(data: &[u8]) -> Option<&'static str> {
        if data.len() < 12 {
            return None;
        }

        // MP3: ID3 tag or frame sync
        if data.starts_with(b"ID3") || (data[0] == 0xFF && (data[1] & 0xE0) == 0xE0) {
            return Some("audio/mpeg");
        }

        // WAV: RIFF....WAVE
        if data.starts_with(b"RIFF") && &data[8..12] == b"WAVE" {
            return Some("audio/wav");
        }

        if data.starts_with(b"fLaC") {
            return Some("audio/flac");
        }

        // OGG container; opus streams are OGG too
        if data.starts_with(b"OggS") {
            return Some("audio/ogg");
        }

        // AIFF: FORM....AIFF
        if data.starts_with(b"FORM") && &data[8..12] == b"AIFF" {
            return Some("audio/aiff");
        }

        // M4A: ISO base media
        if &data[4..8] == b"ftyp" {
            return Some("audio/mp4");
        }

        None
    }

    /// Detect MIME type from filename extension (fallback)
    pub fn detect_mime_type_from_extension(filename: &str) -> Option<&'static str> {
        let ext = Path::new(filename).extension().and_then(|s| s.to_str())?;

        match ext.to_lowercase().as_str() {
            "mp3" => Some("audio/mpeg"),
            "wav" => Some("audio/wav"),
            "m4a" | "mp4" => Some("audio/mp4"),
            "ogg" => Some("audio/ogg"),
            "opus" => Some(SEGMENT_MIME),
            "flac" => Some("audio/flac"),
            "aiff" | "aif" => Some("audio/aiff"),
            "webm" => Some("audio/webm"),
            _ => None,
        }
    }

    /// Magic bytes first, then extension, then `application/octet-stream`.
    pub fn detect_mime_type(filename: &str, data: &[u8]) -> &'static str {
        Self::detect_mime_type_from_bytes(data)
            .or_else(|| Self::detect_mime_type_from_extension(filename))
            .unwrap_or(FALLBACK_MIME)
    }

    /// Inputs above the threshold go through segmentation.
    pub fn needs_segmentation(size_bytes: u64, threshold: u64) -> bool {
        size_bytes > threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_mime_type_from_extension() {
        assert_eq!(AudioProcessor::detect_mime_type_from_extension("a.MP3"), Some("audio/mpeg"));
        assert_eq!(AudioProcessor::detect_mime_type_from_extension("output_000.opus"), Some("audio/opus"));
        assert_eq!(AudioProcessor::detect_mime_type_from_extension("notes.txt"), None);
        assert_eq!(AudioProcessor::detect_mime_type_from_extension("noext"), None);
    }

    #[test]
    fn test_detect_mime_type_from_bytes() {
        assert_eq!(
            AudioProcessor::detect_mime_type_from_bytes(b"ID3\x04\x00\x00\x00\x00\x00\x00\x00\x00"),
            Some("audio/mpeg")
        );
        assert_eq!(
            AudioProcessor::detect_mime_type_from_bytes(b"RIFF\x00\x00\x00\x00WAVEfmt "),
            Some("audio/wav")
        );
        assert_eq!(
            AudioProcessor::detect_mime_type_from_bytes(b"\x00\x00\x00\x20ftypM4A \x00\x00"),
            Some("audio/mp4")
        );
        assert_eq!(AudioProcessor::detect_mime_type_from_bytes(b"short"), None);
    }

    #[test]
    fn test_detect_mime_type_combined() {
        // Magic bytes win over the extension
        assert_eq!(
            AudioProcessor::detect_mime_type("fake.mp3", b"fLaC\x00\x00\x00\x00\x00\x00\x00\x00"),
            "audio/flac"
        );
        assert_eq!(AudioProcessor::detect_mime_type("meeting.m4a", b"UNKNOWN_FORMAT__"), "audio/mp4");
        assert_eq!(
            AudioProcessor::detect_mime_type("blob.bin", b"UNKNOWN_FORMAT__"),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_needs_segmentation() {
        let threshold = 25 * 1024 * 1024;
        assert!(!AudioProcessor::needs_segmentation(threshold, threshold));
        assert!(AudioProcessor::needs_segmentation(threshold + 1, threshold));
    }
}
