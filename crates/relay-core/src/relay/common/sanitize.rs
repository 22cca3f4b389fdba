//! Keep secrets and oversized upstream bodies out of logs and fragments.

const VISIBLE_PREFIX: usize = 7;
const MAX_BODY_CHARS: usize = 300;

/// Show only the first few characters of a key: `AIzaSyB…`.
pub fn mask_secret(secret: &str) -> String {
    let prefix: String = secret.chars().take(VISIBLE_PREFIX).collect();
    if secret.chars().count() <= VISIBLE_PREFIX {
        return "***".to_string();
    }
    format!("{}…", prefix)
}

/// Clip an upstream error body for logging.
pub fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_CHARS {
        return trimmed.to_string();
    }
    let clipped: String = trimmed.chars().take(MAX_BODY_CHARS).collect();
    format!("{}… ({} bytes)", clipped, trimmed.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("AIzaSyB1234567890"), "AIzaSyB…");
        assert_eq!(mask_secret("short"), "***");
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("  {\"error\":1}  "), "{\"error\":1}");
        let long = "x".repeat(1000);
        let clipped = truncate_body(&long);
        assert!(clipped.ends_with("(1000 bytes)"));
        assert!(clipped.len() < 400);
    }
}
