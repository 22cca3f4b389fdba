use super::*;

fn catalog(entries: &[(&str, &str)]) -> ModelCatalog {
    let models = entries
        .iter()
        .map(|(id, fallback)| ((*id).to_string(), ModelConfig::with_fallback(*fallback)))
        .collect();
    ModelCatalog::new(models, "gemini-1.5-flash-latest")
}

#[test]
fn test_exact_name_resolves_to_itself() {
    let catalog = catalog(&[("gemini-1.5-flash-latest", ""), ("gemini-1.5-pro", "")]);
    assert_eq!(catalog.resolve(Some("gemini-1.5-pro")).unwrap(), "gemini-1.5-pro");
}

#[test]
fn test_empty_and_unknown_use_default() {
    let catalog = catalog(&[("gemini-1.5-flash-latest", "")]);
    assert_eq!(catalog.resolve(None).unwrap(), "gemini-1.5-flash-latest");
    assert_eq!(catalog.resolve(Some("")).unwrap(), "gemini-1.5-flash-latest");
    assert_eq!(catalog.resolve(Some("gpt-4")).unwrap(), "gemini-1.5-flash-latest");
}

#[test]
fn test_missing_default_fails_resolution() {
    let catalog = catalog(&[("gemini-1.5-pro", "")]);
    let err = catalog.resolve(Some("unknown")).unwrap_err();
    assert_eq!(err, RelayError::Resolution { requested: "unknown".into() });
    assert!(catalog.resolve(None).is_err());
}

#[test]
fn test_reverse_alias_requires_configured_target() {
    // "gemini-exp" is only named as a fallback, never configured itself,
    // so the reverse alias does not apply and the default wins.
    let catalog = catalog(&[("gemini-1.5-flash-latest", ""), ("gemini-1.5-pro", "gemini-exp")]);
    assert_eq!(catalog.resolve(Some("gemini-exp")).unwrap(), "gemini-1.5-flash-latest");
}

#[test]
fn test_fallback_of() {
    let catalog = catalog(&[("a", "b"), ("b", "b"), ("c", ""), ("d", "  ")]);
    assert_eq!(catalog.fallback_of("a").as_deref(), Some("b"));
    assert_eq!(catalog.fallback_of("b"), None);
    assert_eq!(catalog.fallback_of("c"), None);
    assert_eq!(catalog.fallback_of("d"), None);
    assert_eq!(catalog.fallback_of("missing"), None);
}
