use lh_core::errors::{ErrorInfo, LhError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("row", "3")
        .with_context("source", "A1")
}

#[test]
fn parse_error_surface() {
    let err = LhError::Parse(sample_info("P001", "missing column"));
    assert_eq!(err.info().code, "P001");
    assert_eq!(err.family(), "parse");
    assert!(err.info().context.contains_key("row"));
}

#[test]
fn configuration_error_surface() {
    let err = LhError::Configuration(sample_info("C001", "volume exceeds capacity"));
    assert_eq!(err.info().code, "C001");
    assert_eq!(err.family(), "configuration");
}

#[test]
fn runtime_error_surface() {
    let err = LhError::Runtime(sample_info("R001", "tip pickup failed"));
    assert_eq!(err.info().code, "R001");
    assert!(err.info().context.contains_key("source"));
}

#[test]
fn io_error_surface() {
    let err = LhError::io("IO01", "unreadable");
    assert_eq!(err.family(), "io");
}

#[test]
fn context_is_added_without_changing_family() {
    let err = LhError::runtime("R002", "mechanical fault")
        .with_context("row", "7")
        .with_context("destination", "H12")
        .with_hint("check the gantry");
    assert!(matches!(err, LhError::Runtime(_)));
    assert_eq!(err.info().context.get("row").map(String::as_str), Some("7"));
    assert_eq!(err.info().hint.as_deref(), Some("check the gantry"));
}

#[test]
fn display_includes_context_and_hint() {
    let err = LhError::Configuration(
        ErrorInfo::new("C002", "too large")
            .with_context("volume", "250")
            .with_hint("use the larger pipette"),
    );
    let rendered = err.to_string();
    assert!(rendered.starts_with("configuration error: too large (code: C002)"));
    assert!(rendered.contains("volume=250"));
    assert!(rendered.contains("hint: use the larger pipette"));
}
