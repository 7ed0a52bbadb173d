//! Tests for endpoint URI parsing

use super::*;

#[test]
fn test_parse_simple() {
    let uri = EndpointUri::parse("direct:start").unwrap();
    assert_eq!(uri.scheme(), "direct");
    assert_eq!(uri.path(), "start");
    assert!(uri.params().is_empty());
    assert_eq!(uri.normalized(), "direct:start");
}

#[test]
fn test_parse_double_slash_alias() {
    let a = EndpointUri::parse("seda://orders").unwrap();
    let b = EndpointUri::parse("seda:orders").unwrap();
    assert_eq!(a.normalized(), b.normalized());
    assert_eq!(a.raw(), "seda://orders");
}

#[test]
fn test_params_are_sorted_in_normalized_form() {
    let a = EndpointUri::parse("seda:q?size=5&blockWhenFull=true").unwrap();
    let b = EndpointUri::parse("seda:q?blockWhenFull=true&size=5").unwrap();
    assert_eq!(a.normalized(), "seda:q?blockWhenFull=true&size=5");
    assert_eq!(a.normalized(), b.normalized());
    assert_eq!(a.param("size"), Some("5"));
}

#[test]
fn test_percent_decoding() {
    let uri = EndpointUri::parse("log:audit?prefix=hello%20world&sep=%26").unwrap();
    assert_eq!(uri.param("prefix"), Some("hello world"));
    assert_eq!(uri.param("sep"), Some("&"));
    // Re-encoded so the key stays unambiguous
    assert_eq!(uri.normalized(), "log:audit?prefix=hello%20world&sep=%26");
}

#[test]
fn test_scheme_is_lowercased() {
    let uri = EndpointUri::parse("MOCK:Result").unwrap();
    assert_eq!(uri.scheme(), "mock");
    assert_eq!(uri.path(), "Result");
}

#[test]
fn test_flag_without_value() {
    let uri = EndpointUri::parse("log:x?showHeaders").unwrap();
    assert_eq!(uri.param("showHeaders"), Some(""));
}

#[test]
fn test_empty_segments_are_skipped() {
    let uri = EndpointUri::parse("seda:q?&size=1&&").unwrap();
    assert_eq!(uri.params().len(), 1);
}

#[test]
fn test_invalid_uris() {
    for bad in ["", "   ", "noscheme", ":path", "1abc:x", "direct:", "direct:?a=1", "seda:q?=1"] {
        let result = EndpointUri::parse(bad);
        assert!(
            matches!(result, Err(EndpointError::InvalidUri { .. })),
            "expected '{bad}' to be rejected"
        );
    }
}

#[test]
fn test_duplicate_parameter_rejected() {
    let err = EndpointUri::parse("seda:q?size=1&size=2").unwrap_err();
    assert!(err.to_string().contains("duplicate parameter 'size'"));
}

#[test]
fn test_from_str() {
    let uri: EndpointUri = "mock:out".parse().unwrap();
    assert_eq!(uri.to_string(), "mock:out");
}
