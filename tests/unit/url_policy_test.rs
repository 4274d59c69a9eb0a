//! Unit tests for bookmark input validation and url normalization.

use rstest::rstest;

use smartmarks::services::url_policy::{normalize_url, validate_bookmark, validate_title, validate_url};
use smartmarks::types::errors::ValidationError;

#[rstest]
#[case("example.com/readme", "https://example.com/readme")]
#[case("  example.com  ", "https://example.com")]
#[case("http://example.com", "http://example.com")]
#[case("HTTPS://Example.com/A", "HTTPS://Example.com/A")]
#[case("localhost:3000", "https://localhost:3000")]
#[case("//example.com/readme", "https://example.com/readme")]
#[case("  //example.com ", "https://example.com")]
fn test_accepted_urls(#[case] input: &str, #[case] stored: &str) {
    assert_eq!(validate_url(input).unwrap(), stored);
}

#[rstest]
#[case("ftp://example.com/file", "ftp")]
#[case("file:///etc/passwd", "file")]
#[case("javascript:alert(1)", "javascript")]
#[case("mailto:ada@example.com", "mailto")]
fn test_unsupported_schemes(#[case] input: &str, #[case] scheme: &str) {
    assert_eq!(
        validate_url(input),
        Err(ValidationError::UnsupportedScheme(scheme.to_string()))
    );
}

#[rstest]
#[case("")]
#[case("   ")]
#[case("\t\n")]
fn test_blank_url_is_required(#[case] input: &str) {
    assert_eq!(validate_url(input), Err(ValidationError::EmptyUrl));
}

#[rstest]
#[case("https:/x.com")]
#[case("https:x.com")]
#[case("HTTP:/x.com")]
#[case("https:///x.com")]
#[case("////example.com")]
#[case("https:\\\\x.com")]
fn test_web_scheme_without_authority_is_invalid(#[case] input: &str) {
    assert!(
        matches!(validate_url(input), Err(ValidationError::InvalidUrl(_))),
        "{input} should be rejected"
    );
}

#[test]
fn test_web_scheme_is_never_prefixed_twice() {
    assert_eq!(normalize_url("https:/x.com"), "https:/x.com");
    assert_eq!(normalize_url("Https:x.com"), "Https:x.com");
}

#[test]
fn test_unparseable_url_is_invalid() {
    assert!(matches!(validate_url("not a url"), Err(ValidationError::InvalidUrl(_))));
}

#[rstest]
#[case("")]
#[case("    ")]
fn test_blank_title_is_required(#[case] input: &str) {
    assert_eq!(validate_title(input), Err(ValidationError::EmptyTitle));
}

#[test]
fn test_title_is_trimmed() {
    assert_eq!(validate_title("  Docs  ").unwrap(), "Docs");
}

#[test]
fn test_bookmark_checks_title_before_url() {
    assert_eq!(
        validate_bookmark(" ", "ftp://x", "u1"),
        Err(ValidationError::EmptyTitle)
    );
}

#[test]
fn test_bookmark_docs_example() {
    let row = validate_bookmark("Docs", "example.com/readme", "u1").unwrap();
    assert_eq!(row.title, "Docs");
    assert_eq!(row.url, "https://example.com/readme");
    assert_eq!(row.user_id, "u1");
}

#[test]
fn test_normalize_leaves_blank_empty() {
    assert_eq!(normalize_url("  "), "");
}
