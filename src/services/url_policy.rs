//! URL and title validation for bookmark input.
//!
//! Normalization policy: trim the input, prepend `https://` when it carries no
//! recognized scheme, then require an absolute `http`/`https` URL with a host.
//! Scheme-relative input (`//example.com`) gets `https:`.

use url::Url;

use crate::types::bookmark::NewBookmark;
use crate::types::errors::ValidationError;

/// Prefix added to scheme-less input.
pub const DEFAULT_SCHEME_PREFIX: &str = "https://";

/// Schemes accepted for storage.
const WEB_SCHEMES: &[&str] = &["http", "https"];

/// Schemes written without `//` that must not be mistaken for a host.
const OPAQUE_SCHEMES: &[&str] = &["about", "blob", "data", "file", "javascript", "mailto", "tel"];

fn is_scheme_token(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Returns true when `input` already starts with a recognized scheme.
///
/// `http:` and `https:` always count, whatever follows them.
/// `host:port` input such as `localhost:8080` is not a scheme.
pub fn has_scheme(input: &str) -> bool {
    let Some((token, rest)) = input.split_once(':') else {
        return false;
    };
    if !is_scheme_token(token) {
        return false;
    }
    let token = token.to_ascii_lowercase();
    WEB_SCHEMES.contains(&token.as_str())
        || rest.starts_with("//")
        || OPAQUE_SCHEMES.contains(&token.as_str())
}

/// Trims `input` and prepends `https://` when it has no scheme.
pub fn normalize_url(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() || has_scheme(trimmed) {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("//") {
        format!("{}{}", DEFAULT_SCHEME_PREFIX, rest)
    } else {
        format!("{}{}", DEFAULT_SCHEME_PREFIX, trimmed)
    }
}

/// True when the text after `scheme:` is `//` followed by an authority.
///
/// The parser also accepts `https:/x.com` and `https:///x.com`; those are
/// refused here instead of being stored in a form the user never typed.
fn has_authority(normalized: &str) -> bool {
    normalized
        .split_once(':')
        .and_then(|(_, rest)| rest.strip_prefix("//"))
        .is_some_and(|authority| !authority.starts_with(|c: char| c == '/' || c == '\\'))
}

/// Normalizes and validates a url, returning the string to store.
///
/// The stored value is the normalized input, not the parser's serialization,
/// so `example.com/readme` becomes exactly `https://example.com/readme`.
pub fn validate_url(input: &str) -> Result<String, ValidationError> {
    let normalized = normalize_url(input);
    if normalized.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    let parsed = Url::parse(&normalized)
        .map_err(|e| ValidationError::InvalidUrl(format!("{} ({})", normalized, e)))?;

    if !WEB_SCHEMES.contains(&parsed.scheme()) {
        return Err(ValidationError::UnsupportedScheme(parsed.scheme().to_string()));
    }
    if !has_authority(&normalized) {
        return Err(ValidationError::InvalidUrl(normalized));
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(normalized),
        _ => Err(ValidationError::InvalidUrl(normalized)),
    }
}

/// Trims a title and rejects it when nothing is left.
pub fn validate_title(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}

/// Validates raw form input into a row owned by `owner_id`.
///
/// The title is checked first, matching the order the form shows errors in.
pub fn validate_bookmark(title: &str, url: &str, owner_id: &str) -> Result<NewBookmark, ValidationError> {
    let title = validate_title(title)?;
    let url = validate_url(url)?;
    Ok(NewBookmark {
        title,
        url,
        user_id: owner_id.to_string(),
    })
}
