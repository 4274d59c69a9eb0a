//! Property-based tests for bookmark input normalization.
//!
//! Scheme-less input gains `https://`, http(s) input is stored as typed, and
//! every other scheme is refused before anything is written.

use proptest::prelude::*;

use smartmarks::services::url_policy::{normalize_url, validate_title, validate_url};
use smartmarks::types::errors::ValidationError;

fn arb_host_path() -> impl Strategy<Value = String> {
    ("[a-z]{1,12}", "[a-z]{2,5}", "(/[a-z0-9_-]{0,10}){0,3}")
        .prop_map(|(name, tld, path)| format!("{}.{}{}", name, tld, path))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn schemeless_input_gets_https(host in arb_host_path()) {
        prop_assert_eq!(validate_url(&host).unwrap(), format!("https://{}", host));
    }

    #[test]
    fn http_and_https_are_kept(scheme in "https?", host in arb_host_path()) {
        let input = format!("{}://{}", scheme, host);
        prop_assert_eq!(validate_url(&input).unwrap(), input);
    }

    #[test]
    fn surrounding_whitespace_is_ignored(
        host in arb_host_path(),
        left in "[ \t]{0,3}",
        right in "[ \t\n]{0,3}",
    ) {
        let padded = format!("{}{}{}", left, host, right);
        prop_assert_eq!(validate_url(&padded), validate_url(&host));
    }

    #[test]
    fn other_schemes_are_refused(scheme in "(ftp|ws|wss|gopher|sftp)", host in arb_host_path()) {
        let input = format!("{}://{}", scheme, host);
        prop_assert_eq!(validate_url(&input), Err(ValidationError::UnsupportedScheme(scheme)));
    }

    #[test]
    fn normalize_is_idempotent(input in "\\PC{0,40}") {
        let once = normalize_url(&input);
        prop_assert_eq!(normalize_url(&once), once);
    }

    #[test]
    fn blank_titles_are_rejected(title in "[ \t\n]{0,8}") {
        prop_assert_eq!(validate_title(&title), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn titles_are_trimmed(core in "[A-Za-z0-9][A-Za-z0-9 ]{0,20}[A-Za-z0-9]", pad in " {0,4}") {
        let padded = format!("{}{}{}", pad, core, pad);
        prop_assert_eq!(validate_title(&padded).unwrap(), core);
    }
}
