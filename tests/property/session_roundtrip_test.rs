//! Property-based tests for session save-restore round-trip.
//!
//! For any session, saving then loading through the vault (serialize,
//! encrypt, SQLite, decrypt) yields an equal session.

use std::sync::OnceLock;

use proptest::prelude::*;

use smartmarks::services::session_vault::SessionVault;
use smartmarks::types::session::{Session, User};

/// Key derivation is slow on purpose; one vault serves every case.
fn vault() -> &'static SessionVault {
    static VAULT: OnceLock<SessionVault> = OnceLock::new();
    VAULT.get_or_init(|| SessionVault::open_in_memory("proptest").expect("vault"))
}

fn arb_user() -> impl Strategy<Value = User> {
    (
        "[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}",
        proptest::option::of("[a-z]{1,10}@[a-z]{2,8}\\.com"),
        proptest::option::of("\\PC{0,30}"),
        proptest::option::of("https://[a-z]{3,10}\\.com/[a-z0-9]{1,12}\\.png"),
    )
        .prop_map(|(id, email, display_name, avatar_url)| User {
            id,
            email,
            display_name,
            avatar_url,
        })
}

fn arb_session() -> impl Strategy<Value = Session> {
    (
        "[A-Za-z0-9._-]{10,200}",
        "[A-Za-z0-9]{8,40}",
        0i64..4_000_000_000i64,
        arb_user(),
    )
        .prop_map(|(access_token, refresh_token, expires_at, user)| Session {
            access_token,
            refresh_token,
            expires_at,
            user,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn session_save_load_roundtrip(session in arb_session()) {
        let vault = vault();
        vault.save(&session).expect("save");
        let loaded = vault.load().expect("load");
        prop_assert_eq!(loaded, Some(session));
    }

    #[test]
    fn session_json_roundtrip(session in arb_session()) {
        let json = serde_json::to_string(&session).expect("serialize");
        let back: Session = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(back, session);
    }
}
