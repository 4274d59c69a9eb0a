//! Property-based tests for AppSettings serialization round-trip.
//!
//! Settings written by the engine must read back unchanged, both as raw JSON
//! and through a save/load cycle on disk.

use proptest::prelude::*;

use smartmarks::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use smartmarks::types::settings::{
    AppSettings, AuthSettings, BackendSettings, HttpSettings, RealtimeSettings, StorageSettings,
};

fn arb_backend() -> impl Strategy<Value = BackendSettings> {
    (
        "https://[a-z]{3,12}\\.supabase\\.co",
        "[A-Za-z0-9._-]{0,60}",
        proptest::option::of("wss?://[a-z]{3,12}\\.example\\.com/realtime"),
    )
        .prop_map(|(url, anon_key, realtime_url)| BackendSettings {
            url,
            anon_key,
            realtime_url,
        })
}

fn arb_auth() -> impl Strategy<Value = AuthSettings> {
    (
        prop_oneof![Just("google"), Just("github"), Just("gitlab")],
        "http://localhost:[0-9]{4}(/[a-z]{1,8})?",
    )
        .prop_map(|(provider, redirect_to)| AuthSettings {
            provider: provider.to_string(),
            redirect_to,
        })
}

fn arb_realtime() -> impl Strategy<Value = RealtimeSettings> {
    (any::<bool>(), any::<bool>(), "[a-z_]{1,12}", "[a-z_]{1,12}").prop_map(
        |(enabled, owner_filter, schema, table)| RealtimeSettings {
            enabled,
            owner_filter,
            schema,
            table,
        },
    )
}

fn arb_settings() -> impl Strategy<Value = AppSettings> {
    (
        arb_backend(),
        arb_auth(),
        arb_realtime(),
        1u64..600,
        proptest::option::of("/[a-z]{1,10}(/[a-z]{1,10}){0,2}"),
        "\\PC{1,40}",
    )
        .prop_map(|(backend, auth, realtime, timeout_secs, data_dir, passphrase)| AppSettings {
            backend,
            auth,
            realtime,
            http: HttpSettings { timeout_secs },
            storage: StorageSettings { data_dir, passphrase },
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn settings_json_roundtrip(settings in arb_settings()) {
        let json = serde_json::to_string_pretty(&settings).expect("serialize");
        let back: AppSettings = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(back, settings);
    }

    #[test]
    fn settings_survive_save_and_load(settings in arb_settings()) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json").to_string_lossy().to_string();

        let json = serde_json::to_string(&settings).expect("serialize");
        std::fs::write(&path, json).expect("write");
        let mut engine = SettingsEngine::new(Some(path.clone()));
        prop_assert_eq!(engine.load().expect("load"), settings.clone());

        engine.save().expect("save");
        let mut reloaded = SettingsEngine::new(Some(path));
        prop_assert_eq!(reloaded.load().expect("reload"), settings);
    }
}
