//! App Core for smartmarks.
//!
//! Picks the backends, starts the controller and owns its task. Both
//! binaries go through [`App`].

use std::fs;
use std::sync::Arc;

use anyhow::Context;
use tokio::task::JoinHandle;

use crate::backend::memory::MemoryBackend;
use crate::backend::supabase::{SupabaseAuth, SupabaseClient, SupabaseFeed, SupabaseStore};
use crate::backend::{AuthBackend, BookmarkStore, ChangeFeed};
use crate::controller::{Controller, ControllerHandle};
use crate::services::session_vault::SessionVault;
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait, ENV_SESSION_PASSPHRASE};
use crate::types::errors::ControllerError;
use crate::types::settings::AppSettings;

/// File name of the session database inside the data dir.
pub const SESSION_DB_FILE: &str = "session.db";

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "smartmarks=info";

/// Installs the global subscriber. Logs go to stderr; stdout belongs to the UI.
pub fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// The three backend seams.
#[derive(Clone)]
pub struct Backends {
    pub auth: Arc<dyn AuthBackend>,
    pub store: Arc<dyn BookmarkStore>,
    pub feed: Arc<dyn ChangeFeed>,
}

impl Backends {
    pub fn memory(backend: &MemoryBackend) -> Self {
        Self {
            auth: Arc::new(backend.clone()),
            store: Arc::new(backend.clone()),
            feed: Arc::new(backend.clone()),
        }
    }

    pub fn supabase(settings: &AppSettings, vault: Option<Arc<SessionVault>>) -> Self {
        let client = SupabaseClient::new(&settings.backend, &settings.http);
        Self {
            auth: Arc::new(SupabaseAuth::new(client.clone(), vault)),
            store: Arc::new(SupabaseStore::new(client.clone(), &settings.realtime.table)),
            feed: Arc::new(SupabaseFeed::new(
                client,
                &settings.backend.resolved_realtime_url(),
            )),
        }
    }
}

/// A running client.
pub struct App {
    pub settings: AppSettings,
    pub handle: ControllerHandle,
    /// Set in offline mode, so callers can inspect or drive the fake backend.
    pub memory: Option<MemoryBackend>,
    task: JoinHandle<()>,
}

impl App {
    /// Starts the controller on the current tokio runtime.
    pub fn start(settings: AppSettings, backends: Backends) -> Self {
        let controller = Controller::new(backends.auth, backends.store, backends.feed, &settings);
        let (handle, task) = controller.spawn();
        Self {
            settings,
            handle,
            memory: None,
            task,
        }
    }

    /// Loads settings (file, `.env`, environment) and starts against the
    /// hosted backend, or the in-process one when `offline`.
    pub fn launch(config_path: Option<String>, offline: bool) -> anyhow::Result<Self> {
        let mut engine = SettingsEngine::new(config_path);
        let settings = engine
            .load_with_env()
            .with_context(|| format!("loading settings from {}", engine.get_config_path()))?;

        if offline {
            tracing::info!("starting offline with the in-process backend");
            let memory = MemoryBackend::new();
            let mut app = Self::start(settings, Backends::memory(&memory));
            app.memory = Some(memory);
            return Ok(app);
        }

        if settings.backend.anon_key.is_empty() {
            tracing::warn!("backend.anon_key is empty; requests will likely be rejected");
        }
        let data_dir = engine.data_dir();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("creating data dir {}", data_dir.display()))?;
        let db_path = data_dir.join(SESSION_DB_FILE);
        if settings.storage.uses_default_passphrase() {
            tracing::warn!(
                "stored tokens use the built-in passphrase; set {} to protect them",
                ENV_SESSION_PASSPHRASE
            );
        }
        let vault = SessionVault::open(&db_path, &settings.storage.passphrase)
            .with_context(|| format!("opening session store {}", db_path.display()))?;
        tracing::debug!(stored = vault.has_session(), "session store opened");
        tracing::info!(backend = %settings.backend.url, "starting");

        let backends = Backends::supabase(&settings, Some(Arc::new(vault)));
        Ok(Self::start(settings, backends))
    }

    /// Stops the controller and waits for it to release its listeners.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        match self.handle.shutdown().await {
            Ok(_) | Err(ControllerError::Stopped) => {}
            Err(e) => tracing::warn!(error = %e, "shutdown command failed"),
        }
        drop(self.handle);
        self.task.await.context("controller task panicked")?;
        Ok(())
    }
}
