pub mod account;
pub mod completion;
pub mod config;
pub mod session;

use std::sync::Arc;

use anyhow::{Context as _, Result};
use client::{FileStorage, Gateway, Notice, SessionStorage, SessionStore, UiHooks};
use shared::config::ClientConfig;
use tracing::{debug, info};

/// Reports gateway notices on stderr.
#[derive(Debug, Default)]
pub struct CliHooks;

impl UiHooks for CliHooks {
    fn notify(&self, notice: &Notice) {
        eprintln!("warning: {notice}");
    }

    fn redirect_to_login(&self) {
        info!("stored session cleared after 401");
        eprintln!("the stored session was cleared; run `junjian login` to sign in again");
    }
}

/// Everything a command needs to talk to the API.
#[derive(Debug)]
pub struct Context {
    pub gateway: Gateway,
    pub store: SessionStore,
    pub storage: FileStorage,
}

impl Context {
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let storage = FileStorage::new(config.session_path());
        debug!(
            api = %config.api_base_url,
            session = %storage.path().display(),
            timeout_secs = config.timeout_secs,
            "opening session"
        );
        let shared: Arc<dyn SessionStorage> = Arc::new(storage.clone());
        let gateway = Gateway::new(config, shared.clone(), Arc::new(CliHooks))
            .context("failed to build HTTP client")?;
        let store = SessionStore::new(gateway.clone(), shared);
        Ok(Self {
            gateway,
            store,
            storage,
        })
    }
}
