pub mod action;
pub mod config;
pub mod init;
pub mod serve;

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tap_core::config::Config;
use tap_core::{ActionService, IdentityIntrospection, KvStore, RedbStore};

/// Build the engine over `store` with the runner and settings from `cfg`.
pub(crate) fn build_service(cfg: &Config, store: Arc<dyn KvStore>) -> anyhow::Result<ActionService> {
    let settings = cfg
        .engine_settings()
        .context("invalid actions.default_release_after")?;
    let runner = Arc::new(IdentityIntrospection::new(cfg.identity.issuer.clone()));
    Ok(ActionService::new(store, runner, settings))
}

/// Open the configured on-disk store.
pub(crate) fn open_store(root: &Path, cfg: &Config) -> anyhow::Result<Arc<dyn KvStore>> {
    let path = cfg.store_path(root);
    let store = RedbStore::open(&path)
        .with_context(|| format!("failed to open store at {}", path.display()))?;
    Ok(Arc::new(store))
}
