use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tap_core::config::{Config, WarnLevel};
use tap_core::{KvStore, MemoryStore};

pub fn run(root: &Path, port: Option<u16>, memory: bool) -> anyhow::Result<()> {
    let cfg = Config::load_or_default(root).context("failed to load config")?;

    let mut fatal = false;
    for w in cfg.validate() {
        match w.level {
            WarnLevel::Error => {
                tracing::error!("config: {}", w.message);
                fatal = true;
            }
            WarnLevel::Warning => tracing::warn!("config: {}", w.message),
        }
    }
    if fatal {
        anyhow::bail!("config has errors; run 'tap config validate'");
    }

    let store: Arc<dyn KvStore> = if memory {
        tracing::warn!("using in-memory store; actions are lost on exit");
        Arc::new(MemoryStore::new())
    } else {
        super::open_store(root, &cfg)?
    };
    let service = super::build_service(&cfg, store)?;

    let recovered = service
        .recover_stale(cfg.recovery_max_age())
        .context("startup recovery failed")?;
    if recovered > 0 {
        tracing::warn!(recovered, "recovered stale active actions from a previous run");
    }

    let state = tap_server::AppState::new(service, cfg.provider.clone());
    let port = port.unwrap_or(cfg.server.port);
    let prefix = cfg.server.url_prefix.clone();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(tap_server::serve(state, &prefix, port))
}
