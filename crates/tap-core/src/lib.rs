pub mod action;
pub mod auth;
pub mod codec;
pub mod config;
pub mod duration;
pub mod engine;
pub mod error;
pub mod idempotency;
pub mod io;
pub mod paths;
pub mod runner;
pub mod store;

pub use action::{ActionRecord, ActionRequest, ActionStatusValue};
pub use auth::{Authorization, Caller};
pub use engine::{ActionService, EngineSettings};
pub use error::{ActionError, Result};
pub use runner::{ActionRunner, IdentityIntrospection, WorkError};
pub use store::{KvStore, MemoryStore, RedbStore};
