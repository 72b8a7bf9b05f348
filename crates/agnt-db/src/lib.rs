mod database;
pub mod error;
mod migration;
mod models;
pub mod provider_credentials;
pub mod sessions;
pub mod store;

pub use error::{Error, Result};
pub use models::{AppendTurnInput, CreateSessionInput, Project, Session, SessionRollout, Turn};
pub use provider_credentials::{ProviderCredential, ProviderCredentials};
pub use sessions::Sessions;
pub use store::Store;
