//! Repository traits for the data access layer.
//!
//! Services interact with storage exclusively through these traits.
//! Storage backends implement the individual repositories and expose them
//! through a [`RepositoryProvider`], which also owns backend lifecycle
//! concerns (migrations, health).

pub mod account;
pub mod attempt;

pub use account::AccountRepository;
pub use attempt::AttemptRepository;

use async_trait::async_trait;
use std::sync::Arc;

use crate::Error;

/// Unified access to all repositories a storage backend provides.
#[async_trait]
pub trait RepositoryProvider: Send + Sync + 'static {
    /// The account repository implementation type
    type Accounts: AccountRepository;

    /// The attempt repository implementation type
    type Attempts: AttemptRepository;

    fn accounts(&self) -> Arc<Self::Accounts>;

    fn attempts(&self) -> Arc<Self::Attempts>;

    /// Run any pending schema migrations.
    async fn migrate(&self) -> Result<(), Error>;

    /// Check backend connectivity.
    async fn health_check(&self) -> Result<(), Error>;
}
