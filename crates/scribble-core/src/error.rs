//! Error types for scribble-core

use thiserror::Error;

use crate::auth::AuthError;
use crate::config::ConfigError;
use crate::store::StoreError;
use crate::views::NotesError;

/// Result type alias using scribble-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while wiring up or driving a Scribble backend
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Identity provider error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Document store error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A notes operation was refused before reaching the store
    #[error(transparent)]
    Notes(#[from] NotesError),
}
