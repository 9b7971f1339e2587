use std::io;

use scribble_core::views::{AuthViewError, NotesError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] scribble_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Notes(#[from] NotesError),
    #[error(transparent)]
    Auth(#[from] AuthViewError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(
        "Firebase is not configured. Run `scribble config init --api-key <KEY> --project-id <ID>`, set SCRIBBLE_FIREBASE_API_KEY and SCRIBBLE_FIREBASE_PROJECT_ID, or pass --offline."
    )]
    NotConfigured,
}

/// Problems with a line typed into the interactive shell
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Unknown command '{0}'. Type `help` for a list of commands.")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("{0}")]
    AmbiguousNoteId(String),
}
