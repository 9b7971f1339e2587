//! Front-end independent view state.
//!
//! Each view owns its state, exposes it by reference, and publishes every
//! transition on a `watch` channel for renderers.

mod auth;
mod notes;
mod shell;

pub use auth::{AuthMode, AuthView, AuthViewError, AuthViewState};
pub use notes::{
    EditDraft, EditMode, NotesError, NotesEvent, NotesView, NotesViewState, Operation, ViewError,
};
pub use shell::{Screen, SessionShell, ShellEvent};
