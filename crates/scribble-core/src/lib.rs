//! scribble-core - Core library for Scribble
//!
//! This crate contains the note models, the identity and document store
//! contracts (with Firebase and in-process implementations), and the view
//! state machines shared by every Scribble front end.

pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod store;
pub mod util;
pub mod views;

#[cfg(test)]
mod test_support;

pub use backend::Backend;
pub use error::{Error, Result};
pub use models::{Namespace, Note, NoteFields, NoteId, UserId};
