//! Data models for Scribble

mod namespace;
mod note;

pub use namespace::{Namespace, UserId};
pub use note::{order_newest_first, Note, NoteFields, NoteId};
