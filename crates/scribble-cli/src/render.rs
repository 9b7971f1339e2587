//! Plain-text rendering of the shell screens.

use chrono::{DateTime, Local};
use scribble_core::auth::AuthUser;
use scribble_core::views::{AuthViewState, NotesViewState, Screen};
use scribble_core::{Note, NoteId};

use crate::error::CommandError;

const SHORT_ID_LEN: usize = 8;
const EMPTY_LIST_MESSAGE: &str = "You don't have any notes yet. Add one above!";

pub fn short_id(id: &NoteId) -> String {
    id.as_str().chars().take(SHORT_ID_LEN).collect()
}

pub fn format_local_timestamp(timestamp_ms: i64) -> String {
    DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| {
            date_time
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        },
    )
}

pub fn welcome_line(user: &AuthUser) -> String {
    format!(
        "Welcome, {}!",
        user.email.as_deref().unwrap_or_else(|| user.id.as_str())
    )
}

pub fn render_screen(
    screen: &Screen,
    auth: &AuthViewState,
    notes: Option<&NotesViewState>,
) -> Vec<String> {
    match (screen, notes) {
        (Screen::Loading, _) => vec!["Loading...".to_string()],
        (Screen::SignedOut, _) => render_auth(auth),
        (Screen::SignedIn(user), Some(notes)) => {
            let mut lines = vec![welcome_line(user), String::new()];
            lines.extend(render_notes(notes));
            lines
        }
        (Screen::SignedIn(user), None) => vec![welcome_line(user)],
    }
}

pub fn render_auth(auth: &AuthViewState) -> Vec<String> {
    let mut lines = vec![
        format!("== {} ==", auth.mode.title()),
        format!("Email:    {}", auth.email),
        format!("Password: {}", auth.password_display()),
    ];
    if auth.submitting {
        lines.push("Please wait...".to_string());
    }
    if let Some(error) = &auth.error {
        lines.push(format!("Error: {error}"));
    }
    lines.push(format!("({}: type `mode`)", auth.mode.switch_hint()));
    lines
}

pub fn render_notes(state: &NotesViewState) -> Vec<String> {
    let mut lines = Vec::new();
    if !state.form.title.is_empty() || !state.form.content.is_empty() {
        lines.push(format!(
            "New note: title={:?} content={:?}",
            state.form.title, state.form.content
        ));
    }
    if let Some(error) = &state.error {
        lines.push(format!("Error: {error}"));
    }

    if state.notes.is_empty() {
        lines.push(EMPTY_LIST_MESSAGE.to_string());
        return lines;
    }

    let draft = state.mode.draft();
    for note in &state.notes {
        match draft {
            Some(draft) if draft.note_id == note.id => {
                lines.push(format!("{}  [editing]", short_id(&note.id)));
                lines.push(format!("    title:   {}", draft.title));
                lines.push(format!("    content: {}", draft.content));
                lines.push("    (`save` or `cancel`)".to_string());
            }
            _ => lines.extend(render_note(note)),
        }
    }
    lines
}

fn render_note(note: &Note) -> Vec<String> {
    let mut lines = vec![format!("{}  {}", short_id(&note.id), note.title)];
    lines.extend(note.content.lines().map(|line| format!("    {line}")));
    let mut stamp = format!("    Created {}", format_local_timestamp(note.created_at));
    if let Some(updated_at) = note.updated_at {
        stamp = format!("{stamp} · Updated {}", format_local_timestamp(updated_at));
    }
    lines.push(stamp);
    lines
}

/// Find a listed note by full id or unique id prefix.
pub fn resolve_note_id(notes: &[Note], query: &str) -> Result<NoteId, CommandError> {
    let query = query.trim();
    if let Some(note) = notes.iter().find(|note| note.id.as_str() == query) {
        return Ok(note.id.clone());
    }

    let matching = notes
        .iter()
        .filter(|note| !query.is_empty() && note.id.as_str().starts_with(query))
        .collect::<Vec<_>>();
    match matching.as_slice() {
        [] => Err(CommandError::NoteNotFound(query.to_string())),
        [note] => Ok(note.id.clone()),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|note| short_id(&note.id))
                .collect::<Vec<_>>()
                .join(", ");
            Err(CommandError::AmbiguousNoteId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}
