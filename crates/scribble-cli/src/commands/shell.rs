//! Interactive session shell.

use scribble_core::auth::FederatedCredential;
use scribble_core::views::{AuthMode, NotesError, NotesEvent, NotesView, SessionShell, ShellEvent};
use scribble_core::Backend;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;
use crate::render::{render_auth, render_notes, render_screen, resolve_note_id, short_id};
use crate::repl::{parse_command, ReplCommand, HELP};
use crate::session_store::KeyringSessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub async fn run_shell(offline: bool, profile: Option<&str>) -> Result<(), CliError> {
    let backend = resolve_backend(offline, profile)?;
    let mut shell = SessionShell::new(backend);
    if let Err(error) = shell.start().await {
        tracing::warn!("Could not restore the previous session: {}", error);
    }
    println!("Type `help` for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                let flow = match parse_command(&line) {
                    Ok(command) => execute(&mut shell, command).await.unwrap_or_else(|error| {
                        println!("Error: {error}");
                        Flow::Continue
                    }),
                    Err(error) => {
                        println!("{error}");
                        Flow::Continue
                    }
                };
                if flow == Flow::Quit {
                    break;
                }
            }
            event = shell.next_event() => {
                print_lines(&describe_event(&shell, &event));
                if event == ShellEvent::ProviderClosed {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Pick the hosted or in-process services for this run.
pub fn resolve_backend(offline: bool, profile: Option<&str>) -> Result<Backend, CliError> {
    if offline {
        println!("Offline mode: notes are kept in memory until you quit.");
        return Ok(Backend::offline());
    }

    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let profile = config.profile(&profile_name).cloned().unwrap_or_default();
    let firebase = profile
        .firebase_config(|name| std::env::var(name).ok())
        .map_err(scribble_core::Error::from)?
        .ok_or(CliError::NotConfigured)?;
    tracing::info!(
        "Using profile '{}' for project {}",
        profile_name,
        firebase.project_id
    );
    Backend::firebase(&firebase, KeyringSessionStore::new(&profile_name)).map_err(CliError::from)
}

/// Apply one typed command to the shell.
pub async fn execute(shell: &mut SessionShell, command: ReplCommand) -> Result<Flow, CliError> {
    match command {
        ReplCommand::Empty => {}
        ReplCommand::Help => println!("{HELP}"),
        ReplCommand::Quit => return Ok(Flow::Quit),
        ReplCommand::Login { email, password } => {
            submit_credentials(shell, AuthMode::SignIn, email, password).await?;
        }
        ReplCommand::Register { email, password } => {
            submit_credentials(shell, AuthMode::Register, email, password).await?;
        }
        ReplCommand::ToggleMode => {
            shell.auth_mut().toggle_mode();
            print_lines(&render_auth(shell.auth().state()));
        }
        ReplCommand::ShowPassword => {
            shell.auth_mut().toggle_password_visibility();
            print_lines(&render_auth(shell.auth().state()));
        }
        ReplCommand::Federated {
            provider_id,
            id_token,
        } => {
            let credential = FederatedCredential {
                provider_id,
                id_token,
            };
            shell.auth_mut().federated_sign_in(&credential).await?;
        }
        ReplCommand::Logout => {
            shell
                .sign_out()
                .await
                .map_err(|error| CliError::Core(error.into()))?;
        }
        ReplCommand::Add { title, content } => notes_mut(shell)?.add_note(title, content)?,
        ReplCommand::SubmitForm => notes_mut(shell)?.submit_form()?,
        ReplCommand::Title(title) => {
            let notes = notes_mut(shell)?;
            if notes.state().is_editing() {
                notes.edit_draft_title(title)?;
            } else {
                notes.set_form_title(title);
            }
            print_lines(&render_notes(notes.state()));
        }
        ReplCommand::Content(content) => {
            let notes = notes_mut(shell)?;
            if notes.state().is_editing() {
                notes.edit_draft_content(content)?;
            } else {
                notes.set_form_content(content);
            }
            print_lines(&render_notes(notes.state()));
        }
        ReplCommand::Edit(query) => {
            let notes = notes_mut(shell)?;
            let note_id = resolve_note_id(&notes.state().notes, &query)?;
            if let Some(abandoned) = notes.begin_edit(&note_id)? {
                println!(
                    "Discarded unsaved changes to {}",
                    short_id(&abandoned.note_id)
                );
            }
            print_lines(&render_notes(notes.state()));
        }
        ReplCommand::Save => notes_mut(shell)?.save_edit()?,
        ReplCommand::Cancel => {
            if notes_mut(shell)?.cancel_edit().is_none() {
                println!("Nothing to cancel.");
            }
        }
        ReplCommand::Delete(query) => {
            let notes = notes_mut(shell)?;
            let note_id = resolve_note_id(&notes.state().notes, &query)?;
            notes.delete_note(&note_id)?;
        }
        ReplCommand::List => print_lines(&render_screen(
            &shell.screen(),
            shell.auth().state(),
            shell.notes().map(NotesView::state),
        )),
    }
    Ok(Flow::Continue)
}

/// What to print after the shell applied an event.
pub fn describe_event(shell: &SessionShell, event: &ShellEvent) -> Vec<String> {
    let notes_state = shell.notes().map(NotesView::state);
    match event {
        ShellEvent::SessionChanged(screen) => {
            render_screen(screen, shell.auth().state(), notes_state)
        }
        ShellEvent::Notes(NotesEvent::SnapshotApplied {
            draft_discarded, ..
        }) => {
            let mut lines = Vec::new();
            if *draft_discarded {
                lines.push("The note you were editing was deleted.".to_string());
            }
            lines.extend(notes_state.map(render_notes).unwrap_or_default());
            lines
        }
        ShellEvent::Notes(NotesEvent::SubscriptionFailed(_) | NotesEvent::MutationFailed { .. }) => {
            notes_state
                .and_then(|state| state.error.as_ref())
                .map(|error| vec![format!("Error: {error}")])
                .unwrap_or_default()
        }
        ShellEvent::Notes(NotesEvent::SubscriptionClosed) => {
            vec!["Lost the connection to your notes.".to_string()]
        }
        ShellEvent::Notes(NotesEvent::MutationSucceeded { operation, note_id }) => {
            tracing::debug!("{} finished for {}", operation, note_id);
            Vec::new()
        }
        ShellEvent::ProviderClosed => vec!["Identity provider stopped; exiting.".to_string()],
    }
}

async fn submit_credentials(
    shell: &mut SessionShell,
    mode: AuthMode,
    email: String,
    password: String,
) -> Result<(), CliError> {
    let auth = shell.auth_mut();
    if auth.state().mode != mode {
        auth.toggle_mode();
    }
    auth.set_email(email);
    auth.set_password(password);
    auth.submit().await?;
    Ok(())
}

fn notes_mut(shell: &mut SessionShell) -> Result<&mut NotesView, NotesError> {
    shell.notes_mut().ok_or(NotesError::NotSignedIn)
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}
