//! Line commands understood by the interactive shell.

use crate::error::CommandError;

pub const HELP: &str = "\
Signed out:
  login <email> <password>       Sign in with email and password
  register <email> <password>    Create an account and sign in
  mode                           Switch between sign-in and register
  show-password                  Toggle showing the typed password
  federated <provider> <token>   Sign in with an identity provider token

Signed in:
  add <title> | <content>        Add a note
  title <text>                   Set the title of the draft or add form
  content <text>                 Set the content of the draft or add form
  add                            Add a note from the add form
  edit <id>                      Start editing a note (id or unique prefix)
  save                           Save the note being edited
  cancel                         Stop editing without saving
  delete <id>                    Delete a note
  list                           Show your notes
  logout                         Sign out

  help                           Show this help
  quit                           Leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Empty,
    Login { email: String, password: String },
    Register { email: String, password: String },
    ToggleMode,
    ShowPassword,
    Federated { provider_id: String, id_token: String },
    Logout,
    Add { title: String, content: String },
    SubmitForm,
    Title(String),
    Content(String),
    Edit(String),
    Save,
    Cancel,
    Delete(String),
    List,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<ReplCommand, CommandError> {
    let line = line.trim();
    let (name, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(name, rest)| (name, rest.trim()));

    let command = match name.to_lowercase().as_str() {
        "" => ReplCommand::Empty,
        "login" | "signin" => {
            let (email, password) = two_words(rest, "login <email> <password>")?;
            ReplCommand::Login { email, password }
        }
        "register" | "signup" => {
            let (email, password) = two_words(rest, "register <email> <password>")?;
            ReplCommand::Register { email, password }
        }
        "mode" => ReplCommand::ToggleMode,
        "show-password" => ReplCommand::ShowPassword,
        "federated" => {
            let (provider_id, id_token) = two_words(rest, "federated <provider-id> <id-token>")?;
            ReplCommand::Federated {
                provider_id,
                id_token,
            }
        }
        "logout" | "signout" => ReplCommand::Logout,
        "add" | "new" if rest.is_empty() => ReplCommand::SubmitForm,
        "add" | "new" => {
            let (title, content) = rest
                .split_once('|')
                .ok_or(CommandError::Usage("add <title> | <content>"))?;
            ReplCommand::Add {
                title: title.trim().to_string(),
                content: content.trim().to_string(),
            }
        }
        "title" => ReplCommand::Title(rest.to_string()),
        "content" => ReplCommand::Content(rest.to_string()),
        "edit" => ReplCommand::Edit(one_word(rest, "edit <id>")?),
        "save" => ReplCommand::Save,
        "cancel" => ReplCommand::Cancel,
        "delete" | "rm" => ReplCommand::Delete(one_word(rest, "delete <id>")?),
        "list" | "ls" => ReplCommand::List,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" => ReplCommand::Quit,
        _ => return Err(CommandError::Unknown(name.to_string())),
    };
    Ok(command)
}

fn one_word(rest: &str, usage: &'static str) -> Result<String, CommandError> {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next()) {
        (Some(word), None) => Ok(word.to_string()),
        _ => Err(CommandError::Usage(usage)),
    }
}

fn two_words(rest: &str, usage: &'static str) -> Result<(String, String), CommandError> {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next(), words.next()) {
        (Some(first), Some(second), None) => Ok((first.to_string(), second.to_string())),
        _ => Err(CommandError::Usage(usage)),
    }
}
