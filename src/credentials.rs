//! Credential resolution
//!
//! Each field is taken from the first source that has it: inline
//! settings, then the JSON credentials file, then an interactive prompt.

use crate::config::AuthSettings;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("cannot read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("credentials file {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no {field} available for {host} and no terminal to ask on")]
    Unresolved { field: &'static str, host: String },

    #[error("credential prompt failed: {0}")]
    Prompt(#[source] io::Error),
}

/// One entry of the credentials file.
#[derive(Debug, Default, Deserialize)]
struct FileEntry {
    username: Option<String>,
    password: Option<String>,
}

/// Asks the user for missing values.
pub trait Prompter {
    fn is_interactive(&self) -> bool;
    fn ask(&mut self, label: &str) -> io::Result<String>;
    /// Like [`ask`](Prompter::ask) without echoing what is typed.
    fn ask_hidden(&mut self, label: &str) -> io::Result<String>;
}

/// Prompts on the controlling terminal.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn is_interactive(&self) -> bool {
        io::stdin().is_terminal() && io::stderr().is_terminal()
    }

    fn ask(&mut self, label: &str) -> io::Result<String> {
        eprint!("{}: ", label);
        io::stderr().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn ask_hidden(&mut self, label: &str) -> io::Result<String> {
        eprint!("{}: ", label);
        io::stderr().flush()?;
        terminal::enable_raw_mode()?;
        let read = read_hidden_line();
        let _ = terminal::disable_raw_mode();
        eprintln!();
        read
    }
}

fn read_hidden_line() -> io::Result<String> {
    let mut buf = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Enter => return Ok(buf),
                KeyCode::Backspace => {
                    buf.pop();
                }
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
                }
                KeyCode::Char(c) => buf.push(c),
                KeyCode::Esc => {
                    return Err(io::Error::new(io::ErrorKind::Interrupted, "cancelled"));
                }
                _ => {}
            }
        }
    }
}

/// Resolve a username and password for `host`.
///
/// `on_warning` receives non-fatal notices such as an `authKey` that has
/// no credentials file to look in.
pub fn resolve(
    host: &str,
    auth: &AuthSettings,
    prompter: &mut dyn Prompter,
    on_warning: &mut dyn FnMut(&str),
) -> Result<Credentials, CredentialError> {
    let mut username = auth.username.clone();
    let mut password = auth.password.clone();

    if username.is_none() || password.is_none() {
        if let Some(entry) = lookup_file(host, auth, on_warning)? {
            username = username.or(entry.username);
            password = password.or(entry.password);
        }
    }

    let username = match username.filter(|u| !u.is_empty()) {
        Some(u) => u,
        None => {
            let answer = prompt_for(prompter, "username", host, false)?;
            if answer.is_empty() {
                return Err(CredentialError::Unresolved {
                    field: "username",
                    host: host.to_string(),
                });
            }
            answer
        }
    };
    let password = match password {
        Some(p) => p,
        None => prompt_for(prompter, "password", host, true)?,
    };

    Ok(Credentials { username, password })
}

fn prompt_for(
    prompter: &mut dyn Prompter,
    field: &'static str,
    host: &str,
    hidden: bool,
) -> Result<String, CredentialError> {
    if !prompter.is_interactive() {
        return Err(CredentialError::Unresolved {
            field,
            host: host.to_string(),
        });
    }
    let label = format!("{} for {}", field, host);
    let answer = if hidden {
        prompter.ask_hidden(&label)
    } else {
        prompter.ask(&label)
    };
    answer.map_err(CredentialError::Prompt)
}

fn lookup_file(
    host: &str,
    auth: &AuthSettings,
    on_warning: &mut dyn FnMut(&str),
) -> Result<Option<FileEntry>, CredentialError> {
    let path = &auth.auth_path;
    if !path.is_file() {
        if auth.auth_key.is_some() {
            on_warning(&format!(
                "'authKey' configured but no credentials file found at {}",
                path.display()
            ));
        }
        return Ok(None);
    }

    let text = fs::read_to_string(path).map_err(|source| CredentialError::Read {
        path: path.clone(),
        source,
    })?;
    let mut entries: HashMap<String, FileEntry> =
        serde_json::from_str(&text).map_err(|source| CredentialError::Malformed {
            path: path.clone(),
            source,
        })?;

    let key = auth.auth_key.as_deref().unwrap_or(host);
    Ok(entries.remove(key))
}
