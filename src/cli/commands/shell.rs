//! Interactive editing session.
//!
//! Holds one [`EditSession`] for the lifetime of the shell and turns each
//! input line into an intent: load, edit, save, pull, push, apply. Errors are
//! printed and the shell keeps going; nothing here is fatal.
//!
//! The save-before-load and save-before-push prompts live here, not in the
//! session or engine.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use super::edit::{parse_assignment, render};
use super::profile::{ProfileUpdate, describe};
use super::{Context, ask_yes_no};
use crate::error::{Error, Result};
use crate::remote::{RemoteSyncEngine, RemoteTransport};
use crate::session::{EditSession, SaveOutcome};

const HELP: &str = "\
Commands:
  load <path>        load a local config file
  show               show all fields grouped by section
  get <key>          print one field
  set <key> <value>  change a field (also: set key=value)
  save               write changes back to the loaded file
  pull               download the remote config and load it
  push               upload the loaded file to the device
  apply              restart the driver on the device
  profile            show the connection profile
  configure          edit the connection profile
  status             show what is loaded
  clear              unload the current file
  help               this text
  quit               leave the shell";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Load(PathBuf),
    Show,
    Get(String),
    Set(String, String),
    Save,
    Pull,
    Push,
    Apply,
    Profile,
    Configure,
    Status,
    Clear,
    Help,
    Quit,
}

impl Intent {
    /// Parse a non-empty input line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for unknown commands or missing
    /// arguments.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (command, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(c, r)| (c, r.trim()));
        let missing = |usage: &str| Error::InvalidArgument(format!("usage: {usage}"));

        let intent = match command.to_lowercase().as_str() {
            "load" | "open" if !rest.is_empty() => Self::Load(PathBuf::from(rest)),
            "load" | "open" => return Err(missing("load <path>")),
            "show" | "ls" => Self::Show,
            "get" if !rest.is_empty() => Self::Get(rest.to_string()),
            "get" => return Err(missing("get <key>")),
            "set" => {
                let (key, value) = if rest.contains('=') {
                    parse_assignment(rest)?
                } else {
                    rest.split_once(char::is_whitespace)
                        .map(|(k, v)| (k, v.trim()))
                        .ok_or_else(|| missing("set <key> <value>"))?
                };
                Self::Set(key.to_string(), value.to_string())
            }
            "save" => Self::Save,
            "pull" => Self::Pull,
            "push" => Self::Push,
            "apply" => Self::Apply,
            "profile" => Self::Profile,
            "configure" | "config" => Self::Configure,
            "status" => Self::Status,
            "clear" => Self::Clear,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => {
                return Err(Error::InvalidArgument(format!(
                    "unknown command '{other}' (type `help`)"
                )));
            }
        };
        Ok(intent)
    }
}

/// Execute the `shell` command on stdin/stdout.
///
/// # Errors
///
/// Returns an error only if the terminal itself fails.
pub fn execute(ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    Shell::new(ctx, engine, stdin.lock(), io::stdout(), interactive).run()
}

/// REPL state.
pub struct Shell<'a, T: RemoteTransport, R: BufRead, W: Write> {
    ctx: &'a Context,
    engine: RemoteSyncEngine<T>,
    session: EditSession,
    input: R,
    output: W,
    interactive: bool,
}

impl<'a, T: RemoteTransport, R: BufRead, W: Write> Shell<'a, T, R, W> {
    pub fn new(
        ctx: &'a Context,
        engine: RemoteSyncEngine<T>,
        input: R,
        output: W,
        interactive: bool,
    ) -> Self {
        Self {
            ctx,
            engine,
            session: EditSession::new(),
            input,
            output,
            interactive,
        }
    }

    /// Read and dispatch lines until `quit` or end of input.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading input or writing output fails.
    pub fn run(&mut self) -> Result<()> {
        if self.interactive {
            writeln!(self.output, "dbus-serialbattery config shell. Type `help` for commands.")?;
        }

        loop {
            if self.interactive {
                write!(self.output, "sbc> ")?;
                self.output.flush()?;
            }
            let Some(line) = self.read_line()? else {
                if self.session.is_dirty() {
                    writeln!(self.output, "Unsaved changes discarded.")?;
                }
                break;
            };
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let outcome = match Intent::parse(&line) {
                Ok(Intent::Quit) => {
                    if self.confirm_quit()? {
                        break;
                    }
                    Ok(())
                }
                Ok(intent) => self.dispatch(intent),
                Err(e) => Err(e),
            };
            if let Err(e) = outcome {
                self.report(&e)?;
            }
        }
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn ask(&mut self, prompt: &str) -> io::Result<bool> {
        ask_yes_no(&mut self.input, &mut self.output, prompt)
    }

    fn report(&mut self, e: &Error) -> io::Result<()> {
        writeln!(self.output, "Error: {e}")?;
        if let Some(hint) = e.hint() {
            writeln!(self.output, "  Hint: {hint}")?;
        }
        Ok(())
    }

    fn confirm_quit(&mut self) -> io::Result<bool> {
        if !self.session.is_dirty() {
            return Ok(true);
        }
        self.ask("There are unsaved changes. Quit anyway?")
    }

    /// Run one intent.
    ///
    /// # Errors
    ///
    /// Returns the operation's error; the caller reports it.
    pub fn dispatch(&mut self, intent: Intent) -> Result<()> {
        match intent {
            Intent::Load(path) => self.load(path),
            Intent::Show => {
                let document = self.session.document().ok_or(Error::NothingLoaded)?;
                render(&mut self.output, document)?;
                Ok(())
            }
            Intent::Get(key) => {
                let document = self.session.document().ok_or(Error::NothingLoaded)?;
                let value = document
                    .get(&key)
                    .ok_or(Error::UnknownField { name: key.clone() })?;
                writeln!(self.output, "{key} = {value}")?;
                Ok(())
            }
            Intent::Set(key, value) => {
                self.session.set_field(&key, &value)?;
                writeln!(self.output, "{key} = {}", value.trim())?;
                Ok(())
            }
            Intent::Save => self.save(),
            Intent::Pull => self.pull(),
            Intent::Push => self.push(),
            Intent::Apply => self.apply(),
            Intent::Profile => {
                let profile = self.ctx.active_profile()?;
                for (label, value) in describe(&profile) {
                    writeln!(self.output, "{label:<12} {value}")?;
                }
                Ok(())
            }
            Intent::Configure => self.configure(),
            Intent::Status => self.status(),
            Intent::Clear => {
                self.session.clear();
                writeln!(self.output, "Cleared.")?;
                Ok(())
            }
            Intent::Help => {
                writeln!(self.output, "{HELP}")?;
                Ok(())
            }
            Intent::Quit => Ok(()),
        }
    }

    fn load(&mut self, path: PathBuf) -> Result<()> {
        if self.session.is_dirty() {
            write!(
                self.output,
                "Do you want to save changes before loading a new file? [y/n/c] "
            )?;
            self.output.flush()?;
            let answer = self.read_line()?.unwrap_or_default().to_lowercase();
            match answer.as_str() {
                "y" | "yes" => self.save()?,
                "n" | "no" => {}
                _ => {
                    writeln!(self.output, "Load cancelled.")?;
                    return Ok(());
                }
            }
        }

        self.session.load(&path)?;
        let fields = self.session.document().map_or(0, crate::document::ConfigDocument::len);
        writeln!(self.output, "Loaded {fields} fields from {}", path.display())?;
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        match self.session.save()? {
            SaveOutcome::Saved { path, .. } => {
                writeln!(self.output, "Config file saved successfully to {}.", path.display())?;
            }
            SaveOutcome::NothingToDo => {
                writeln!(self.output, "No changes have been made to the configuration.")?;
            }
        }
        Ok(())
    }

    fn pull(&mut self) -> Result<()> {
        let profile = self.ctx.active_profile()?;
        let report = self.engine.pull(&profile, &mut self.session)?;
        writeln!(
            self.output,
            "Remote config downloaded and loaded successfully from {} ({} fields)",
            report.remote_path, report.fields
        )?;
        if report.discarded_edits {
            writeln!(self.output, "Unsaved local edits were discarded.")?;
        }
        Ok(())
    }

    fn push(&mut self) -> Result<()> {
        let profile = self.ctx.active_profile()?;
        if !profile.is_configured() {
            return Err(Error::NotConfigured);
        }
        if self.session.is_dirty() {
            if !self.ask("The local config has been modified but not saved. Save changes before pushing?")? {
                writeln!(self.output, "Push cancelled.")?;
                return Ok(());
            }
            self.save()?;
        }

        let Self {
            engine,
            session,
            input,
            output,
            ..
        } = self;
        let report = engine.push(&profile, session, |prompt| {
            ask_yes_no(input, output, prompt).unwrap_or(false)
        })?;
        writeln!(
            self.output,
            "Local config pushed to remote location at {}",
            report.remote_path
        )?;
        Ok(())
    }

    fn apply(&mut self) -> Result<()> {
        let profile = self.ctx.active_profile()?;
        let Self {
            engine,
            input,
            output,
            ..
        } = self;
        let report = engine.apply(&profile, |prompt| {
            ask_yes_no(input, output, prompt).unwrap_or(false)
        })?;
        writeln!(self.output, "Config has been applied on {}.", report.host)?;
        Ok(())
    }

    /// Prompt for each profile field, pre-filled with the stored value.
    /// An empty answer keeps the current value.
    fn configure(&mut self) -> Result<()> {
        let store = self.ctx.credential_store();
        let current = store.load_or_default()?;

        let mut prompt_field = |label: &str, shown: &str| -> io::Result<Option<String>> {
            write!(self.output, "{label} [{shown}]: ")?;
            self.output.flush()?;
            Ok(self.read_line()?.filter(|answer| !answer.is_empty()))
        };
        let host = prompt_field("Hostname or IP address", &current.host)?;
        let username = prompt_field("SSH username", &current.username)?;
        let secret = prompt_field("SSH password", if current.secret.is_empty() { "" } else { "unchanged" })?;
        let remote_path = prompt_field("Remote config file path", &current.remote_path)?;

        let mut profile = current;
        ProfileUpdate {
            host,
            username,
            secret,
            remote_path,
        }
        .apply_to(&mut profile);
        store.save(&profile)?;
        writeln!(self.output, "SSH settings saved successfully.")?;
        Ok(())
    }

    fn status(&mut self) -> Result<()> {
        let host = self.ctx.active_profile().map_or_else(
            |e| format!("(unreadable: {e})"),
            |p| if p.is_configured() { p.host } else { "(not configured)".to_string() },
        );
        writeln!(self.output, "State:   {}", self.session.state())?;
        if let (Some(path), Some(document)) = (self.session.source_path(), self.session.document()) {
            writeln!(self.output, "File:    {}", path.display())?;
            writeln!(self.output, "Fields:  {}", document.len())?;
        }
        writeln!(self.output, "Remote:  {host}")?;
        Ok(())
    }
}
