//! Connection profile commands.

use std::io::{self, BufRead};

use super::Context;
use crate::cli::ProfileCommands;
use crate::error::{Error, Result};
use crate::profile::ConnectionProfile;

/// Execute profile commands.
///
/// # Errors
///
/// Returns an error if the profile cannot be read or written.
pub fn execute(command: &ProfileCommands, ctx: &Context) -> Result<()> {
    match command {
        ProfileCommands::Show => show(ctx),
        ProfileCommands::Set {
            host,
            user,
            password,
            password_stdin,
            remote_path,
        } => {
            let password = if *password_stdin {
                Some(read_password_line(&mut io::stdin().lock())?)
            } else {
                password.clone()
            };
            let update = ProfileUpdate {
                host: host.clone(),
                username: user.clone(),
                secret: password,
                remote_path: remote_path.clone(),
            };
            set(update, ctx)
        }
        ProfileCommands::Clear => clear(ctx),
    }
}

/// Partial profile change; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct ProfileUpdate {
    pub host: Option<String>,
    pub username: Option<String>,
    pub secret: Option<String>,
    pub remote_path: Option<String>,
}

impl ProfileUpdate {
    /// Apply onto `profile`, trimming host, user and path.
    pub fn apply_to(self, profile: &mut ConnectionProfile) {
        if let Some(host) = self.host {
            profile.host = host.trim().to_string();
        }
        if let Some(username) = self.username {
            profile.username = username.trim().to_string();
        }
        if let Some(secret) = self.secret {
            profile.secret = secret;
        }
        if let Some(remote_path) = self.remote_path {
            profile.remote_path = remote_path.trim().to_string();
        }
    }
}

fn read_password_line(input: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(Error::InvalidArgument("no password on stdin".to_string()));
    }
    Ok(password)
}

/// Human-readable profile summary with the password masked.
#[must_use]
pub fn describe(profile: &ConnectionProfile) -> Vec<(&'static str, String)> {
    let or_unset = |v: &str| {
        if v.is_empty() {
            "(not set)".to_string()
        } else {
            v.to_string()
        }
    };
    vec![
        ("Host", or_unset(&profile.host)),
        ("Username", or_unset(&profile.username)),
        (
            "Password",
            if profile.secret.is_empty() {
                "(not set)".to_string()
            } else {
                "********".to_string()
            },
        ),
        ("Remote path", or_unset(&profile.remote_path)),
    ]
}

fn show(ctx: &Context) -> Result<()> {
    let store = ctx.credential_store();
    let profile = store.load()?;

    if ctx.json {
        let output = serde_json::json!({
            "path": store.path(),
            "configured": profile.as_ref().is_some_and(ConnectionProfile::is_configured),
            "profile": profile,
            "has_password": profile.as_ref().is_some_and(|p| !p.secret.is_empty()),
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    let Some(profile) = profile else {
        println!("No connection profile saved yet.");
        println!("Use `sbc profile set` to create one.");
        return Ok(());
    };
    for (label, value) in describe(&profile) {
        println!("{label:<12} {value}");
    }
    println!("{:<12} {}", "Stored in", store.path().display());
    Ok(())
}

/// Merge `update` into the stored profile and save it.
///
/// # Errors
///
/// Returns an error if the stored profile is unreadable or the result
/// cannot be saved.
pub fn set(update: ProfileUpdate, ctx: &Context) -> Result<()> {
    let store = ctx.credential_store();
    let mut profile = store.load_or_default()?;
    update.apply_to(&mut profile);
    store.save(&profile)?;

    if ctx.json {
        println!(
            "{}",
            serde_json::json!({ "saved": true, "path": store.path(), "profile": profile })
        );
    } else {
        println!("SSH settings saved successfully.");
    }
    Ok(())
}

fn clear(ctx: &Context) -> Result<()> {
    let store = ctx.credential_store();
    store.clear()?;
    if ctx.json {
        println!("{}", serde_json::json!({ "cleared": true, "path": store.path() }));
    } else {
        println!("Connection profile removed.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_keeps_unspecified_fields() {
        let mut profile = ConnectionProfile {
            host: "old".into(),
            username: "root".into(),
            secret: "pw".into(),
            remote_path: "/c.ini".into(),
        };
        ProfileUpdate {
            host: Some(" new.local ".into()),
            ..ProfileUpdate::default()
        }
        .apply_to(&mut profile);

        assert_eq!(profile.host, "new.local");
        assert_eq!(profile.username, "root");
        assert_eq!(profile.secret, "pw");
    }

    #[test]
    fn test_read_password_line() {
        assert_eq!(read_password_line(&mut "hunter2\r\n".as_bytes()).unwrap(), "hunter2");
        assert!(read_password_line(&mut "\n".as_bytes()).is_err());
    }

    #[test]
    fn test_describe_masks_password() {
        let profile = ConnectionProfile {
            secret: "pw".into(),
            ..ConnectionProfile::default()
        };
        let lines = describe(&profile);
        assert_eq!(lines[0], ("Host", "(not set)".to_string()));
        assert_eq!(lines[2], ("Password", "********".to_string()));
    }
}
