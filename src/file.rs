//! Atomic local file writes.
//!
//! Saves and pulled-file caching go through here so that a failed write
//! never leaves a half-written config behind:
//! write to a sibling temp file, sync to disk, then rename over the target.

use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

/// Sibling path used while a write to `path` is in flight.
///
/// `config.ini` becomes `.config.ini.tmp` in the same directory, so the
/// final rename never crosses filesystems.
#[must_use]
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_else(|| path.as_os_str()));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write content to a file atomically.
///
/// If any step fails, the original file (if any) remains untouched and the
/// temp file is removed.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    write_via_temp(path, content, false)
}

/// Like [`atomic_write`], but the file is readable by its owner only
/// (mode 0600 on Unix). Used for files holding credentials.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    write_via_temp(path, content, true)
}

/// Resolve symlinks so the rename replaces the file they point at, not the
/// link itself. A path that does not exist yet is used as given.
fn resolve_target(path: &Path) -> std::io::Result<PathBuf> {
    match fs::canonicalize(path) {
        Ok(target) => Ok(target),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(path.to_path_buf()),
        Err(e) => Err(e),
    }
}

/// Mode the replacement file gets: 0600 for private files, otherwise the
/// mode of the file being replaced (if any).
fn target_permissions(target: &Path, private: bool) -> std::io::Result<Option<fs::Permissions>> {
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::PermissionsExt;
        return Ok(Some(fs::Permissions::from_mode(0o600)));
    }
    #[cfg(not(unix))]
    let _ = private;

    match fs::metadata(target) {
        Ok(meta) => Ok(Some(meta.permissions())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

fn write_via_temp(path: &Path, content: &[u8], private: bool) -> std::io::Result<()> {
    let target = resolve_target(path)?;
    let temp_path = temp_path_for(&target);

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let permissions = target_permissions(&target, private)?;

    // A temp file left by an interrupted write keeps its old mode if reopened.
    match fs::remove_file(&temp_path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let written = (|| {
        let mut opts = OpenOptions::new();
        opts.write(true).create_new(true);
        #[cfg(unix)]
        if private {
            opts.mode(0o600);
        }
        let file = opts.open(&temp_path)?;
        if let Some(permissions) = permissions {
            file.set_permissions(permissions)?;
        }
        let mut writer = BufWriter::new(file);
        writer.write_all(content)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    })();

    if let Err(e) = written.and_then(|()| fs::rename(&temp_path, &target)) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    Ok(())
}
