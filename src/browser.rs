//! Opening the mirror entry file in the system browser

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Hands `path` to the platform's default opener
///
/// The opener is started and not waited on beyond its own exit; a missing
/// opener or a non-zero exit is returned as an error.
pub fn open_in_browser(path: &Path) -> io::Result<()> {
    if !path.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("entry file not found: {}", path.display()),
        ));
    }

    let status = opener_command(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()?;

    if status.success() {
        tracing::info!("Opened {} in browser", path.display());
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::Other,
            format!("browser launcher exited with {}", status),
        ))
    }
}

#[cfg(target_os = "macos")]
fn opener_command(path: &Path) -> Command {
    let mut cmd = Command::new("open");
    cmd.arg(path);
    cmd
}

#[cfg(target_os = "windows")]
fn opener_command(path: &Path) -> Command {
    let mut cmd = Command::new("cmd");
    // Empty title argument so a quoted path is not taken as the window title
    cmd.args(["/C", "start", ""]).arg(path);
    cmd
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn opener_command(path: &Path) -> Command {
    let mut cmd = Command::new("xdg-open");
    cmd.arg(path);
    cmd
}
