//! Opening saved files with the platform's default viewer.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;

use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("file not found: {path}")]
    Missing { path: PathBuf },

    #[error("failed to launch {program} for {path}: {source}")]
    Launch {
        program: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Shows a saved file to the user.
pub trait FileOpener: Send + Sync {
    /// # Errors
    ///
    /// Returns `OpenError` if no viewer could be started.
    fn open(&self, path: &Path, mime_type: &str) -> Result<(), OpenError>;
}

/// Hands files to `xdg-open`, `open` or `start` depending on the OS.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOpener;

impl SystemOpener {
    fn command(path: &Path) -> (&'static str, Command) {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(path);
            ("open", cmd)
        } else if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]).arg(path);
            ("start", cmd)
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(path);
            ("xdg-open", cmd)
        }
    }
}

impl FileOpener for SystemOpener {
    fn open(&self, path: &Path, mime_type: &str) -> Result<(), OpenError> {
        if !path.exists() {
            warn!(path = %path.display(), "cannot open missing file");
            return Err(OpenError::Missing {
                path: path.to_path_buf(),
            });
        }
        let (program, mut command) = Self::command(path);
        debug!(program, path = %path.display(), mime_type, "opening file");
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|child| {
                let _ = reap(child);
            })
            .map_err(|source| OpenError::Launch {
                program,
                path: path.to_path_buf(),
                source,
            })
    }
}

/// Waits for a launched viewer on a detached thread so it is not left as a
/// zombie.
fn reap(mut child: Child) -> thread::JoinHandle<Option<ExitStatus>> {
    thread::spawn(move || match child.wait() {
        Ok(status) => Some(status),
        Err(e) => {
            debug!(error = %e, "failed to wait for viewer");
            None
        }
    })
}
