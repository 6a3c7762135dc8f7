//! Window focus through the platform's automation tool.
//!
//! | Backend       | Platform | Activate                        | Frontmost handle        |
//! |---------------|----------|---------------------------------|-------------------------|
//! | `AppleScript` | macOS    | `tell application … to activate`| frontmost process name  |
//! | `Xdotool`     | X11      | `search --class … windowactivate` | active window id      |
//! | `Wmctrl`      | X11      | `wmctrl -x -a <class>`          | none                    |
//! | `None`        | other    | no-op                           | none                    |
//!
//! The backend is picked once at startup; callers never branch on platform.

use std::process::{Command, Stdio};

use super::InjectError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusBackend {
    AppleScript,
    Xdotool,
    Wmctrl,
    None,
}

impl FocusBackend {
    /// Pick the first automation tool available on this machine.
    pub fn detect() -> Self {
        let backend = if cfg!(target_os = "macos") && which::which("osascript").is_ok() {
            Self::AppleScript
        } else if cfg!(target_os = "linux") && which::which("xdotool").is_ok() {
            Self::Xdotool
        } else if cfg!(target_os = "linux") && which::which("wmctrl").is_ok() {
            Self::Wmctrl
        } else {
            Self::None
        };
        log::info!("inject: focus backend {backend:?}");
        backend
    }

    /// Opaque handle of the frontmost window, for [`FocusBackend::restore`].
    pub fn frontmost(self) -> Option<String> {
        let out = match self {
            Self::AppleScript => run(
                "osascript",
                &[
                    "-e",
                    "tell application \"System Events\" to get name of first application process whose frontmost is true",
                ],
            ),
            Self::Xdotool => run("xdotool", &["getactivewindow"]),
            Self::Wmctrl | Self::None => return None,
        };
        out.ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
    }

    /// Bring the application with window class / name `app` to the front.
    pub fn activate(self, app: &str, class: &str) -> Result<(), InjectError> {
        let result = match self {
            Self::AppleScript => run(
                "osascript",
                &["-e", &format!("tell application \"{}\" to activate", applescript_escape(app))],
            ),
            Self::Xdotool => run(
                "xdotool",
                &["search", "--onlyvisible", "--class", class, "windowactivate", "--sync"],
            ),
            Self::Wmctrl => run("wmctrl", &["-x", "-a", class]),
            Self::None => return Ok(()),
        };
        result.map(drop).map_err(InjectError::Focus)
    }

    /// Re-focus a handle returned by [`FocusBackend::frontmost`].
    pub fn restore(self, handle: &str) -> Result<(), InjectError> {
        match self {
            Self::AppleScript => self.activate(handle, handle),
            Self::Xdotool => run("xdotool", &["windowactivate", handle])
                .map(drop)
                .map_err(InjectError::Focus),
            Self::Wmctrl | Self::None => Ok(()),
        }
    }
}

fn applescript_escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Run `program`, returning stdout, or stderr as the error.
fn run(program: &str, args: &[&str]) -> Result<String, String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| format!("failed to spawn {program}: {e}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(format!("{program} exited with {}: {}", output.status, stderr.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_backend_is_a_no_op() {
        assert!(FocusBackend::None.activate("Cursor", "cursor").is_ok());
        assert!(FocusBackend::None.restore("anything").is_ok());
        assert_eq!(FocusBackend::None.frontmost(), None);
    }

    #[test]
    fn applescript_names_are_escaped() {
        assert_eq!(applescript_escape(r#"My "App""#), r#"My \"App\""#);
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = run("voice-relay-no-such-program", &[]).unwrap_err();
        assert!(err.contains("failed to spawn"));
    }
}
