//! Injection target resolution.
//!
//! A target is an editor or terminal that is demonstrably running the
//! assistant: some descendant of the application's process has a command
//! line matching the AI process pattern.  Resolution is stateless and
//! re-run for every message.
//!
//! | Strategy    | Candidate | AI descendant            |
//! |-------------|-----------|--------------------------|
//! | `extension` | IDE       | without a terminal (extension host) |
//! | `cli`       | IDE       | on a terminal (integrated terminal) |
//! | `terminal`  | terminal  | any                      |
//!
//! `auto` tries the three in that order; the first hit wins.

use regex::Regex;
use thiserror::Error;

use super::process::{ProcessInfo, ProcessTable};
use crate::config::{InjectionMode, SessionSnapshot};

// ---------------------------------------------------------------------------
// Known applications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCategory {
    Ide,
    Terminal,
}

/// An application text can be injected into.
#[derive(Debug, PartialEq, Eq)]
pub struct KnownApp {
    /// Display name; also the name used to focus the app and to select it as
    /// an override.
    pub name: &'static str,
    pub category: AppCategory,
    /// Lowercased executable names (Linux / Windows).
    pub executables: &'static [&'static str],
    /// macOS bundle names, matched as `<bundle>.app/` in the command line.
    pub bundles: &'static [&'static str],
}

const fn ide(name: &'static str, executables: &'static [&'static str], bundles: &'static [&'static str]) -> KnownApp {
    KnownApp {
        name,
        category: AppCategory::Ide,
        executables,
        bundles,
    }
}

const fn term(name: &'static str, executables: &'static [&'static str], bundles: &'static [&'static str]) -> KnownApp {
    KnownApp {
        name,
        category: AppCategory::Terminal,
        executables,
        bundles,
    }
}

pub static KNOWN_APPS: &[KnownApp] = &[
    ide("Visual Studio Code", &["code", "code-insiders"], &["Visual Studio Code", "Visual Studio Code - Insiders"]),
    ide("Cursor", &["cursor"], &["Cursor"]),
    ide("Windsurf", &["windsurf"], &["Windsurf"]),
    ide("Zed", &["zed", "zed-editor"], &["Zed"]),
    ide("IntelliJ IDEA", &["idea", "idea64"], &["IntelliJ IDEA", "IntelliJ IDEA CE"]),
    ide("PyCharm", &["pycharm", "pycharm64"], &["PyCharm", "PyCharm CE"]),
    ide("WebStorm", &["webstorm", "webstorm64"], &["WebStorm"]),
    ide("PhpStorm", &["phpstorm", "phpstorm64"], &["PhpStorm"]),
    ide("GoLand", &["goland", "goland64"], &["GoLand"]),
    ide("RubyMine", &["rubymine", "rubymine64"], &["RubyMine"]),
    ide("CLion", &["clion", "clion64"], &["CLion"]),
    ide("Rider", &["rider", "rider64"], &["Rider"]),
    ide("DataGrip", &["datagrip", "datagrip64"], &["DataGrip"]),
    ide("Android Studio", &["studio", "studio64"], &["Android Studio"]),
    term("Terminal", &[], &["Terminal"]),
    term("iTerm2", &[], &["iTerm", "iTerm2"]),
    term("Warp", &["warp", "warp-terminal"], &["Warp"]),
    term("Alacritty", &["alacritty"], &["Alacritty"]),
    term("kitty", &["kitty"], &["kitty"]),
    term("gnome-terminal", &["gnome-terminal", "gnome-terminal-server"], &[]),
    term("konsole", &["konsole"], &[]),
    term("xfce4-terminal", &["xfce4-terminal"], &[]),
    term("xterm", &["xterm"], &[]),
];

impl KnownApp {
    /// Look up an application by display name, case-insensitively.
    pub fn find(name: &str) -> Option<&'static KnownApp> {
        let name = name.trim();
        KNOWN_APPS.iter().find(|app| app.name.eq_ignore_ascii_case(name))
    }

    /// X11 window class used to focus the app.
    pub fn window_class(&self) -> &'static str {
        self.executables.first().copied().unwrap_or(self.name)
    }

    /// The known application `process` is an instance of, if any.
    pub fn of_process(process: &ProcessInfo) -> Option<&'static KnownApp> {
        let exe = process.exe_name();
        let args = process.args.to_lowercase();
        KNOWN_APPS.iter().find(|app| {
            app.executables.contains(&exe.as_str())
                || app
                    .bundles
                    .iter()
                    .any(|b| args.contains(&format!("/{}.app/", b.to_lowercase())))
        })
    }
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

/// A running instance of a known application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub app: &'static KnownApp,
    pub pid: u32,
}

/// The outermost process of every running known application, by pid.
pub fn discover_candidates(table: &ProcessTable) -> Vec<Candidate> {
    table
        .processes()
        .into_iter()
        .filter_map(|p| {
            let app = KnownApp::of_process(p)?;
            let nested = table
                .parent(p.pid)
                .and_then(KnownApp::of_process)
                .is_some_and(|parent| std::ptr::eq(parent, app));
            (!nested).then_some(Candidate { app, pid: p.pid })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Extension,
    Cli,
    Terminal,
}

impl Strategy {
    fn category(self) -> AppCategory {
        match self {
            Strategy::Extension | Strategy::Cli => AppCategory::Ide,
            Strategy::Terminal => AppCategory::Terminal,
        }
    }

    fn accepts(self, ai: &ProcessInfo) -> bool {
        match self {
            Strategy::Extension => ai.tty.is_none(),
            Strategy::Cli => ai.tty.is_some(),
            Strategy::Terminal => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectionTarget {
    pub app: &'static KnownApp,
    /// Application process; `None` for an override that is not running.
    pub pid: Option<u32>,
    /// The assistant process found under the application.
    pub ai_pid: Option<u32>,
    pub strategy: Strategy,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no editor or terminal running the assistant was found")]
    NoTargetFound,

    #[error("unknown target application {0:?}")]
    UnknownOverride(String),
}

/// Pick the injection target.
pub fn resolve(
    mode: InjectionMode,
    target_override: Option<&'static KnownApp>,
    candidates: &[Candidate],
    table: &ProcessTable,
    ai_process: &Regex,
) -> Result<InjectionTarget, ResolveError> {
    if let Some(app) = target_override {
        let strategy = match (app.category, mode) {
            (AppCategory::Terminal, _) => Strategy::Terminal,
            (AppCategory::Ide, InjectionMode::Cli | InjectionMode::Terminal) => Strategy::Cli,
            (AppCategory::Ide, _) => Strategy::Extension,
        };
        let pid = candidates.iter().find(|c| std::ptr::eq(c.app, app)).map(|c| c.pid);
        return Ok(InjectionTarget {
            app,
            pid,
            ai_pid: None,
            strategy,
        });
    }

    let order: &[Strategy] = match mode {
        InjectionMode::Auto => &[Strategy::Extension, Strategy::Cli, Strategy::Terminal],
        InjectionMode::Extension => &[Strategy::Extension],
        InjectionMode::Cli => &[Strategy::Cli],
        InjectionMode::Terminal => &[Strategy::Terminal],
    };

    for &strategy in order {
        for candidate in candidates.iter().filter(|c| c.app.category == strategy.category()) {
            let hit = table
                .descendants(candidate.pid)
                .into_iter()
                .find(|p| strategy.accepts(p) && ai_process.is_match(&p.args));
            if let Some(ai) = hit {
                log::debug!(
                    "resolver: {:?} via {} (pid {}, assistant pid {})",
                    strategy,
                    candidate.app.name,
                    candidate.pid,
                    ai.pid
                );
                return Ok(InjectionTarget {
                    app: candidate.app,
                    pid: Some(candidate.pid),
                    ai_pid: Some(ai.pid),
                    strategy,
                });
            }
        }
    }
    Err(ResolveError::NoTargetFound)
}

/// [`resolve`] with the session's mode, override and pattern.
#[derive(Debug, Clone)]
pub struct TargetResolver {
    mode: InjectionMode,
    target_override: Option<&'static KnownApp>,
    ai_process: Regex,
}

impl TargetResolver {
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        Self {
            mode: snapshot.injection.mode,
            target_override: snapshot.target_override,
            ai_process: snapshot.ai_process.clone(),
        }
    }

    pub fn resolve(&self, table: &ProcessTable) -> Result<InjectionTarget, ResolveError> {
        let candidates = discover_candidates(table);
        resolve(self.mode, self.target_override, &candidates, table, &self.ai_process)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
