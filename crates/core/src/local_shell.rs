use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;

use crate::execution::BackendError;
use crate::stats::StatKey;
use crate::stream_runner::LineStream;

/// Which interpreter a local command or script runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellKind {
    Sh,
    Cmd,
    PowerShell,
}

impl ShellKind {
    /// `cmd` on Windows, `sh` everywhere else.
    #[must_use]
    pub fn host_default() -> Self {
        if cfg!(target_os = "windows") {
            Self::Cmd
        } else {
            Self::Sh
        }
    }

    #[must_use]
    pub fn program(self) -> &'static str {
        match self {
            Self::Sh => "sh",
            Self::Cmd => "cmd",
            Self::PowerShell => "powershell",
        }
    }

    #[must_use]
    pub fn args(self, command: &str) -> Vec<String> {
        let mut args: Vec<String> = match self {
            Self::Sh => vec!["-c".into()],
            Self::Cmd => vec!["/C".into()],
            Self::PowerShell => vec![
                "-NoProfile".into(),
                "-NonInteractive".into(),
                "-Command".into(),
            ],
        };
        args.push(command.to_string());
        args
    }

    #[must_use]
    pub fn script_extension(self) -> &'static str {
        match self {
            Self::Sh => "sh",
            Self::Cmd => "bat",
            Self::PowerShell => "ps1",
        }
    }

    /// Counter bumped when a script of this kind is saved.
    #[must_use]
    pub fn script_counter(self) -> Option<StatKey> {
        match self {
            Self::Sh => None,
            Self::Cmd => Some(StatKey::CmdScriptCount),
            Self::PowerShell => Some(StatKey::Ps1ScriptCount),
        }
    }
}

impl fmt::Display for ShellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sh => "sh",
            Self::Cmd => "cmd",
            Self::PowerShell => "powershell",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown shell `{0}` (expected sh, cmd or powershell)")]
pub struct UnknownShell(pub String);

impl FromStr for ShellKind {
    type Err = UnknownShell;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "sh" => Ok(Self::Sh),
            "cmd" | "bat" => Ok(Self::Cmd),
            "powershell" | "ps1" | "pwsh" => Ok(Self::PowerShell),
            _ => Err(UnknownShell(raw.to_string())),
        }
    }
}

#[async_trait]
pub trait ShellBackend: Send + Sync {
    type Stream: LineStream + 'static;

    async fn spawn(&self, shell: ShellKind, command: &str) -> Result<Self::Stream, BackendError>;
}
