use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use opsdesk_core::history::HistoryKind;
use opsdesk_core::local_shell::ShellKind;
use opsdesk_core::params::{ConnectionParams, DEFAULT_MYSQL_PORT, DEFAULT_SSH_PORT};
use opsdesk_core::paths::CONFIG_DIR_ENV;
use opsdesk_core::templates::TemplatePanel;

/// Run SQL, SSH and local shell commands with shared history and usage stats.
#[derive(Parser, Debug)]
#[command(name = "opsdesk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Directory holding config, stats and history documents
    #[arg(long, global = true, env = CONFIG_DIR_ENV)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Execute one SQL statement
    Sql {
        #[command(flatten)]
        connection: DbConnectionArgs,
        /// Statement to execute
        statement: String,
    },

    /// Check that a database connection can be opened
    SqlTest {
        #[command(flatten)]
        connection: DbConnectionArgs,
    },

    /// Run commands on a remote host over one SSH connection
    Ssh {
        #[command(flatten)]
        connection: SshConnectionArgs,
        /// Commands to run, in order
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Run a local command, streaming its output
    Shell {
        /// Interpreter: sh, cmd or powershell
        #[arg(long, default_value_t = ShellKind::host_default())]
        shell: ShellKind,
        /// Command line to run
        command: String,
    },

    /// Script files
    Script(ScriptCommand),

    /// Preset commands for a panel
    Templates {
        panel: TemplateTarget,
        /// Print only this template (numbered from 1)
        number: Option<usize>,
    },

    /// Command history
    History(HistoryCommand),

    /// Usage statistics
    Stats(StatsCommand),

    /// Application settings
    Config(ConfigCommand),

    /// Check administrator credentials
    Login {
        #[arg(short, long)]
        user: String,
        #[arg(short, long, env = "OPSDESK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Change the administrator password
    Passwd {
        #[arg(short, long)]
        user: String,
        #[arg(long)]
        current: String,
        #[arg(long)]
        new: String,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DbConnectionArgs {
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
    #[arg(long, default_value_t = DEFAULT_MYSQL_PORT)]
    pub port: u16,
    #[arg(short, long)]
    pub user: String,
    #[arg(long, env = "OPSDESK_DB_PASSWORD", hide_env_values = true, default_value = "")]
    pub password: String,
    #[arg(short, long)]
    pub database: Option<String>,
}

impl DbConnectionArgs {
    #[must_use]
    pub fn params(&self) -> ConnectionParams {
        ConnectionParams::new(self.host.clone(), self.port, self.user.clone())
            .with_secret(self.password.clone())
            .with_database(self.database.clone().unwrap_or_default())
    }
}

#[derive(Args, Debug, Clone)]
pub struct SshConnectionArgs {
    #[arg(long)]
    pub host: String,
    #[arg(long, default_value_t = DEFAULT_SSH_PORT)]
    pub port: u16,
    #[arg(short, long)]
    pub user: String,
    #[arg(long, env = "OPSDESK_SSH_PASSWORD", hide_env_values = true, default_value = "")]
    pub password: String,
}

impl SshConnectionArgs {
    #[must_use]
    pub fn params(&self) -> ConnectionParams {
        ConnectionParams::new(self.host.clone(), self.port, self.user.clone())
            .with_secret(self.password.clone())
    }
}

#[derive(Args, Debug)]
pub struct ScriptCommand {
    #[command(subcommand)]
    pub action: ScriptAction,
}

#[derive(Subcommand, Debug)]
pub enum ScriptAction {
    /// Save a script; the shell's extension is appended when missing
    Save {
        #[arg(long, default_value_t = ShellKind::host_default())]
        shell: ShellKind,
        /// Destination path
        #[arg(short, long)]
        output: PathBuf,
        /// Read script content from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HistoryTarget {
    Sql,
    Ssh,
}

impl From<HistoryTarget> for HistoryKind {
    fn from(target: HistoryTarget) -> Self {
        match target {
            HistoryTarget::Sql => Self::Sql,
            HistoryTarget::Ssh => Self::Ssh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TemplateTarget {
    Sql,
    Ssh,
    Cmd,
}

impl From<TemplateTarget> for TemplatePanel {
    fn from(target: TemplateTarget) -> Self {
        match target {
            TemplateTarget::Sql => Self::Sql,
            TemplateTarget::Ssh => Self::Ssh,
            TemplateTarget::Cmd => Self::Cmd,
        }
    }
}

#[derive(Args, Debug)]
pub struct HistoryCommand {
    #[command(subcommand)]
    pub action: HistoryAction,
}

#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// List recorded commands, newest first
    Show { target: HistoryTarget },
    /// Forget every recorded command
    Clear { target: HistoryTarget },
}

#[derive(Args, Debug)]
pub struct StatsCommand {
    #[command(subcommand)]
    pub action: StatsAction,
}

#[derive(Subcommand, Debug)]
pub enum StatsAction {
    /// Print every counter
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
    /// Reset every counter to zero
    Reset,
}

#[derive(Args, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print one setting
    Get { key: String },
    /// Change one setting; the value is parsed as JSON, else taken as text
    Set { key: String, value: String },
    /// Print every setting
    List,
}
