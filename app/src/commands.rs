use std::error::Error;
use std::io::Read;
use std::sync::Arc;

use opsdesk_adapters::mysql::MysqlSqlBackend;
use opsdesk_adapters::process::TokioShellBackend;
use opsdesk_adapters::ssh::RusshRemoteShellBackend;
use opsdesk_core::account::{Authenticator, FileAccountStore};
use opsdesk_core::execution::{ExecutionEvent, ExecutionOutcome, ExecutionSummary};
use opsdesk_core::history::HistoryKind;
use opsdesk_core::notify::Notifier;
use opsdesk_core::params::ConnectionParams;
use opsdesk_core::session::ExecutionHandle;
use opsdesk_core::settings::SettingKey;
use opsdesk_core::shell_session::LocalShellSession;
use opsdesk_core::sql_session::SqlSession;
use opsdesk_core::ssh_session::RemoteShellSession;
use opsdesk_core::store::Store;
use opsdesk_core::templates::TemplatePanel;
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::{
    Commands, ConfigAction, ConfigCommand, HistoryAction, HistoryCommand, ScriptAction,
    ScriptCommand, StatsAction, StatsCommand,
};

pub type CommandResult = Result<(), Box<dyn Error>>;

pub async fn run(
    command: Commands,
    store: &Arc<Store>,
    notifier: &Arc<dyn Notifier>,
) -> CommandResult {
    match command {
        Commands::Sql {
            connection,
            statement,
        } => {
            let session =
                SqlSession::new(MysqlSqlBackend, Arc::clone(store), Arc::clone(notifier));
            let handle = session.execute(&connection.params(), &statement)?;
            let (outcome, _) = follow(handle).await;
            print_outcome(outcome)
        }
        Commands::SqlTest { connection } => {
            let session =
                SqlSession::new(MysqlSqlBackend, Arc::clone(store), Arc::clone(notifier));
            let outcome = session.test_connection(&connection.params()).await?;
            print_outcome(outcome)
        }
        Commands::Ssh {
            connection,
            commands,
        } => {
            let session = RemoteShellSession::new(
                RusshRemoteShellBackend,
                Arc::clone(store),
                Arc::clone(notifier),
            );
            run_ssh(&session, &connection.params(), &commands).await
        }
        Commands::Shell { shell, command } => {
            let session =
                LocalShellSession::new(TokioShellBackend, Arc::clone(store), Arc::clone(notifier));
            let (outcome, _) = follow(session.execute(shell, &command)?).await;
            status_only(outcome)
        }
        Commands::Script(script) => save_script(script, store, notifier),
        Commands::Templates { panel, number } => show_templates(panel.into(), number),
        Commands::History(history) => run_history(history, store),
        Commands::Stats(stats) => run_stats(stats, store),
        Commands::Config(config) => run_config(config, store),
        Commands::Login { user, password } => {
            let (accounts, _) = FileAccountStore::open(store.dir());
            if accounts.login(&user, &password) {
                info!(username = %user, "login succeeded");
                println!("login succeeded");
                Ok(())
            } else {
                Err("username or password is incorrect".into())
            }
        }
        Commands::Passwd { user, current, new } => {
            let (accounts, _) = FileAccountStore::open(store.dir());
            accounts.change_password(&user, &current, &new)?;
            println!("password changed");
            Ok(())
        }
    }
}

/// Prints streamed lines to stdout until the terminal event. The first
/// Ctrl-C stops the execution; the handle then only yields its result.
async fn follow(mut handle: ExecutionHandle) -> (ExecutionOutcome, ExecutionSummary) {
    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(ExecutionEvent::Line(line)) => println!("{line}"),
                Some(ExecutionEvent::Finished { outcome, summary }) => return (outcome, summary),
                None => {
                    return (
                        ExecutionOutcome::failed("execution ended without a result"),
                        ExecutionSummary::default(),
                    );
                }
            },
            interrupted = tokio::signal::ctrl_c(), if !handle.is_stopped() => {
                if let Err(error) = interrupted {
                    warn!(%error, "failed to listen for ctrl-c");
                }
                eprintln!("stopping...");
                handle.stop();
            }
        }
    }
}

fn print_outcome(outcome: ExecutionOutcome) -> CommandResult {
    match outcome {
        ExecutionOutcome::Completed { output, .. } => {
            println!("{output}");
            Ok(())
        }
        ExecutionOutcome::Failed { reason } => Err(reason.into()),
    }
}

/// For streamed executions the output has already been printed.
fn status_only(outcome: ExecutionOutcome) -> CommandResult {
    match outcome {
        ExecutionOutcome::Completed { output, .. } => {
            eprintln!("{output}");
            Ok(())
        }
        ExecutionOutcome::Failed { reason } => Err(reason.into()),
    }
}

async fn run_ssh(
    session: &RemoteShellSession<RusshRemoteShellBackend>,
    params: &ConnectionParams,
    commands: &[String],
) -> CommandResult {
    let connected = session.connect(params).await?;
    if let ExecutionOutcome::Failed { reason } = connected {
        return Err(reason.into());
    }
    eprintln!("{}", connected.message());

    let mut result = Ok(());
    for command in commands {
        eprintln!("$ {command}");
        let handle = match session.execute(command) {
            Ok(handle) => handle,
            Err(error) => {
                result = Err(error.into());
                break;
            }
        };
        let (outcome, summary) = follow(handle).await;
        if let Err(error) = status_only(outcome) {
            result = Err(error);
            break;
        }
        if summary.was_stopped {
            break;
        }
    }

    session.close().await;
    result
}

fn save_script(
    script: ScriptCommand,
    store: &Arc<Store>,
    notifier: &Arc<dyn Notifier>,
) -> CommandResult {
    let ScriptAction::Save {
        shell,
        output,
        input,
    } = script.action;

    let content = match input {
        Some(path) => std::fs::read_to_string(&path)
            .map_err(|error| format!("failed to read {}: {error}", path.display()))?,
        None => {
            let mut content = String::new();
            std::io::stdin().read_to_string(&mut content)?;
            content
        }
    };

    let session =
        LocalShellSession::new(TokioShellBackend, Arc::clone(store), Arc::clone(notifier));
    let written = session.save_script(shell, &output, &content)?;
    println!("saved {}", written.display());
    Ok(())
}

fn show_templates(panel: TemplatePanel, number: Option<usize>) -> CommandResult {
    let Some(number) = number else {
        for (index, template) in panel.templates().iter().enumerate() {
            println!("{:>3}  {template}", index + 1);
        }
        return Ok(());
    };
    let template = panel.template(number).ok_or_else(|| {
        format!(
            "{panel} has {} templates, no #{number}",
            panel.templates().len()
        )
    })?;
    println!("{template}");
    Ok(())
}

fn run_history(history: HistoryCommand, store: &Store) -> CommandResult {
    match history.action {
        HistoryAction::Show { target } => {
            let commands = store.history(HistoryKind::from(target));
            for (index, command) in commands.recent().enumerate() {
                println!("{:>3}  {command}", index + 1);
            }
            Ok(())
        }
        HistoryAction::Clear { target } => {
            store.clear_history(HistoryKind::from(target))?;
            println!("{} history cleared", HistoryKind::from(target));
            Ok(())
        }
    }
}

fn run_stats(stats: StatsCommand, store: &Store) -> CommandResult {
    match stats.action {
        StatsAction::Show { json } => {
            let snapshot = store.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
                return Ok(());
            }
            for (key, value) in snapshot.entries() {
                println!("{:<18} {value}", key.as_str());
            }
            println!("{:<18} {}", "script_total", snapshot.script_total());
            println!("{:<18} {}", "last_update", snapshot.last_update);
            Ok(())
        }
        StatsAction::Reset => {
            store.reset_stats()?;
            println!("statistics reset");
            Ok(())
        }
    }
}

fn run_config(config: ConfigCommand, store: &Store) -> CommandResult {
    match config.action {
        ConfigAction::Get { key } => {
            let key = key.parse::<SettingKey>()?;
            println!("{}", store.setting(key));
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            let key = key.parse::<SettingKey>()?;
            store.set_setting(key, parse_setting_value(&value))?;
            println!("{key} = {}", store.setting(key));
            Ok(())
        }
        ConfigAction::List => {
            for (key, value) in store.settings().entries() {
                println!("{:<15} {value}", key.as_str());
            }
            Ok(())
        }
    }
}

/// `14` and `true` become numbers and flags; anything that is not JSON is
/// taken as text, so `dark` needs no quoting.
fn parse_setting_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
