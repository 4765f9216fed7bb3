mod cli;
mod commands;
mod logging;

use std::sync::Arc;

use clap::Parser;
use opsdesk_core::json_document::LoadStatus;
use opsdesk_core::notify::{LogNotifier, Notifier};
use opsdesk_core::paths::{default_config_dir, log_dir};
use opsdesk_core::store::{LoadReport, Store};
use tracing::{info, warn};

use crate::cli::Cli;

fn log_load_reports(reports: &[LoadReport]) {
    for report in reports {
        match &report.status {
            LoadStatus::Loaded => {}
            LoadStatus::Created => {
                info!(
                    document = %report.kind,
                    path = %report.path.display(),
                    "created with defaults"
                );
            }
            LoadStatus::Reset { reason } => {
                warn!(
                    document = %report.kind,
                    path = %report.path.display(),
                    %reason,
                    "document was unreadable and has been reset to defaults"
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => default_config_dir()?,
    };

    let (store, reports) = Store::open(config_dir.clone());
    let _logging = logging::init_logging(&log_dir(&config_dir), store.settings().log_level());
    log_load_reports(&reports);

    let store = Arc::new(store);
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    commands::run(cli.command, &store, &notifier).await
}
