pub mod account;
pub mod execution;
pub mod history;
pub mod json_document;
pub mod local_shell;
pub mod notify;
pub mod params;
pub mod paths;
pub mod remote_shell;
pub mod scripts;
pub mod session;
pub mod settings;
pub mod shell_session;
pub mod sql;
pub mod sql_session;
pub mod ssh_session;
pub mod stats;
pub mod store;
pub mod stream_runner;
pub mod templates;

pub use execution::{BackendError, ExecutionEvent, ExecutionOutcome, ExecutionSummary};
pub use params::ConnectionParams;
pub use session::{ExecutionHandle, SessionError, SessionState};
pub use store::Store;
