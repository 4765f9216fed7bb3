use std::time::Duration;

use async_trait::async_trait;

use crate::execution::BackendError;
use crate::params::ConnectionParams;
use crate::stream_runner::LineStream;

/// Opens authenticated remote shell sessions.
#[async_trait]
pub trait RemoteShellBackend: Send + Sync {
    type Session: RemoteSession + 'static;

    async fn connect(
        &self,
        params: &ConnectionParams,
        timeout: Duration,
    ) -> Result<Self::Session, BackendError>;
}

/// One authenticated connection, reused for every command until closed.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    type Stream: LineStream + 'static;

    async fn exec(&self, command: &str) -> Result<Self::Stream, BackendError>;
    async fn close(&self) -> Result<(), BackendError>;
}
