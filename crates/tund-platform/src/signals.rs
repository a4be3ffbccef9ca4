//! OS termination signals.

use std::io;

use tokio::signal::unix::{SignalKind, signal};

use tund_core::Signal;

/// SIGINT and SIGTERM, registered up front.
///
/// SIGKILL cannot be caught, so SIGTERM stands in for it.
#[derive(Debug)]
pub struct SignalSource {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

impl SignalSource {
    /// Installs the handlers. Must be called from within a Tokio runtime.
    pub fn register() -> io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Waits for the next termination signal.
    ///
    /// If both streams end the future never resolves; the other
    /// termination sources still apply.
    pub async fn recv(mut self) -> Signal {
        tokio::select! {
            Some(()) = self.interrupt.recv() => Signal::Int,
            Some(()) = self.terminate.recv() => Signal::Term,
            else => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_register() {
        assert!(SignalSource::register().is_ok());
    }

    #[tokio::test]
    async fn test_recv_pending_without_signal() {
        let source = SignalSource::register().unwrap();
        let result = tokio::time::timeout(Duration::from_millis(50), source.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_recv_sigterm() {
        let source = SignalSource::register().unwrap();
        nix::sys::signal::raise(nix::sys::signal::Signal::SIGTERM).unwrap();
        let sig = tokio::time::timeout(Duration::from_secs(1), source.recv())
            .await
            .expect("signal should arrive");
        assert_eq!(sig, Signal::Term);
    }
}
