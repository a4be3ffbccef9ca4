//! Linux collaborator bundle.

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UnixStream;

use tund_core::{LogLevel, StartupArgs, TunnelBackend, TunnelConfig};

use crate::daemon::Daemonizer;
use crate::device::TunnelDevice;
use crate::tun::{TunDevice, validate_name};
use crate::uapi::{self, UapiListener};

/// Kernel TUN interface, `/dev/null`-detached re-exec and a UAPI socket
/// directory.
#[derive(Debug, Clone)]
pub struct LinuxBackend {
    config: TunnelConfig,
    daemonizer: Option<Daemonizer>,
}

impl LinuxBackend {
    /// Creates a backend that re-executes the running binary.
    ///
    /// The executable is only located when daemonizing.
    #[must_use]
    pub fn new(config: &TunnelConfig) -> Self {
        Self {
            config: config.clone(),
            daemonizer: None,
        }
    }

    /// Creates a backend with an explicit daemonizer.
    #[must_use]
    pub fn with_daemonizer(config: &TunnelConfig, daemonizer: Daemonizer) -> Self {
        Self {
            config: config.clone(),
            daemonizer: Some(daemonizer),
        }
    }

    /// Returns the UAPI socket directory.
    #[must_use]
    pub fn socket_dir(&self) -> &Path {
        &self.config.socket_dir
    }
}

#[async_trait]
impl TunnelBackend for LinuxBackend {
    type Tun = TunDevice;
    type Device = TunnelDevice;
    type Listener = UapiListener;

    fn daemonize(&self, args: &StartupArgs) -> io::Result<()> {
        match &self.daemonizer {
            Some(daemonizer) => daemonizer.spawn(args)?,
            None => Daemonizer::current()?.spawn(args)?,
        };
        Ok(())
    }

    fn create_tun(&self, interface: &str) -> io::Result<TunDevice> {
        Ok(TunDevice::create(interface)?)
    }

    fn new_device(&self, tun: TunDevice, level: LogLevel) -> Arc<TunnelDevice> {
        TunnelDevice::start(tun, level)
    }

    fn listen(&self, interface: &str) -> io::Result<UapiListener> {
        validate_name(interface)?;
        Ok(UapiListener::bind(self.config.socket_path(interface))?)
    }

    async fn handle_connection(
        &self,
        device: Arc<TunnelDevice>,
        conn: UnixStream,
    ) -> io::Result<()> {
        uapi::handle_connection(&device, conn).await
    }
}
