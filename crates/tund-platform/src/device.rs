//! Runtime device.
//!
//! Owns the interface's log sink, a settings table driven over UAPI and the
//! receive counters fed by the TUN reader task. The device shuts down once:
//! either [`TunnelDevice::close`] is called or the TUN descriptor fails.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::unix::AsyncFd;
use tokio::sync::watch;

use tund_core::{DeviceLog, LevelLog, LogLevel, RuntimeDevice};

use crate::tun::TunDevice;

/// Largest packet the reader accepts.
const MAX_PACKET: usize = 65_535;

/// Keys reported by the device itself; UAPI cannot set them.
const READ_ONLY_KEYS: [&str; 2] = ["rx_packets", "rx_bytes"];

/// Rejected `set` request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingError {
    /// Key is empty.
    #[error("empty key")]
    EmptyKey,
    /// Key is reported by the device and cannot be written.
    #[error("key '{0}' is read-only")]
    ReadOnly(String),
}

/// The live tunnel device.
#[derive(Debug)]
pub struct TunnelDevice {
    log: LevelLog,
    closed: watch::Sender<bool>,
    rx_packets: AtomicU64,
    rx_bytes: AtomicU64,
    settings: Mutex<BTreeMap<String, String>>,
}

impl TunnelDevice {
    /// Creates a device with no TUN reader attached.
    #[must_use]
    pub fn new(interface: impl Into<String>, level: LogLevel) -> Arc<Self> {
        let (closed, _) = watch::channel(false);
        Arc::new(Self {
            log: LevelLog::new(interface, level),
            closed,
            rx_packets: AtomicU64::new(0),
            rx_bytes: AtomicU64::new(0),
            settings: Mutex::new(BTreeMap::new()),
        })
    }

    /// Creates a device and starts reading from `tun`.
    ///
    /// If the descriptor cannot be registered with the runtime the device
    /// comes up already closed.
    #[must_use]
    pub fn start(tun: TunDevice, level: LogLevel) -> Arc<Self> {
        let device = Self::new(tun.name(), level);
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                device.log.error(&format!("no runtime for tun reader: {e}"));
                device.close();
                return device;
            }
        };
        let fd = {
            let _enter = runtime.enter();
            AsyncFd::new(tun)
        };
        match fd {
            Ok(fd) => {
                runtime.spawn(read_loop(Arc::clone(&device), fd));
            }
            Err(e) => {
                device.log.error(&format!("Failed to poll tun device: {e}"));
                device.close();
            }
        }
        device
    }

    /// Returns the interface name.
    #[must_use]
    pub fn interface(&self) -> &str {
        self.log.interface()
    }

    /// Shuts the device down. Idempotent.
    pub fn close(&self) {
        if !self.closed.send_replace(true) {
            self.log.info("Device closed");
        }
    }

    /// Returns true once the device has shut down.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Packets read from the TUN interface.
    #[must_use]
    pub fn rx_packets(&self) -> u64 {
        self.rx_packets.load(Ordering::Relaxed)
    }

    /// Bytes read from the TUN interface.
    #[must_use]
    pub fn rx_bytes(&self) -> u64 {
        self.rx_bytes.load(Ordering::Relaxed)
    }

    /// Records one received packet of `len` bytes.
    pub fn record_rx(&self, len: usize) {
        self.rx_packets.fetch_add(1, Ordering::Relaxed);
        self.rx_bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    /// Stores a setting.
    pub fn set(&self, key: &str, value: &str) -> Result<(), SettingError> {
        if key.is_empty() {
            return Err(SettingError::EmptyKey);
        }
        if READ_ONLY_KEYS.contains(&key) {
            return Err(SettingError::ReadOnly(key.to_string()));
        }
        self.settings.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Returns stored settings followed by the receive counters.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .settings
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.push(("rx_packets".to_string(), self.rx_packets().to_string()));
        out.push(("rx_bytes".to_string(), self.rx_bytes().to_string()));
        out
    }
}

#[async_trait]
impl RuntimeDevice for TunnelDevice {
    type Log = LevelLog;

    fn log(&self) -> &LevelLog {
        &self.log
    }

    async fn terminated(&self) {
        // The sender is owned by `self`, so the only way out is `true`.
        wait_closed(&mut self.closed.subscribe()).await;
    }
}

async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|c| *c).await;
}

async fn read_loop(device: Arc<TunnelDevice>, fd: AsyncFd<TunDevice>) {
    let mut closed = device.closed.subscribe();
    let mut buf = vec![0u8; MAX_PACKET];

    loop {
        let mut guard = tokio::select! {
            () = wait_closed(&mut closed) => return,
            ready = fd.readable() => match ready {
                Ok(guard) => guard,
                Err(e) => {
                    fail(&device, &e);
                    return;
                }
            },
        };

        match guard.try_io(|inner| inner.get_ref().recv(&mut buf)) {
            Ok(Ok(0)) => {
                fail(&device, &io::Error::from(io::ErrorKind::UnexpectedEof));
                return;
            }
            Ok(Ok(n)) => device.record_rx(n),
            Ok(Err(e)) => {
                fail(&device, &e);
                return;
            }
            Err(_would_block) => {}
        }
    }
}

fn fail(device: &TunnelDevice, e: &io::Error) {
    device.log.error(&format!("Failed to read packet from TUN device: {e}"));
    device.close();
}
