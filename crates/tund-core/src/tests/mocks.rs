//! Mock collaborators for lifecycle tests.
//!
//! Every mock counts its calls so tests can assert what was (and was not)
//! acquired, and exposes switches to inject failures.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::args::StartupArgs;
use crate::backend::{ControlListener, DeviceLog, RuntimeDevice, TunnelBackend};
use crate::types::LogLevel;

/// One recorded log call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// `debug` call.
    Debug(String),
    /// `info` call.
    Info(String),
    /// `error` call.
    Error(String),
    /// `fatal` call.
    Fatal(String),
}

/// Log sink that records every call, regardless of level.
#[derive(Debug, Default)]
pub struct MockLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MockLog {
    /// Returns all recorded entries in call order.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Returns the recorded info messages.
    #[must_use]
    pub fn infos(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                LogEntry::Info(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    /// Returns the number of fatal calls.
    #[must_use]
    pub fn fatal_count(&self) -> usize {
        self.entries()
            .iter()
            .filter(|e| matches!(e, LogEntry::Fatal(_)))
            .count()
    }
}

impl DeviceLog for MockLog {
    fn debug(&self, msg: &str) {
        self.entries.lock().push(LogEntry::Debug(msg.to_string()));
    }

    fn info(&self, msg: &str) {
        self.entries.lock().push(LogEntry::Info(msg.to_string()));
    }

    fn error(&self, msg: &str) {
        self.entries.lock().push(LogEntry::Error(msg.to_string()));
    }

    fn fatal(&self, msg: &str) {
        self.entries.lock().push(LogEntry::Fatal(msg.to_string()));
    }
}

/// Runtime device whose termination is triggered by the test.
#[derive(Debug)]
pub struct MockDevice {
    interface: String,
    level: LogLevel,
    log: MockLog,
    terminated: watch::Sender<bool>,
}

impl MockDevice {
    fn new(interface: String, level: LogLevel) -> Self {
        let (terminated, _) = watch::channel(false);
        Self {
            interface,
            level,
            log: MockLog::default(),
            terminated,
        }
    }

    /// Simulates the device shutting down on its own.
    pub fn terminate(&self) {
        self.terminated.send_replace(true);
    }

    /// Returns the interface the device was built for.
    #[must_use]
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Returns the level the device was built with.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }
}

#[async_trait]
impl RuntimeDevice for MockDevice {
    type Log = MockLog;

    fn log(&self) -> &MockLog {
        &self.log
    }

    async fn terminated(&self) {
        let mut rx = self.terminated.subscribe();
        // The sender lives as long as `self`, so this only ends on `true`.
        let _ = rx.wait_for(|done| *done).await;
    }
}

/// Accepted mock connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockConn(pub u32);

/// Listener fed by the test through [`MockBackend::connect`].
pub struct MockListener {
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<io::Result<MockConn>>>,
    closed: watch::Sender<bool>,
    state: Arc<MockState>,
}

#[async_trait]
impl ControlListener for MockListener {
    type Conn = MockConn;

    async fn accept(&self) -> io::Result<MockConn> {
        self.state.accept_count.fetch_add(1, Ordering::SeqCst);
        let closed = self.closed.subscribe();
        let already_closed = *closed.borrow();
        if already_closed {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "listener closed"));
        }

        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            () = wait_closed(closed) => {
                Err(io::Error::new(io::ErrorKind::NotConnected, "listener closed"))
            }
            next = incoming.recv() => match next {
                Some(result) => result,
                None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "no more connections")),
            },
        }
    }

    fn close(&self) {
        self.state.close_count.fetch_add(1, Ordering::SeqCst);
        self.closed.send_replace(true);
    }
}

async fn wait_closed(mut closed: watch::Receiver<bool>) {
    let _ = closed.wait_for(|c| *c).await;
}

/// Shared counters and switches.
#[derive(Default)]
struct MockState {
    daemonize_count: AtomicU32,
    create_tun_count: AtomicU32,
    new_device_count: AtomicU32,
    listen_count: AtomicU32,
    accept_count: AtomicU32,
    close_count: AtomicU32,
    handled_count: AtomicU32,

    daemonize_should_fail: AtomicBool,
    tun_should_fail: AtomicBool,
    listen_should_fail: AtomicBool,
    handler_should_fail: AtomicBool,
    handler_delay: Mutex<Option<Duration>>,

    device: Mutex<Option<Arc<MockDevice>>>,
}

/// Mock backend.
///
/// Configurable behavior for the lifecycle scenarios:
/// - daemonize / tun / listener success or failure
/// - connections injected on demand
/// - slow or failing handlers
pub struct MockBackend {
    state: Arc<MockState>,
    connector: mpsc::UnboundedSender<io::Result<MockConn>>,
    incoming: Mutex<Option<mpsc::UnboundedReceiver<io::Result<MockConn>>>>,
}

impl MockBackend {
    /// Creates a backend where every collaborator succeeds.
    #[must_use]
    pub fn new() -> Self {
        let (connector, incoming) = mpsc::unbounded_channel();
        Self {
            state: Arc::new(MockState::default()),
            connector,
            incoming: Mutex::new(Some(incoming)),
        }
    }

    /// Makes daemonization fail.
    #[must_use]
    pub fn fail_daemonize(self) -> Self {
        self.state.daemonize_should_fail.store(true, Ordering::SeqCst);
        self
    }

    /// Makes tun creation fail.
    #[must_use]
    pub fn fail_tun(self) -> Self {
        self.state.tun_should_fail.store(true, Ordering::SeqCst);
        self
    }

    /// Makes the listener fail to start.
    #[must_use]
    pub fn fail_listen(self) -> Self {
        self.state.listen_should_fail.store(true, Ordering::SeqCst);
        self
    }

    /// Makes every handler return an error.
    #[must_use]
    pub fn fail_handlers(self) -> Self {
        self.state.handler_should_fail.store(true, Ordering::SeqCst);
        self
    }

    /// Makes every handler take `delay` before finishing.
    #[must_use]
    pub fn slow_handlers(self, delay: Duration) -> Self {
        *self.state.handler_delay.lock() = Some(delay);
        self
    }

    /// Injects a connection into the listener.
    pub fn connect(&self, id: u32) {
        let _ = self.connector.send(Ok(MockConn(id)));
    }

    /// Makes the next accept fail with `err`.
    pub fn fail_accept(&self, err: io::Error) {
        let _ = self.connector.send(Err(err));
    }

    /// Returns the device built by `new_device`, if any.
    #[must_use]
    pub fn device(&self) -> Option<Arc<MockDevice>> {
        self.state.device.lock().clone()
    }

    /// Number of `daemonize` calls.
    #[must_use]
    pub fn daemonize_count(&self) -> u32 {
        self.state.daemonize_count.load(Ordering::SeqCst)
    }

    /// Number of `create_tun` calls.
    #[must_use]
    pub fn create_tun_count(&self) -> u32 {
        self.state.create_tun_count.load(Ordering::SeqCst)
    }

    /// Number of `new_device` calls.
    #[must_use]
    pub fn new_device_count(&self) -> u32 {
        self.state.new_device_count.load(Ordering::SeqCst)
    }

    /// Number of `listen` calls.
    #[must_use]
    pub fn listen_count(&self) -> u32 {
        self.state.listen_count.load(Ordering::SeqCst)
    }

    /// Number of `accept` calls.
    #[must_use]
    pub fn accept_count(&self) -> u32 {
        self.state.accept_count.load(Ordering::SeqCst)
    }

    /// Number of `close` calls.
    #[must_use]
    pub fn close_count(&self) -> u32 {
        self.state.close_count.load(Ordering::SeqCst)
    }

    /// Number of handlers that finished.
    #[must_use]
    pub fn handled_count(&self) -> u32 {
        self.state.handled_count.load(Ordering::SeqCst)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TunnelBackend for MockBackend {
    type Tun = String;
    type Device = MockDevice;
    type Listener = MockListener;

    fn daemonize(&self, _args: &StartupArgs) -> io::Result<()> {
        self.state.daemonize_count.fetch_add(1, Ordering::SeqCst);
        if self.state.daemonize_should_fail.load(Ordering::SeqCst) {
            return Err(io::Error::other("setsid failed"));
        }
        Ok(())
    }

    fn create_tun(&self, interface: &str) -> io::Result<String> {
        self.state.create_tun_count.fetch_add(1, Ordering::SeqCst);
        if self.state.tun_should_fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "operation not permitted"));
        }
        Ok(interface.to_string())
    }

    fn new_device(&self, tun: String, level: LogLevel) -> Arc<MockDevice> {
        self.state.new_device_count.fetch_add(1, Ordering::SeqCst);
        let device = Arc::new(MockDevice::new(tun, level));
        *self.state.device.lock() = Some(Arc::clone(&device));
        device
    }

    fn listen(&self, _interface: &str) -> io::Result<MockListener> {
        self.state.listen_count.fetch_add(1, Ordering::SeqCst);
        if self.state.listen_should_fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::AddrInUse, "address already in use"));
        }
        let incoming = self
            .incoming
            .lock()
            .take()
            .ok_or_else(|| io::Error::other("listener already started"))?;
        let (closed, _) = watch::channel(false);
        Ok(MockListener {
            incoming: tokio::sync::Mutex::new(incoming),
            closed,
            state: Arc::clone(&self.state),
        })
    }

    async fn handle_connection(&self, device: Arc<MockDevice>, conn: MockConn) -> io::Result<()> {
        let delay = *self.state.handler_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.handled_count.fetch_add(1, Ordering::SeqCst);
        device.log().debug(&format!("handled connection {}", conn.0));
        if self.state.handler_should_fail.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad command"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_backend_creation() {
        let backend = MockBackend::new();
        assert_eq!(backend.create_tun_count(), 0);
        assert!(backend.device().is_none());
    }

    #[test]
    fn test_mock_tun_failure() {
        let backend = MockBackend::new().fail_tun();
        assert!(backend.create_tun("wg0").is_err());
        assert_eq!(backend.create_tun_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_listener_close_unblocks_accept() {
        let backend = MockBackend::new();
        let listener = Arc::new(backend.listen("wg0").unwrap());

        let pending = {
            let listener = Arc::clone(&listener);
            tokio::spawn(async move { listener.accept().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        listener.close();

        let result = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("accept should return promptly")
            .unwrap();
        assert!(result.is_err());
        assert_eq!(backend.close_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_device_terminate() {
        let backend = MockBackend::new();
        let device = backend.new_device("wg0".to_string(), LogLevel::Info);
        device.terminate();
        tokio::time::timeout(Duration::from_secs(1), device.terminated())
            .await
            .expect("terminated should resolve");
    }

    #[test]
    fn test_mock_log_records() {
        let log = MockLog::default();
        log.info("a");
        log.fatal("b");
        assert_eq!(log.infos(), vec!["a".to_string()]);
        assert_eq!(log.fatal_count(), 1);
    }
}
