//! UAPI control socket.
//!
//! One Unix stream socket per interface at `<socket_dir>/<interface>.sock`.
//! Requests are line based:
//!
//! ```text
//! get=1\n\n                 → key=value\n ... errno=0\n\n
//! set=1\nkey=value\n...\n\n → errno=0\n\n | errno=22\n\n
//! ```
//!
//! A connection may carry several requests; it ends at EOF. Lines longer
//! than [`MAX_LINE`] or not valid UTF-8 make the request malformed.

use std::fs::DirBuilder;
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::os::unix::net::{UnixListener as StdUnixListener, UnixStream as StdUnixStream};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;

use tund_core::ControlListener;

use crate::device::TunnelDevice;
use crate::error::{PlatformError, Result};

/// `EINVAL`, reported for malformed or rejected requests.
pub const ERRNO_INVALID: i32 = 22;

/// Longest request line accepted, terminator included.
pub const MAX_LINE: usize = 4096;

/// Listening UAPI socket for one interface.
#[derive(Debug)]
pub struct UapiListener {
    path: PathBuf,
    listener: UnixListener,
    closed: watch::Sender<bool>,
}

impl UapiListener {
    /// Binds the socket at `path`, creating its directory if needed.
    ///
    /// A leftover socket with nobody behind it is replaced; a socket that
    /// still accepts connections belongs to a live daemon and is refused.
    /// Must be called from within a Tokio runtime.
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent() {
            DirBuilder::new()
                .recursive(true)
                .mode(0o755)
                .create(dir)
                .map_err(|e| PlatformError::uapi(dir, e))?;
        }

        remove_stale(&path)?;

        let std_listener =
            StdUnixListener::bind(&path).map_err(|e| PlatformError::uapi(&path, e))?;
        std_listener
            .set_nonblocking(true)
            .map_err(|e| PlatformError::uapi(&path, e))?;
        let listener =
            UnixListener::from_std(std_listener).map_err(|e| PlatformError::uapi(&path, e))?;

        let (closed, _) = watch::channel(false);
        tracing::debug!(path = %path.display(), "UAPI socket bound");
        Ok(Self {
            path,
            listener,
            closed,
        })
    }

    /// Returns the socket path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true once the listener has been closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

fn remove_stale(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    if StdUnixStream::connect(path).is_ok() {
        return Err(PlatformError::SocketInUse(path.to_path_buf()));
    }
    tracing::debug!(path = %path.display(), "removing stale UAPI socket");
    std::fs::remove_file(path).map_err(|e| PlatformError::uapi(path, e))
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "UAPI listener closed")
}

async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|c| *c).await;
}

#[async_trait]
impl ControlListener for UapiListener {
    type Conn = UnixStream;

    async fn accept(&self) -> io::Result<UnixStream> {
        let mut closed = self.closed.subscribe();
        let already_closed = *closed.borrow_and_update();
        if already_closed {
            return Err(closed_error());
        }

        tokio::select! {
            () = wait_closed(&mut closed) => Err(closed_error()),
            accepted = self.listener.accept() => accepted.map(|(stream, _)| stream),
        }
    }

    fn close(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "UAPI socket removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove UAPI socket");
            }
        }
    }
}

impl Drop for UapiListener {
    fn drop(&mut self) {
        self.close();
    }
}

/// One parsed UAPI request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Dump the device settings.
    Get,
    /// Apply `key=value` pairs.
    Set(Vec<(String, String)>),
}

/// Reads the next request, or `None` at a clean EOF.
///
/// Malformed requests are consumed up to their terminating blank line and
/// returned as `InvalidData` errors so the connection can continue.
pub async fn read_request<R>(reader: &mut R) -> io::Result<Option<io::Result<Request>>>
where
    R: AsyncBufRead + Unpin,
{
    let Some(op) = next_line(reader).await? else {
        return Ok(None);
    };

    let mut body = Vec::new();
    let mut bad_line = None;
    loop {
        match next_line(reader).await? {
            None => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            Some(Ok(line)) if line.is_empty() => break,
            Some(Ok(line)) => body.push(line),
            Some(Err(e)) => {
                bad_line.get_or_insert(e);
            }
        }
    }

    let op = match (op, bad_line) {
        (Err(e), _) | (Ok(_), Some(e)) => return Ok(Some(Err(e))),
        (Ok(op), None) => op,
    };

    let request = match op.as_str() {
        "get=1" if body.is_empty() => Ok(Request::Get),
        "set=1" => body
            .iter()
            .map(|line| {
                line.split_once('=')
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| invalid(format!("malformed line '{line}'")))
            })
            .collect::<io::Result<Vec<_>>>()
            .map(Request::Set),
        other => Err(invalid(format!("unknown operation '{other}'"))),
    };
    Ok(Some(request))
}

/// Reads one line of at most [`MAX_LINE`] bytes.
///
/// The outer error is a transport failure. The inner one marks a line that
/// was too long or not UTF-8; the rest of such a line is skipped.
async fn next_line<R>(reader: &mut R) -> io::Result<Option<io::Result<String>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::new();
    let read = (&mut *reader)
        .take(MAX_LINE as u64)
        .read_until(b'\n', &mut raw)
        .await?;
    if read == 0 {
        return Ok(None);
    }
    if raw.len() == MAX_LINE && raw.last() != Some(&b'\n') {
        skip_line(reader).await?;
        return Ok(Some(Err(invalid(format!("line longer than {MAX_LINE} bytes")))));
    }

    while matches!(raw.last(), Some(b'\n' | b'\r')) {
        raw.pop();
    }
    Ok(Some(
        String::from_utf8(raw).map_err(|_| invalid("line is not valid UTF-8".to_string())),
    ))
}

/// Discards input up to and including the next newline, without buffering it.
async fn skip_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let buf = reader.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        if let Some(end) = buf.iter().position(|&b| b == b'\n') {
            reader.consume(end + 1);
            return Ok(());
        }
        let len = buf.len();
        reader.consume(len);
    }
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

/// Applies `request` to `device` and returns the response body.
pub fn apply(device: &TunnelDevice, request: &Request) -> (String, i32) {
    match request {
        Request::Get => {
            let body: String = device
                .snapshot()
                .into_iter()
                .map(|(k, v)| format!("{k}={v}\n"))
                .collect();
            (body, 0)
        }
        Request::Set(pairs) => {
            for (key, value) in pairs {
                if device.set(key, value).is_err() {
                    return (String::new(), ERRNO_INVALID);
                }
            }
            (String::new(), 0)
        }
    }
}

/// Serves UAPI requests from `reader` until EOF.
///
/// Returns the first protocol error after answering it, so the caller can
/// log it; the connection is done either way.
pub async fn serve<R, W>(device: &TunnelDevice, mut reader: R, mut writer: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut first_error = None;
    while let Some(request) = read_request(&mut reader).await? {
        let (body, errno) = match &request {
            Ok(request) => apply(device, request),
            Err(_) => (String::new(), ERRNO_INVALID),
        };
        writer.write_all(body.as_bytes()).await?;
        writer
            .write_all(format!("errno={errno}\n\n").as_bytes())
            .await?;
        writer.flush().await?;

        if let Err(e) = request {
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Serves one accepted UAPI connection.
pub async fn handle_connection(device: &TunnelDevice, mut stream: UnixStream) -> io::Result<()> {
    let (read, write) = stream.split();
    serve(device, BufReader::new(read), write).await
}
