//! TUN driver.
//!
//! Creates a layer-3 tunnel interface through `/dev/net/tun`. The returned
//! file descriptor is non-blocking so the runtime device can poll it.
//!
//! Requires `CAP_NET_ADMIN`.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, RawFd};

use crate::error::{PlatformError, Result};

/// Kernel limit on interface names, including the trailing NUL.
pub const IFNAMSIZ: usize = 16;

/// Checks `name` against the kernel's interface name rules.
///
/// Runs before any device is opened, so a bad name never touches the driver.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(PlatformError::invalid_name(name, "name is empty"));
    }
    if name.len() >= IFNAMSIZ {
        return Err(PlatformError::invalid_name(name, "name exceeds 15 bytes"));
    }
    if name.bytes().any(|b| b == 0 || b == b'/' || b.is_ascii_whitespace()) {
        return Err(PlatformError::invalid_name(
            name,
            "name contains NUL, '/' or whitespace",
        ));
    }
    Ok(())
}

/// An open TUN interface.
#[derive(Debug)]
pub struct TunDevice {
    name: String,
    file: File,
}

impl TunDevice {
    /// Creates (or attaches to) the TUN interface `name`.
    pub fn create(name: &str) -> Result<Self> {
        validate_name(name)?;
        let file = open_tun(name).map_err(|e| PlatformError::tun(name, e))?;
        tracing::debug!(interface = %name, fd = file.as_raw_fd(), "tun interface created");
        Ok(Self {
            name: name.to_string(),
            file,
        })
    }

    /// Returns the interface name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads one packet into `buf`.
    ///
    /// Returns `WouldBlock` when nothing is queued.
    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.file).read(buf)
    }
}

impl AsRawFd for TunDevice {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::os::fd::AsRawFd;
    use std::os::unix::fs::OpenOptionsExt;

    use super::IFNAMSIZ;

    nix::ioctl_write_int!(tunsetiff, b'T', 202);

    /// `struct ifreq` restricted to the name and flags members.
    #[repr(C)]
    struct IfReq {
        name: [libc::c_char; IFNAMSIZ],
        flags: libc::c_short,
        _pad: [u8; 22],
    }

    impl IfReq {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        fn tun(name: &str) -> Self {
            let mut req = Self {
                name: [0; IFNAMSIZ],
                flags: (libc::IFF_TUN | libc::IFF_NO_PI) as libc::c_short,
                _pad: [0; 22],
            };
            for (dst, src) in req.name.iter_mut().zip(name.bytes()) {
                *dst = src as libc::c_char;
            }
            req
        }
    }

    #[allow(unsafe_code)]
    pub(super) fn open_tun(name: &str) -> io::Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open("/dev/net/tun")?;

        let mut req = IfReq::tun(name);
        // SAFETY: `req` is a live, correctly sized ifreq for the duration of the
        // call and the descriptor is owned by `file`.
        let result = unsafe {
            tunsetiff(
                file.as_raw_fd(),
                std::ptr::addr_of_mut!(req) as nix::sys::ioctl::ioctl_param_type,
            )
        };
        result.map_err(io::Error::from)?;

        Ok(file)
    }
}

#[cfg(target_os = "linux")]
use linux::open_tun;

#[cfg(not(target_os = "linux"))]
fn open_tun(_name: &str) -> io::Result<File> {
    Err(PlatformError::NotSupported("TUN interfaces require Linux").into())
}
