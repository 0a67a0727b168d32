//! Listening endpoint setup (normal syscalls, startup only).
//!
//! `socket` → `SO_REUSEADDR` → `bind(0.0.0.0:port)` → `listen(backlog)`.
//! Any failing call aborts setup with `EngineError::Listener` naming it.

use ringrpc_core::error::{last_errno, EngineError, Result};

use tracing::debug;

use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

/// Default listen backlog.
pub const DEFAULT_BACKLOG: i32 = 10;

/// A bound, listening IPv4 TCP socket. Closed on drop.
#[derive(Debug)]
pub struct Listener {
    fd: OwnedFd,
    port: u16,
}

fn check(call: &'static str, ret: libc::c_int) -> Result<libc::c_int> {
    if ret < 0 {
        Err(EngineError::Listener { call, errno: last_errno() })
    } else {
        Ok(ret)
    }
}

impl Listener {
    /// Bind `0.0.0.0:port`. Port 0 picks an ephemeral port; see `local_port`.
    pub fn bind(port: u16, backlog: i32) -> Result<Self> {
        let raw = check("socket", unsafe {
            libc::socket(libc::AF_INET, libc::SOCK_STREAM | libc::SOCK_CLOEXEC, 0)
        })?;
        // Safety: `raw` is a fresh descriptor nobody else owns.
        let fd = unsafe { OwnedFd::from_raw_fd(raw) };

        let enable: libc::c_int = 1;
        check("setsockopt(SO_REUSEADDR)", unsafe {
            libc::setsockopt(
                fd.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                (&enable as *const libc::c_int).cast(),
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        })?;

        // Safety: sockaddr_in is plain old data.
        let mut addr: libc::sockaddr_in = unsafe { std::mem::zeroed() };
        addr.sin_family = libc::AF_INET as libc::sa_family_t;
        addr.sin_addr.s_addr = libc::INADDR_ANY.to_be();
        addr.sin_port = port.to_be();

        check("bind", unsafe {
            libc::bind(
                fd.as_raw_fd(),
                (&addr as *const libc::sockaddr_in).cast(),
                std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        })?;

        check("listen", unsafe { libc::listen(fd.as_raw_fd(), backlog) })?;

        let port = Self::bound_port(&fd)?;
        debug!("listener fd={} bound to 0.0.0.0:{} (backlog {})", fd.as_raw_fd(), port, backlog);
        Ok(Self { fd, port })
    }

    fn bound_port(fd: &OwnedFd) -> Result<u16> {
        // Safety: as above.
        let mut addr: libc::sockaddr_in = unsafe { std::mem::zeroed() };
        let mut len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
        check("getsockname", unsafe {
            libc::getsockname(
                fd.as_raw_fd(),
                (&mut addr as *mut libc::sockaddr_in).cast(),
                &mut len,
            )
        })?;
        Ok(u16::from_be(addr.sin_port))
    }

    /// The port actually bound.
    pub fn local_port(&self) -> u16 {
        self.port
    }
}

impl AsRawFd for Listener {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl AsFd for Listener {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}
