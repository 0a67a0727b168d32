//! Operation records.
//!
//! An `OpRecord` is the context of one in-flight submission. It is built
//! right before the submission, owned by the dispatcher's arena while the
//! kernel works on it, and consumed exactly once when its completion
//! arrives. Records are never reused: every submission gets a fresh one.
//!
//! Read and write records own the connection socket (`OwnedFd`), so a
//! connection is closed simply by dropping the last record that holds it.

use std::fmt;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

use crate::buffer::{IoBuf, IoVecs};
use crate::token::OpKind;

/// Peer address storage the kernel fills in on accept.
pub struct AcceptAddr {
    pub addr: libc::sockaddr_in,
    pub len: libc::socklen_t,
}

impl AcceptAddr {
    pub fn new() -> Box<Self> {
        Box::new(Self {
            // Safety: sockaddr_in is plain old data; all-zero is valid.
            addr: unsafe { std::mem::zeroed() },
            len: std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        })
    }
}

/// Accept on the listening socket. The listener is borrowed, not owned.
pub struct AcceptOp {
    pub listener: RawFd,
    pub peer: Box<AcceptAddr>,
}

/// Read of the request into exactly one buffer.
pub struct ReadOp {
    pub conn: OwnedFd,
    pub bufs: IoVecs,
}

impl ReadOp {
    /// The first `n` bytes of the read buffer (clamped to its capacity).
    pub fn filled_mut(&mut self, n: usize) -> &mut [u8] {
        match self.bufs.get_mut(0) {
            Some(buf) => {
                let n = n.min(buf.len());
                &mut buf[..n]
            }
            None => &mut [],
        }
    }
}

/// Write of a response frame list.
pub struct WriteOp {
    pub conn: OwnedFd,
    pub bufs: IoVecs,
}

/// Read of the shutdown eventfd. The fd is borrowed; whoever created it
/// keeps it open for the life of the ring.
pub struct WakeOp {
    pub fd: RawFd,
    /// One buffer of at least 8 bytes, the eventfd counter size.
    pub bufs: IoVecs,
}

pub enum OpRecord {
    Accept(AcceptOp),
    Read(ReadOp),
    Write(WriteOp),
    Wake(WakeOp),
}

impl OpRecord {
    pub fn accept(listener: RawFd) -> Self {
        OpRecord::Accept(AcceptOp {
            listener,
            peer: AcceptAddr::new(),
        })
    }

    pub fn read(conn: OwnedFd, buf: IoBuf) -> Self {
        OpRecord::Read(ReadOp {
            conn,
            bufs: IoVecs::new(vec![buf]),
        })
    }

    pub fn write(conn: OwnedFd, frames: Vec<IoBuf>) -> Self {
        OpRecord::Write(WriteOp {
            conn,
            bufs: IoVecs::new(frames),
        })
    }

    pub fn wake(fd: RawFd, buf: IoBuf) -> Self {
        OpRecord::Wake(WakeOp {
            fd,
            bufs: IoVecs::new(vec![buf]),
        })
    }

    pub fn kind(&self) -> OpKind {
        match self {
            OpRecord::Accept(_) => OpKind::Accept,
            OpRecord::Read(_) => OpKind::Read,
            OpRecord::Write(_) => OpKind::Write,
            OpRecord::Wake(_) => OpKind::Wake,
        }
    }

    /// The connection socket, absent for accepts and wake-ups.
    pub fn conn_fd(&self) -> Option<RawFd> {
        match self {
            OpRecord::Accept(_) | OpRecord::Wake(_) => None,
            OpRecord::Read(op) => Some(op.conn.as_raw_fd()),
            OpRecord::Write(op) => Some(op.conn.as_raw_fd()),
        }
    }

    pub fn bufs(&self) -> Option<&IoVecs> {
        match self {
            OpRecord::Accept(_) => None,
            OpRecord::Read(op) => Some(&op.bufs),
            OpRecord::Write(op) => Some(&op.bufs),
            OpRecord::Wake(op) => Some(&op.bufs),
        }
    }
}

impl fmt::Debug for OpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpRecord")
            .field("kind", &self.kind())
            .field("conn", &self.conn_fd())
            .field("bufs", &self.bufs())
            .finish()
    }
}
