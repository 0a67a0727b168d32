//! `BasicIoUring`: the default `IoBackend` implementation.
//!
//! Wraps the `io-uring` crate. No SQPOLL, no fixed files, no registered
//! buffers: every operation passes its own heap buffers by pointer.
//! Works on any kernel with IORING_OP_ACCEPT (5.5+).

use ringrpc_core::error::{errno_of, EngineError, Result};
use ringrpc_core::io_backend::{IoBackend, IoCompletion};
use ringrpc_core::op::OpRecord;
use ringrpc_core::token::OpToken;

use io_uring::{opcode, squeue, types, IoUring};
use tracing::debug;

use std::os::fd::AsRawFd;

/// Configuration for BasicIoUring.
pub struct BasicIoUringConfig {
    /// Number of SQ entries. Rounded up to a power of 2 by the kernel.
    pub sq_entries: u32,
    /// Number of CQ entries. Defaults to 2 * sq_entries.
    pub cq_entries: Option<u32>,
}

impl Default for BasicIoUringConfig {
    fn default() -> Self {
        Self {
            sq_entries: 256,
            cq_entries: None,
        }
    }
}

/// Default io_uring backend.
///
/// One instance per event loop. The ring is torn down exactly once, when
/// the instance is dropped.
pub struct BasicIoUring {
    ring: IoUring,
    inflight: usize,
    pending_submit: u32,
}

impl BasicIoUring {
    pub fn new(config: BasicIoUringConfig) -> Result<Self> {
        let mut builder = IoUring::builder();
        if let Some(cq) = config.cq_entries {
            builder.setup_cqsize(cq);
        }
        let ring = builder
            .build(config.sq_entries)
            .map_err(|e| EngineError::RingSetup(errno_of(&e)))?;
        debug!(
            "io_uring ready: fd={} sq={} cq={}",
            ring.as_raw_fd(),
            ring.params().sq_entries(),
            ring.params().cq_entries()
        );

        Ok(Self {
            ring,
            inflight: 0,
            pending_submit: 0,
        })
    }

    /// Translate an operation record into an SQE.
    ///
    /// Reads and writes go through READV/WRITEV with offset 0, which the
    /// kernel ignores for sockets.
    fn build_sqe(token: OpToken, op: &mut OpRecord) -> squeue::Entry {
        let sqe = match op {
            OpRecord::Accept(accept) => {
                let peer = &mut *accept.peer;
                opcode::Accept::new(
                    types::Fd(accept.listener),
                    (&mut peer.addr as *mut libc::sockaddr_in).cast::<libc::sockaddr>(),
                    &mut peer.len,
                )
                .flags(libc::SOCK_CLOEXEC)
                .build()
            }
            OpRecord::Read(read) => opcode::Readv::new(
                types::Fd(read.conn.as_raw_fd()),
                read.bufs.as_ptr(),
                read.bufs.len() as u32,
            )
            .build(),
            OpRecord::Write(write) => opcode::Writev::new(
                types::Fd(write.conn.as_raw_fd()),
                write.bufs.as_ptr(),
                write.bufs.len() as u32,
            )
            .build(),
            OpRecord::Wake(wake) => opcode::Readv::new(
                types::Fd(wake.fd),
                wake.bufs.as_ptr(),
                wake.bufs.len() as u32,
            )
            .build(),
        };
        sqe.user_data(token.0)
    }

    fn submit_error(err: std::io::Error) -> EngineError {
        EngineError::Submit(errno_of(&err))
    }
}

impl IoBackend for BasicIoUring {
    unsafe fn push(&mut self, token: OpToken, op: &mut OpRecord) -> Result<()> {
        let sqe = Self::build_sqe(token, op);
        let mut sq = self.ring.submission();
        if sq.is_full() {
            return Err(EngineError::RingFull);
        }
        // Safety: the caller keeps every buffer the SQE points at alive
        // until the completion for `token` is drained.
        unsafe { sq.push(&sqe) }.map_err(|_| EngineError::RingFull)?;
        drop(sq);

        self.pending_submit += 1;
        self.inflight += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<usize> {
        if self.pending_submit == 0 {
            return Ok(0);
        }
        let submitted = self.ring.submit().map_err(Self::submit_error)?;
        self.pending_submit = 0;
        Ok(submitted)
    }

    fn flush_and_wait(&mut self, want: usize) -> Result<usize> {
        match self.ring.submit_and_wait(want) {
            Ok(submitted) => {
                self.pending_submit = 0;
                Ok(submitted)
            }
            // Interrupted by a signal: let the caller check its flag.
            Err(e) if e.raw_os_error() == Some(libc::EINTR) => Ok(0),
            // CQ overflowed; completions are waiting to be reaped.
            Err(e) if e.raw_os_error() == Some(libc::EBUSY) => Ok(0),
            Err(e) => Err(EngineError::Wait(errno_of(&e))),
        }
    }

    fn poll_completions(&mut self, buf: &mut [IoCompletion]) -> usize {
        let mut cq = self.ring.completion();
        let mut count = 0;
        while count < buf.len() {
            let Some(cqe) = cq.next() else { break };
            buf[count] = IoCompletion {
                token: OpToken(cqe.user_data()),
                result: cqe.result(),
                flags: cqe.flags(),
            };
            count += 1;
        }
        // Dropping `cq` publishes the new head: the entries are consumed.
        drop(cq);
        self.inflight = self.inflight.saturating_sub(count);
        count
    }

    fn inflight(&self) -> usize {
        self.inflight
    }

    fn capacity(&self) -> usize {
        self.ring.params().sq_entries() as usize
    }
}
