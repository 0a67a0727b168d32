//! In-process `IoBackend` for dispatcher tests.
//!
//! Connections are Unix socket pairs. Accepts complete with the server end
//! of the next queued pair. Reads and writes run `readv`/`writev` on the
//! record's own iovecs. A read (or wake-up read) whose fd is not readable
//! yet stays pending and is retried on every poll, like a kernel read
//! waiting for data.

use ringrpc_core::error::{EngineError, Result};
use ringrpc_core::io_backend::{IoBackend, IoCompletion};
use ringrpc_core::op::OpRecord;
use ringrpc_core::token::{OpKind, OpToken};

use std::collections::VecDeque;
use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;

struct PendingRead {
    token: OpToken,
    fd: RawFd,
    iov: *const libc::iovec,
    iovcnt: i32,
}

pub struct LoopbackBackend {
    backlog: VecDeque<OwnedFd>,
    waiting_accept: Option<OpToken>,
    pending_reads: Vec<PendingRead>,
    ready: VecDeque<IoCompletion>,
    fail_next: Option<(OpKind, i32)>,
    /// Kind of every pushed operation, in push order.
    pub pushes: Vec<OpKind>,
    sq_limit: usize,
    unflushed: usize,
    inflight: usize,
}

impl LoopbackBackend {
    pub fn new() -> Self {
        Self::with_sq_limit(64)
    }

    /// Pushes beyond `sq_limit` without a flush report `RingFull`.
    pub fn with_sq_limit(sq_limit: usize) -> Self {
        Self {
            backlog: VecDeque::new(),
            waiting_accept: None,
            pending_reads: Vec::new(),
            ready: VecDeque::new(),
            fail_next: None,
            pushes: Vec::new(),
            sq_limit,
            unflushed: 0,
            inflight: 0,
        }
    }

    /// Open a connection and return the client end.
    pub fn connect(&mut self) -> UnixStream {
        let (server, client) = UnixStream::pair().expect("socketpair");
        server.set_nonblocking(true).expect("nonblocking");
        self.backlog.push_back(OwnedFd::from(server));
        if let Some(token) = self.waiting_accept.take() {
            self.complete_accept(token);
        }
        client
    }

    /// The next pushed operation of `kind` completes with `-errno`.
    pub fn fail_next(&mut self, kind: OpKind, errno: i32) {
        self.fail_next = Some((kind, errno));
    }

    /// Queue a completion for a tag that was never submitted.
    pub fn inject(&mut self, token: OpToken, result: i32) {
        self.inflight += 1;
        self.ready.push_back(IoCompletion { token, result, flags: 0 });
    }

    pub fn pushed(&self, kind: OpKind) -> usize {
        self.pushes.iter().filter(|k| **k == kind).count()
    }

    fn complete(&mut self, token: OpToken, result: i32) {
        self.ready.push_back(IoCompletion { token, result, flags: 0 });
    }

    fn complete_accept(&mut self, token: OpToken) {
        match self.backlog.pop_front() {
            Some(fd) => self.complete(token, fd.into_raw_fd()),
            None => self.waiting_accept = Some(token),
        }
    }

    fn retry_reads(&mut self) {
        let pending = std::mem::take(&mut self.pending_reads);
        for read in pending {
            let mut pfd = libc::pollfd { fd: read.fd, events: libc::POLLIN, revents: 0 };
            let ready = unsafe { libc::poll(&mut pfd, 1, 0) };
            if ready == 0 {
                self.pending_reads.push(read);
                continue;
            }
            let n = unsafe { libc::readv(read.fd, read.iov, read.iovcnt) };
            self.complete(read.token, result_of(n));
        }
    }

    fn park_read(&mut self, token: OpToken, fd: RawFd, bufs: &ringrpc_core::buffer::IoVecs) {
        self.pending_reads.push(PendingRead {
            token,
            fd,
            iov: bufs.as_ptr(),
            iovcnt: bufs.len() as i32,
        });
        self.retry_reads();
    }
}

fn result_of(n: isize) -> i32 {
    if n < 0 {
        -std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO)
    } else {
        n as i32
    }
}

impl IoBackend for LoopbackBackend {
    unsafe fn push(&mut self, token: OpToken, op: &mut OpRecord) -> Result<()> {
        if self.unflushed == self.sq_limit {
            return Err(EngineError::RingFull);
        }
        self.unflushed += 1;
        self.inflight += 1;
        self.pushes.push(op.kind());

        if let Some((kind, errno)) = self.fail_next {
            if kind == op.kind() {
                self.fail_next = None;
                self.complete(token, -errno);
                return Ok(());
            }
        }

        match op {
            OpRecord::Accept(_) => self.complete_accept(token),
            OpRecord::Read(read) => self.park_read(token, read.conn.as_raw_fd(), &read.bufs),
            OpRecord::Wake(wake) => self.park_read(token, wake.fd, &wake.bufs),
            OpRecord::Write(write) => {
                let n = unsafe {
                    libc::writev(
                        write.conn.as_raw_fd(),
                        write.bufs.as_ptr(),
                        write.bufs.len() as i32,
                    )
                };
                self.complete(token, result_of(n));
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<usize> {
        Ok(std::mem::take(&mut self.unflushed))
    }

    fn flush_and_wait(&mut self, _want: usize) -> Result<usize> {
        self.flush()
    }

    fn poll_completions(&mut self, buf: &mut [IoCompletion]) -> usize {
        self.retry_reads();
        let mut count = 0;
        while count < buf.len() {
            let Some(c) = self.ready.pop_front() else { break };
            buf[count] = c;
            count += 1;
        }
        self.inflight = self.inflight.saturating_sub(count);
        count
    }

    fn inflight(&self) -> usize {
        self.inflight
    }

    fn capacity(&self) -> usize {
        self.sq_limit
    }
}
