//! # ringrpc-executor: the dispatcher loop
//!
//! One thread, one ring, one blocking call. The dispatcher runs:
//!
//! ```text
//! submit Accept (and Wake, a read of the shutdown eventfd)
//! while the shutdown flag is clear {
//!     1. Flush pending SQEs and wait for at least one completion
//!     2. Drain completions; for each, take its record out of the arena:
//!          Accept → re-arm Accept, admit the connection, submit Read
//!          Read   → parse the request line, call the handler,
//!                   submit Write (200 or 400); the read buffer is freed
//!          Write  → drop the record: frames freed, socket closed
//!          Wake   → re-arm Wake; the flag is checked before the next one
//!     3. Every `stats_interval` → log counters
//! }
//! ```
//!
//! A connection has no state of its own. It is alive while exactly one
//! Read or Write record holding its socket sits in the arena.
//!
//! The dispatcher is generic over `IoBackend` and `Handler`: the ring and
//! the business logic are both supplied by the embedder.

pub mod config;
pub mod handler;
pub mod request;
pub mod response;
pub mod slab;
pub mod stats;

#[cfg(test)]
mod testing;

use config::ServerConfig;
use handler::Handler;
use request::parse_request_line;
use slab::OpSlab;
use stats::Stats;

use ringrpc_core::buffer::HeapBuffers;
use ringrpc_core::error::{EngineError, ErrorPolicy, Result};
use ringrpc_core::io_backend::{IoBackend, IoCompletion};
use ringrpc_core::op::{OpRecord, ReadOp, WriteOp};
use ringrpc_core::token::{OpKind, OpToken};
use ringrpc_module::basic_iouring::{BasicIoUring, BasicIoUringConfig};
use ringrpc_module::listener::Listener;
use ringrpc_module::signal;

use tracing::{debug, error, info, trace, warn};

use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Completions drained per wait.
const COMPLETION_BATCH: usize = 64;

pub struct Dispatcher<B: IoBackend, H: Handler> {
    io: B,
    handler: H,
    listener: RawFd,
    ops: OpSlab,
    buffers: HeapBuffers,
    max_line: usize,
    max_conns: usize,
    policy: ErrorPolicy,
    /// An Accept record is in the arena.
    accept_armed: bool,
    wake: Option<RawFd>,
    /// A Wake record is in the arena.
    wake_armed: bool,
    stats: Stats,
    stats_interval: Duration,
    started: Instant,
    last_stats: Instant,
    comp_buf: Vec<IoCompletion>,
}

impl<B: IoBackend, H: Handler> Dispatcher<B, H> {
    /// `listener` must stay open for as long as the dispatcher runs.
    pub fn new(io: B, handler: H, listener: RawFd, config: &ServerConfig) -> Self {
        let config = config.clone().normalized();
        let now = Instant::now();
        Self {
            io,
            handler,
            listener,
            // Every live connection owns one record, plus Accept and Wake.
            ops: OpSlab::new(config.max_conns + 2),
            buffers: HeapBuffers::new(config.read_buf_size),
            max_line: config.max_line,
            max_conns: config.max_conns,
            policy: config.error_policy,
            accept_armed: false,
            wake: None,
            wake_armed: false,
            stats: Stats::default(),
            stats_interval: config.stats_interval,
            started: now,
            last_stats: now,
            comp_buf: vec![IoCompletion::EMPTY; COMPLETION_BATCH],
        }
    }

    /// Seed the loop with its first Accept (and the wake-up read, if any).
    pub fn start(&mut self) -> Result<()> {
        self.arm_accept()?;
        if self.wake.is_some() && !self.wake_armed {
            self.arm_wake()?;
        }
        self.io.flush()?;
        Ok(())
    }

    /// Keep a read of `fd` (an eventfd) armed in the ring. Writing to it
    /// ends a blocked wait, so `run` sees its shutdown flag without
    /// waiting for client traffic.
    pub fn wake_on(&mut self, fd: RawFd) {
        self.wake = Some(fd);
    }

    /// Wait once and dispatch everything that completed.
    ///
    /// Returns the number of completions handled; 0 after an interrupted
    /// wait. The whole batch is always dispatched; an `Err` is the first
    /// engine failure the error policy did not absorb.
    pub fn turn(&mut self) -> Result<usize> {
        self.step(None)
    }

    /// Serve until `shutdown` is set.
    ///
    /// The flag is checked before every wait and before every completion.
    /// Once it is set nothing more is dispatched: completions already
    /// drained are dropped and their records leak with the dispatcher.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        self.start()?;
        while !shutdown.load(Ordering::SeqCst) {
            self.step(Some(shutdown))?;
        }
        info!("shutting down");
        self.log_stats();
        Ok(())
    }

    fn step(&mut self, shutdown: Option<&AtomicBool>) -> Result<usize> {
        self.io.flush_and_wait(1)?;
        let n = self.io.poll_completions(&mut self.comp_buf);

        let mut first_err = None;
        let mut handled = 0;
        for i in 0..n {
            if shutdown.is_some_and(|f| f.load(Ordering::SeqCst)) {
                debug!("shutdown requested, dropping {} completions", n - i);
                return first_err.map_or(Ok(handled), Err);
            }
            let completion = self.comp_buf[i];
            let outcome = self.dispatch(completion).or_else(|e| self.on_failure(e));
            if let Err(e) = outcome {
                note_failure(&mut first_err, e);
            }
            handled += 1;
        }

        if !self.accept_armed {
            if let Err(e) = self.arm_accept().or_else(|e| self.on_failure(e)) {
                note_failure(&mut first_err, e);
            }
        }
        if !self.wake_armed && self.wake.is_some() {
            if let Err(e) = self.arm_wake().or_else(|e| self.on_failure(e)) {
                note_failure(&mut first_err, e);
            }
        }

        if !self.stats_interval.is_zero() && self.last_stats.elapsed() >= self.stats_interval {
            self.log_stats();
            self.last_stats = Instant::now();
        }
        first_err.map_or(Ok(handled), Err)
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn buffers(&self) -> &HeapBuffers {
        &self.buffers
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.io
    }

    /// Operations submitted and not yet completed.
    pub fn inflight(&self) -> usize {
        self.ops.len()
    }

    /// Connections with a Read or Write outstanding.
    pub fn live_connections(&self) -> usize {
        self.ops.len() - usize::from(self.accept_armed) - usize::from(self.wake_armed)
    }

    fn log_stats(&self) {
        self.stats
            .log(self.live_connections(), self.started.elapsed().as_secs_f64());
    }

    fn dispatch(&mut self, completion: IoCompletion) -> Result<()> {
        let token = completion.token;
        let op = self
            .ops
            .remove(token)
            .ok_or(EngineError::UnknownToken(token.0))?;
        trace!("completion {} result={}", token, completion.result);

        match op {
            OpRecord::Accept(_) => {
                self.accept_armed = false;
                let admitted = self.admit(completion.result);
                let rearmed = self.arm_accept();
                admitted.and(rearmed)
            }
            OpRecord::Read(read) => self.on_read(read, completion.result),
            OpRecord::Write(write) => self.on_write(write, completion.result),
            OpRecord::Wake(_) => {
                self.wake_armed = false;
                if completion.result < 0 {
                    return Err(EngineError::OpFailed { kind: OpKind::Wake, errno: -completion.result });
                }
                debug!("woken by stop signal");
                self.arm_wake()
            }
        }
    }

    fn admit(&mut self, result: i32) -> Result<()> {
        if result < 0 {
            return Err(EngineError::OpFailed { kind: OpKind::Accept, errno: -result });
        }
        // Safety: a successful accept hands us a descriptor nobody else owns.
        let conn = unsafe { OwnedFd::from_raw_fd(result) };
        self.stats.accepts += 1;

        if self.live_connections() >= self.max_conns {
            self.stats.rejected += 1;
            warn!(
                "connection limit {} reached, closing fd={}",
                self.max_conns,
                conn.as_raw_fd()
            );
            return Ok(());
        }

        debug!("accepted fd={}", conn.as_raw_fd());
        let buf = self.buffers.zeroed();
        self.submit(OpRecord::read(conn, buf))
    }

    fn on_read(&mut self, mut read: ReadOp, result: i32) -> Result<()> {
        let fd = read.conn.as_raw_fd();
        if result < 0 {
            return Err(EngineError::OpFailed { kind: OpKind::Read, errno: -result });
        }
        if result == 0 {
            self.stats.empty_reads += 1;
            warn!("empty request on fd={}, closing", fd);
            return Ok(());
        }

        let n = result as usize;
        self.stats.requests += 1;
        self.stats.bytes_in += n as u64;

        let frames = match parse_request_line(read.filled_mut(n), self.max_line) {
            Ok(line) => {
                let value = self.handler.call(line.argument());
                self.stats.ok += 1;
                response::ok_value(&self.buffers, value)
            }
            Err(e) => {
                self.stats.bad_requests += 1;
                warn!("malformed request on fd={}: {}", fd, e);
                response::bad_request(&self.buffers)
            }
        };

        let ReadOp { conn, bufs } = read;
        drop(bufs);
        self.submit(OpRecord::write(conn, frames))
    }

    fn on_write(&mut self, write: WriteOp, result: i32) -> Result<()> {
        self.stats.responses += 1;
        if result < 0 {
            return Err(EngineError::OpFailed { kind: OpKind::Write, errno: -result });
        }

        let written = result as usize;
        self.stats.bytes_out += written as u64;
        let expected = write.bufs.total_bytes();
        if written < expected {
            warn!(
                "short write on fd={}: {} of {} bytes",
                write.conn.as_raw_fd(),
                written,
                expected
            );
        }
        debug!("response sent on fd={}, closing", write.conn.as_raw_fd());
        Ok(())
    }

    fn on_failure(&mut self, err: EngineError) -> Result<()> {
        self.stats.errors += 1;
        match self.policy {
            ErrorPolicy::Exit => Err(err),
            ErrorPolicy::Continue => {
                error!("{}; continuing", err);
                Ok(())
            }
        }
    }

    fn arm_accept(&mut self) -> Result<()> {
        self.submit(OpRecord::accept(self.listener))?;
        self.accept_armed = true;
        Ok(())
    }

    fn arm_wake(&mut self) -> Result<()> {
        let Some(fd) = self.wake else { return Ok(()) };
        // An eventfd read takes the whole 8-byte counter.
        let buf = self.buffers.copy_from(&[0u8; 8]);
        self.submit(OpRecord::wake(fd, buf))?;
        self.wake_armed = true;
        Ok(())
    }

    /// Park `op` in the arena and hand it to the ring.
    ///
    /// If the submission queue is full it is flushed once and the push
    /// retried. On failure the record is dropped, closing its connection.
    fn submit(&mut self, op: OpRecord) -> Result<()> {
        let token = self.ops.insert(op).ok_or(EngineError::RingFull)?;
        let pushed = match self.push(token) {
            Err(EngineError::RingFull) => self.io.flush().and_then(|_| self.push(token)),
            other => other,
        };
        if let Err(e) = pushed {
            drop(self.ops.remove(token));
            return Err(e);
        }
        trace!("submitted {}", token);
        Ok(())
    }

    fn push(&mut self, token: OpToken) -> Result<()> {
        let op = self
            .ops
            .get_mut(token)
            .ok_or(EngineError::UnknownToken(token.0))?;
        // Safety: the record stays in the arena, at a stable heap address
        // for everything the SQE points at, until its completion is
        // dispatched. At teardown it is leaked instead of freed.
        unsafe { self.io.push(token, op) }
    }
}

/// Keep the first error for the caller; log the ones after it.
fn note_failure(first: &mut Option<EngineError>, err: EngineError) {
    match first {
        None => *first = Some(err),
        Some(_) => error!("{}", err),
    }
}

impl<B: IoBackend, H: Handler> Drop for Dispatcher<B, H> {
    fn drop(&mut self) {
        let leaked = self.ops.leak_all();
        if leaked > 0 {
            debug!("leaving {} in-flight operations to ring teardown", leaked);
        }
    }
}

/// Bind, build the ring and serve until SIGINT or SIGTERM.
///
/// Setup failures are returned as-is. On a clean shutdown the final
/// counters are returned.
pub fn serve<H: Handler>(config: ServerConfig, handler: H) -> Result<Stats> {
    let config = config.normalized();
    signal::install()?;

    let listener = Listener::bind(config.port, config.backlog)?;
    let io = BasicIoUring::new(BasicIoUringConfig {
        sq_entries: config.ring_entries,
        cq_entries: None,
    })?;
    info!(
        "listening on 0.0.0.0:{} (io_uring sq={}, backlog={}, max_conns={})",
        listener.local_port(),
        config.ring_entries,
        config.backlog,
        config.max_conns
    );

    let mut dispatcher = Dispatcher::new(io, handler, listener.as_raw_fd(), &config);
    if let Some(fd) = signal::wake_fd() {
        dispatcher.wake_on(fd);
    }
    dispatcher.run(signal::flag())?;
    Ok(dispatcher.stats().clone())
}
