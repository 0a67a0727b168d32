//! Completion-ring abstraction.
//!
//! An `IoBackend` accepts operation records, hands them to the kernel and
//! reports their completions. The dispatcher is generic over it, so the
//! state machine runs unchanged against a real io_uring or an in-memory
//! test double.
//!
//! The dispatcher drives it like this:
//!
//! ```text
//! push(token, record)          // queue one SQE per new operation
//! flush_and_wait(1)            // submit queued SQEs, block for ≥1 CQE
//! poll_completions(&mut buf)   // drain CQEs, marking them consumed
//! ```

use crate::error::Result;
use crate::op::OpRecord;
use crate::token::OpToken;

/// One completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoCompletion {
    /// Tag passed to `push`, returned unchanged.
    pub token: OpToken,
    /// Syscall result, or negative errno.
    pub result: i32,
    /// Backend-specific flags.
    pub flags: u32,
}

impl IoCompletion {
    pub const EMPTY: Self = Self {
        token: OpToken::NONE,
        result: 0,
        flags: 0,
    };
}

pub trait IoBackend {
    /// Queue one operation. Not submitted to the kernel until the next
    /// `flush` / `flush_and_wait`.
    ///
    /// Returns `Err(RingFull)` when no submission slot is free.
    ///
    /// # Safety
    ///
    /// Every pointer reachable from `op` (its `iovec` array, its buffers,
    /// its accept address) must stay valid and unmoved until the completion
    /// carrying `token` has been returned by `poll_completions`. Keeping the
    /// record in an arena slot until then satisfies this: all those regions
    /// are separate heap allocations.
    unsafe fn push(&mut self, token: OpToken, op: &mut OpRecord) -> Result<()>;

    /// Submit queued operations without waiting. Returns how many were
    /// accepted by the kernel.
    fn flush(&mut self) -> Result<usize>;

    /// Submit queued operations and block until at least `want`
    /// completions are ready.
    ///
    /// An interrupted wait (signal) is not an error: it returns `Ok(0)` so
    /// the caller can check its shutdown flag.
    fn flush_and_wait(&mut self, want: usize) -> Result<usize>;

    /// Drain ready completions into `buf` without blocking. Drained
    /// completions are consumed; they will not be reported again.
    fn poll_completions(&mut self, buf: &mut [IoCompletion]) -> usize;

    /// Operations pushed and not yet reported complete.
    fn inflight(&self) -> usize;

    /// Submission queue depth.
    fn capacity(&self) -> usize;
}
