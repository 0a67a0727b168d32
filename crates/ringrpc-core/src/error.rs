//! ringrpc error types.
//!
//! Two classes that must never be confused:
//!
//! - `EngineError`: the environment failed (ring, socket, signal setup,
//!   a negative completion). What happens next is the embedder's call,
//!   expressed as an `ErrorPolicy`.
//! - `RequestError`: the client sent something we cannot serve. Always
//!   recoverable; the dispatcher answers 400 and moves on.

use thiserror::Error;

use crate::token::OpKind;

#[derive(Debug, Error)]
pub enum EngineError {
    /// io_uring setup failed.
    #[error("io_uring setup: {}", os_error(.0))]
    RingSetup(i32),
    /// io_uring submission failed.
    #[error("io_uring submit: {}", os_error(.0))]
    Submit(i32),
    /// Waiting for completions failed.
    #[error("io_uring wait: {}", os_error(.0))]
    Wait(i32),
    /// No submission slot (ring or operation arena) available.
    #[error("ring full")]
    RingFull,
    /// A listening socket setup call failed.
    #[error("{call}(): {}", os_error(.errno))]
    Listener { call: &'static str, errno: i32 },
    /// An asynchronous operation completed with a negative result.
    #[error("async {kind} failed: {}", os_error(.errno))]
    OpFailed { kind: OpKind, errno: i32 },
    /// A completion carried a tag that matches no in-flight record.
    #[error("unknown completion tag {0:#x}")]
    UnknownToken(u64),
    /// Installing a signal disposition failed.
    #[error("signal setup: {}", os_error(.0))]
    Signal(i32),
}

fn os_error(errno: &i32) -> std::io::Error {
    std::io::Error::from_raw_os_error(*errno)
}

/// Errno from an `io::Error`, `-1` when it carries none.
pub fn errno_of(err: &std::io::Error) -> i32 {
    err.raw_os_error().unwrap_or(-1)
}

/// Errno of the last failed libc call on this thread.
pub fn last_errno() -> i32 {
    errno_of(&std::io::Error::last_os_error())
}

/// Malformed client input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestError {
    /// No CRLF within the scan bound.
    #[error("no CRLF within the first {0} bytes")]
    LineTooLong(usize),
    /// The request line holds no method token.
    #[error("empty request line")]
    EmptyLine,
    /// Method other than POST.
    #[error("unsupported method")]
    UnsupportedMethod,
    /// POST without a path token.
    #[error("missing path")]
    MissingPath,
}

/// What the dispatcher does with an `EngineError` raised mid-loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop the loop and hand the error to the embedder.
    #[default]
    Exit,
    /// Log it, release the affected operation and keep serving.
    Continue,
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_failed_names_kind_and_errno() {
        let err = EngineError::OpFailed { kind: OpKind::Read, errno: libc::ECONNRESET };
        let msg = err.to_string();
        assert!(msg.starts_with("async read failed: "), "{msg}");
    }

    #[test]
    fn listener_names_the_call() {
        let err = EngineError::Listener { call: "bind", errno: libc::EADDRINUSE };
        assert!(err.to_string().starts_with("bind(): "));
    }

    #[test]
    fn unknown_token_is_hex() {
        assert_eq!(EngineError::UnknownToken(255).to_string(), "unknown completion tag 0xff");
    }

    #[test]
    fn default_policy_exits() {
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Exit);
    }

    #[test]
    fn request_errors_display() {
        assert_eq!(
            RequestError::LineTooLong(1024).to_string(),
            "no CRLF within the first 1024 bytes"
        );
        assert_eq!(RequestError::UnsupportedMethod.to_string(), "unsupported method");
    }
}
