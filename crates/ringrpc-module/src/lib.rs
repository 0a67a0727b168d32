//! # ringrpc-module: kernel-facing implementations
//!
//! Everything here makes system calls; everything above it only sees
//! `ringrpc-core` types.
//!
//! | Concern            | Impl           | Kernel interface             |
//! |--------------------|----------------|------------------------------|
//! | `IoBackend`        | `BasicIoUring` | io_uring (accept/readv/writev) |
//! | Listening endpoint | `Listener`     | socket/setsockopt/bind/listen |
//! | Shutdown trigger   | `signal`       | sigaction(SIGINT, SIGTERM)   |

pub mod basic_iouring;
pub mod listener;
pub mod signal;
