//! # ringrpc-core: types shared by every ringrpc component
//!
//! This crate defines what flows between the ring and the dispatcher:
//! the 64-bit completion tag, the per-submission operation record, the
//! owned I/O buffers a record carries, the error taxonomy and the
//! `IoBackend` trait the dispatcher drives.
//!
//! ## Ownership model
//!
//! > "A buffer belongs to exactly one operation record. The record
//! >  belongs to the arena while in flight. Dropping the record frees
//! >  everything it owns."
//!
//! There is no manual free anywhere: releasing an operation is a `drop`.

pub mod token;
pub mod op;
pub mod buffer;
pub mod io_backend;
pub mod error;
pub mod env;
pub mod logging;
