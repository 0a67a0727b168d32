//! Shutdown trigger.
//!
//! SIGINT and SIGTERM set a process-wide flag and bump an eventfd. The
//! dispatcher keeps a read of that eventfd armed in its ring, so a signal
//! that lands between the flag check and `io_uring_enter` still completes
//! an operation and ends the wait. The handlers are installed without
//! `SA_RESTART`, so a signal delivered during the wait also interrupts it
//! with `EINTR`.
//!
//! SIGPIPE is ignored: a client that hangs up before its response is
//! written must fail that one write, not kill the server.
//!
//! Installing twice, or receiving the signal twice, only re-sets the flag.

use ringrpc_core::error::{EngineError, Result};

use nix::sys::eventfd::{EfdFlags, EventFd};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::debug;

use std::os::fd::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::OnceLock;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);
/// Raw fd of `WAKE`, readable from the handler; -1 until installed.
static WAKE_FD: AtomicI32 = AtomicI32::new(-1);
/// Lives for the rest of the process once created.
static WAKE: OnceLock<EventFd> = OnceLock::new();
/// Outcome of the one real installation (errno on failure).
static INSTALLED: OnceLock<std::result::Result<(), i32>> = OnceLock::new();

extern "C" fn on_shutdown_signal(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
    let fd = WAKE_FD.load(Ordering::SeqCst);
    if fd < 0 {
        return;
    }
    // Only async-signal-safe calls below; errno is restored for the
    // interrupted code.
    unsafe {
        let saved = *libc::__errno_location();
        let one: u64 = 1;
        libc::write(fd, (&one as *const u64).cast(), std::mem::size_of::<u64>());
        *libc::__errno_location() = saved;
    }
}

/// Install the SIGINT/SIGTERM handlers and ignore SIGPIPE.
///
/// Concurrent callers block until the first installation finishes.
pub fn install() -> Result<()> {
    let outcome = *INSTALLED.get_or_init(install_handlers);
    outcome.map_err(EngineError::Signal)
}

fn install_handlers() -> std::result::Result<(), i32> {
    let wake = EventFd::from_value_and_flags(0, EfdFlags::EFD_CLOEXEC).map_err(|e| e as i32)?;
    WAKE_FD.store(wake.as_raw_fd(), Ordering::SeqCst);
    let _ = WAKE.set(wake);

    let stop = SigAction::new(
        SigHandler::Handler(on_shutdown_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    let ignore = SigAction::new(SigHandler::SigIgn, SaFlags::empty(), SigSet::empty());

    // Safety: the handler only touches atomics and calls write(2).
    unsafe {
        sigaction(Signal::SIGINT, &stop).map_err(|e| e as i32)?;
        sigaction(Signal::SIGTERM, &stop).map_err(|e| e as i32)?;
        sigaction(Signal::SIGPIPE, &ignore).map_err(|e| e as i32)?;
    }
    debug!("SIGINT/SIGTERM stop the loop; SIGPIPE ignored");
    Ok(())
}

/// The flag the event loop polls.
pub fn flag() -> &'static AtomicBool {
    &SHUTDOWN
}

/// The eventfd a stop signal writes to, once `install` has succeeded.
/// Reading 8 bytes from it completes after the first signal.
pub fn wake_fd() -> Option<RawFd> {
    WAKE.get().map(|w| w.as_raw_fd())
}
