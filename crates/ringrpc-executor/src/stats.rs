//! Dispatcher counters.

use tracing::info;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub accepts: u64,
    /// Accepted connections closed at once because `max_conns` was reached.
    pub rejected: u64,
    pub requests: u64,
    /// 200 responses submitted.
    pub ok: u64,
    /// 400 responses submitted.
    pub bad_requests: u64,
    /// Write completions observed.
    pub responses: u64,
    /// Reads that returned 0 bytes.
    pub empty_reads: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    pub errors: u64,
}

impl Stats {
    pub fn log(&self, live_conns: usize, elapsed_secs: f64) {
        let rps = if elapsed_secs > 0.0 {
            self.responses as f64 / elapsed_secs
        } else {
            0.0
        };
        info!(
            "[{:.1}s] conns={} accepts={} rejected={} req={} ok={} bad={} resp={} rps={:.0} empty={} bytes_in={} bytes_out={} err={}",
            elapsed_secs,
            live_conns,
            self.accepts,
            self.rejected,
            self.requests,
            self.ok,
            self.bad_requests,
            self.responses,
            rps,
            self.empty_reads,
            self.bytes_in,
            self.bytes_out,
            self.errors,
        );
    }
}
