use std::future::Future;

/// Diagnostic code reported when a check fails at the transport level
/// (connect error, timeout, DNS failure). Never collides with a real
/// application-level code.
pub const TRANSPORT_FAILURE: i32 = -1;

/// Result of a single status check. Probe failures are data, not errors.
#[derive(Debug, Clone)]
pub struct ProbeStatus {
    pub ok: bool,
    pub code: i32,
    pub text: String,
}

impl ProbeStatus {
    pub fn transport_failure() -> Self {
        Self {
            ok: false,
            code: TRANSPORT_FAILURE,
            text: String::new(),
        }
    }
}

/// A single monitored resource. Implementations must bound their own
/// timeouts and must never fail: any transport-level problem is reported
/// as `ProbeStatus::transport_failure()`.
pub trait Probe: Send + Sync + 'static {
    /// Stable unique identifier, used as the ledger key.
    fn name(&self) -> &str;

    /// Performs exactly one status check.
    fn check(&self) -> impl Future<Output = ProbeStatus> + Send;
}
