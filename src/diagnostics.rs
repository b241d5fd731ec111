//! Process-wide diagnostic switches.
//!
//! Invariant checks in the repository are cheap enough to log, but some of
//! them (alias bookkeeping, state-pair consistency) walk whole containers and
//! only run when enabled. Strict mode turns logged violations into panics.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::{DiagnosticsConfig, RepositoryConfig};

static TRACE_PERSISTENCE: AtomicBool = AtomicBool::new(false);
static CHECK_CONSISTENCY: AtomicBool = AtomicBool::new(cfg!(debug_assertions));
static STRICT_ASSERTIONS: AtomicBool = AtomicBool::new(false);

/// Apply diagnostic switches from configuration.
pub fn configure(repository: &RepositoryConfig, diagnostics: &DiagnosticsConfig) {
    TRACE_PERSISTENCE.store(repository.trace_persistence, Ordering::Relaxed);
    CHECK_CONSISTENCY.store(repository.check_consistency, Ordering::Relaxed);
    STRICT_ASSERTIONS.store(diagnostics.strict_assertions, Ordering::Relaxed);
}

/// Whether component reads/writes are traced.
pub fn trace_persistence() -> bool {
    TRACE_PERSISTENCE.load(Ordering::Relaxed)
}

/// Whether container-wide consistency checks run.
pub fn check_consistency() -> bool {
    CHECK_CONSISTENCY.load(Ordering::Relaxed)
}

/// Whether invariant violations panic instead of only being logged.
pub fn strict_assertions() -> bool {
    STRICT_ASSERTIONS.load(Ordering::Relaxed)
}

pub fn set_check_consistency(enabled: bool) {
    CHECK_CONSISTENCY.store(enabled, Ordering::Relaxed);
}

/// Report a violated invariant.
///
/// Always logged. Panics only under strict assertions; otherwise the caller
/// continues with its fallback value.
pub fn invariant_violated(target: &str, message: &str) {
    tracing::error!("[{target}] invariant violated: {message}");
    if strict_assertions() {
        panic!("[{target}] invariant violated: {message}");
    }
}

/// Check an invariant, reporting it through [`invariant_violated`] when false.
///
/// # Examples
/// ```ignore
/// model_assert!("files", total == size, "alias count {total} != {size}");
/// ```
#[macro_export]
macro_rules! model_assert {
    ($target:expr, $cond:expr, $($arg:tt)*) => {
        if !$cond {
            $crate::diagnostics::invariant_violated($target, &format!($($arg)*));
        }
    };
}
