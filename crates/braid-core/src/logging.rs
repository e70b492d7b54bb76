//! Tracing subscriber setup.
//!
//! Log context is structured via `tracing` fields; hosts embedding the
//! engine call [`init_subscriber`] once at startup.

/// Initialize the global tracing subscriber with stderr output.
///
/// Call once at application startup. Subsequent calls are no-ops.
/// `RUST_LOG` takes precedence over the `level` argument.
pub fn init_subscriber(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact();

    // try_init is a no-op if a subscriber is already installed
    let _ = subscriber.try_init();
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_subscriber_is_idempotent() {
        init_subscriber("warn");
        init_subscriber("debug");
    }
}
