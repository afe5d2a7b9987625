use tracing_subscriber::{fmt, EnvFilter};

/// Our own spans at `info`; pool and HTTP internals only when they warn.
pub const DEFAULT_FILTER: &str = "assistant_memory=info,r2d2=warn,hyper=warn,reqwest=warn,info";

/// Installs the global fmt subscriber on stderr so stdout stays clean for CLI
/// output. `RUST_LOG` replaces `DEFAULT_FILTER` entirely.
pub fn init_tracing() {
    init_tracing_with(DEFAULT_FILTER);
}

/// Like `init_tracing` with a caller-chosen fallback filter. A second call
/// leaves the first subscriber in place.
pub fn init_tracing_with(default_filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(DEFAULT_FILTER.parse::<EnvFilter>().is_ok());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing_with("debug");
        init_tracing();
        tracing::info!("subscriber installed");
    }
}
