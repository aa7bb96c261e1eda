use crate::{errors::Error, Result};

/// Initialize tracing for a postwatch binary.
///
/// `verbose` switches our crates from `info` to `debug`. `RUST_LOG` overrides both.
pub fn init(service_name: &str, verbose: bool) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if verbose { "debug" } else { "info" };
    let service_target = service_name.replace('-', "_");

    // Default: our crates at `level`, warn for everything else.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,postwatch={level},postwatch_core={level},postwatch_proxy={level},\
             postwatch_browser={level},postwatch_slack={level},{service_target}={level}"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_ansi(false)
        .try_init()
        .map_err(|e| Error::Config(format!("logging init failed: {e}")))
}
