/// Logging Setup
///
/// Installs a tracing subscriber writing to stderr. Stdout is reserved for
/// the STDIO transport, so nothing may log there. `RUST_LOG` takes precedence
/// over the configured level; actix's request logger reaches the subscriber
/// through the `log` bridge that `try_init` installs.

use tracing_subscriber::EnvFilter;

use crate::core::config::LogFormat;

/// Build the filter: `RUST_LOG` when set, otherwise `level`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = match format {
        LogFormat::Text => builder.with_ansi(false).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    // try_init hands back a boxed error, which anyhow cannot convert with `?`
    installed.map_err(|e| anyhow::anyhow!(e))
}
