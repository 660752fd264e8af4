use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "VST_LOG";

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        concat!(env!("CARGO_CRATE_NAME"), "=debug")
    } else {
        concat!(env!("CARGO_CRATE_NAME"), "=info")
    }
}

/// Installs the stderr subscriber. `VST_LOG` overrides the default filter.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
