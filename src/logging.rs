use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_DIRECTIVES: &str = "warn,mess_planner=info";
const VERBOSE_LOG_DIRECTIVES: &str = "info,mess_planner=debug";

/// Installs the stderr subscriber. `RUST_LOG` overrides the built-in levels;
/// `verbose` only changes the default.
pub fn init_logging(verbose: bool) -> Result<()> {
    let defaults = if verbose {
        VERBOSE_LOG_DIRECTIVES
    } else {
        DEFAULT_LOG_DIRECTIVES
    };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(defaults))
        .map_err(|err| anyhow!("invalid log filter: {}", err))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("logging already initialised: {}", err))
}
