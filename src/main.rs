use mdeonboard::cli::{handle_onboard, CliArgs};
use mdeonboard::config::OnboardConfig;
use mdeonboard::util::logging::{init_logging, resolve_level, LoggingConfig};
use mdeonboard::VERSION;

use clap::Parser;
use tracing::{debug, error};

fn main() {
    let args = CliArgs::parse();

    let config = match OnboardConfig::from_env().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            init_logging(LoggingConfig::default());
            error!("Configuration error: {}", e);
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let level = resolve_level(
        args.log_level.as_deref(),
        args.verbose,
        args.quiet,
        &config.log_level,
    );
    init_logging(LoggingConfig {
        use_json: config.log_json,
        ..LoggingConfig::with_level(level)
    });

    debug!("mdeonboard v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = handle_onboard(&args, &config);
    std::process::exit(exit_code);
}
