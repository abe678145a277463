use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use maskfe::cli::{self, CliArgs};
use maskfe::config::MaskerConfig;
use maskfe::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // Start logging before the config is read so its repair warnings land in
    // the session log.
    logger::init(LevelFilter::Info);

    let config = match MaskerConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    log::set_max_level(if args.verbose {
        LevelFilter::Debug
    } else {
        config.log_level()
    });

    cli::run(args, &config)
}
