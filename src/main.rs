use clap::Parser;
use cli::{Cli, Commands};
use dotenv::dotenv;
use indicatif::MultiProgress;
use log::LevelFilter;

mod cli;
mod commands;
mod config;
mod err;
mod glob;
mod progress_bar;
mod source;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv();

    let args = Cli::parse();

    let mut binding = env_logger::Builder::new();
    let logger = binding
        .filter_level(LevelFilter::Info)
        .filter_module("svg2png", args.verbose.log_level_filter())
        .format_timestamp(None)
        .format_module_path(false)
        .build();

    let level = logger.filter();

    let multi_progress = MultiProgress::new();
    indicatif_log_bridge::LogWrapper::new(multi_progress.clone(), logger).try_init()?;

    log::set_max_level(level);

    let result = match args.command {
        Commands::Convert(args) => commands::convert::convert(args).await,
        Commands::Batch(args) => commands::batch::batch(args, multi_progress).await,
    };

    if let Err(err) = &result {
        log::error!("{}", err::format_anyhow_chain(err));
        std::process::exit(1);
    }

    Ok(())
}
