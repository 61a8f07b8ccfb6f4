use anyhow::Result;
use clap::Parser;
use tracing::info;

use dirmirror::RootDispatcher;
use dirmirror::cli::Cli;
use dirmirror::config::Settings;
use dirmirror::logging;
use dirmirror::output::print_summary;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::resolve(cli)?;

    let log_file = logging::init(settings.log_level, &settings.log_output)?;
    info!(log = %log_file.display(), "logging initialised");
    info!(path = %settings.source.display(), "watching directory");
    info!(path = %settings.destination.display(), "backing up to");

    let dispatcher = RootDispatcher::new(
        settings.source.clone(),
        settings.destination.clone(),
        settings.ignore.clone(),
    );
    let summary = dispatcher
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            eprintln!("Quitting...");
        })
        .await?;

    print_summary(&summary, settings.json);
    Ok(())
}
