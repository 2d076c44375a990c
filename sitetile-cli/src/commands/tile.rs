//! Tile command - compute one tile through the facade.

use std::path::Path;

use sitetile::config::format_size;
use sitetile::service::PayloadSource;

use super::TileArgs;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the tile command.
pub fn run(
    config_path: Option<&Path>,
    verbose: bool,
    args: &TileArgs,
    output: Option<&Path>,
) -> Result<(), CliError> {
    let request = args.to_request()?;
    let runner = CliRunner::new(config_path, verbose)?;
    runner.log_startup("tile");

    let app = runner.start_app()?;
    let service = app.service();
    let result = runner.block_on(service.get_tile(&request));
    // Shut down before reporting so a pending write-back gets a chance to land.
    runner.block_on(app.shutdown());
    let payload = result?;

    let source = match payload.source() {
        PayloadSource::Cache => "cache",
        PayloadSource::Computed => "computed",
        PayloadSource::Coalesced => "coalesced",
    };

    if payload.is_empty() {
        println!("Tile {} has no features ({})", request.coord(), source);
        return Ok(());
    }

    match output {
        Some(path) => {
            std::fs::write(path, payload.bytes())?;
            println!(
                "Wrote {} to {} ({})",
                format_size(payload.len() as u64),
                path.display(),
                source
            );
        }
        None => println!(
            "Tile {} is {} ({})",
            request.coord(),
            format_size(payload.len() as u64),
            source
        ),
    }
    Ok(())
}
