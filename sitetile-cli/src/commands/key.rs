//! Key command - print the cache keys a tile request maps to.

use std::path::Path;

use super::TileArgs;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the key command.
pub fn run(config_path: Option<&Path>, verbose: bool, args: &TileArgs) -> Result<(), CliError> {
    let request = args.to_request()?;
    let runner = CliRunner::new(config_path, verbose)?;

    let app = runner.start_app()?;
    let service = app.service();
    let result = runner.block_on(service.fingerprint(&request));
    runner.block_on(app.shutdown());
    let fingerprint = result?;

    println!("Modified:      {}", fingerprint.modified().to_rfc3339());
    println!("Lookup key:    {}", fingerprint.lookup_key());
    println!("Published key: {}", fingerprint.published_key());
    Ok(())
}
