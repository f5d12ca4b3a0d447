use super::{write_output, SourceArgs, EXIT_SUCCESS};
use crate::config::CliConfig;
use std::path::Path;

pub fn run(config: &CliConfig, args: &SourceArgs, output: Option<&Path>) -> Result<u8, String> {
    let resolution = args.resolve(config)?;
    let dependencies = makespec_core::convert(&resolution.manifest);
    let text = makespec_core::to_json_pretty(&dependencies).map_err(|e| e.to_string())?;
    write_output(output, &text)?;
    if let Some(path) = output {
        eprintln!("wrote {}", path.display());
    }
    Ok(EXIT_SUCCESS)
}
