use super::{json_pretty, write_output, SourceArgs, EXIT_SUCCESS};
use crate::config::CliConfig;
use clap::ValueEnum;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

pub fn run(
    config: &CliConfig,
    args: &SourceArgs,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<u8, String> {
    let resolution = args.resolve(config)?;
    let text = match format {
        OutputFormat::Json => json_pretty(&resolution.manifest)?,
        OutputFormat::Yaml => serde_yaml::to_string(&resolution.manifest)
            .map_err(|e| format!("YAML serialization failed: {e}"))?,
    };
    write_output(output, &text)?;
    Ok(EXIT_SUCCESS)
}
