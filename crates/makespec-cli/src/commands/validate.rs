use super::{
    colorize_status, json_pretty, report_kept_dir, spin_fail, spin_ok, spinner, SourceArgs,
    EXIT_MANIFEST_ERROR, EXIT_SUCCESS,
};
use crate::config::CliConfig;
use makespec_core::CoreError;

pub fn run(config: &CliConfig, args: &SourceArgs, json: bool) -> Result<u8, String> {
    let resolver = args.resolver(config)?;
    let source = args.manifest_source();
    let pb = spinner(&format!("validating {source}…"));

    match resolver.resolve(&source, args.prune_set().as_ref()) {
        Ok(resolution) => {
            spin_ok(&pb, "validation complete");
            report_kept_dir(&resolution);
            let projects = resolution.manifest.projects.len();
            let libraries = resolution.manifest.libraries.len();
            if json {
                let payload = serde_json::json!({
                    "source": resolution.origin,
                    "valid": true,
                    "projects": projects,
                    "libraries": libraries,
                    "errors": [],
                });
                println!("{}", json_pretty(&payload)?);
            } else {
                println!(
                    "{} {} ({projects} projects, {libraries} libraries)",
                    colorize_status("ok"),
                    resolution.origin
                );
            }
            Ok(EXIT_SUCCESS)
        }
        Err(CoreError::Invalid { context, errors }) => {
            spin_fail(&pb, "validation failed");
            if json {
                let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
                let payload = serde_json::json!({
                    "source": context,
                    "valid": false,
                    "errors": messages,
                });
                println!("{}", json_pretty(&payload)?);
            } else {
                println!(
                    "{} {context}: {} problem(s)",
                    colorize_status("invalid"),
                    errors.len()
                );
                for error in &errors {
                    println!("  - {error}");
                }
            }
            Ok(EXIT_MANIFEST_ERROR)
        }
        Err(e) => {
            spin_fail(&pb, "validation failed");
            Err(e.to_string())
        }
    }
}
