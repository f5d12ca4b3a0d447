use crate::manifest::{Manifest, SectionKind};
use tracing::{debug, warn};

/// Fill unset attributes of every entry from the manifest's `defaults`.
///
/// Attributes an entry already sets are never replaced; nested `download` and
/// `patches` maps are filled key by key. Defaults for a section other than
/// `projects` or `libraries` are skipped with a warning.
pub fn apply_defaults(manifest: &mut Manifest) {
    let defaults = manifest.defaults.clone();
    for (section, attributes) in &defaults {
        let Ok(kind) = section.parse::<SectionKind>() else {
            warn!("ignoring defaults for unknown section '{section}'");
            continue;
        };
        let entries = manifest.section_mut(kind);
        if entries.is_empty() {
            debug!("defaults for '{kind}' have no entries to apply to");
            continue;
        }
        for (name, spec) in entries.iter_mut() {
            debug!("applying {kind} defaults to '{name}'");
            spec.fill_from(attributes);
        }
    }
}
