use crate::manifest::{Manifest, SectionKind};
use crate::validate::ValidationError;
use std::collections::BTreeSet;
use tracing::warn;

/// Keeps every entry of a section.
pub const WILDCARD: &str = "*";

/// Names to keep per section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneSet {
    pub projects: BTreeSet<String>,
    pub libraries: BTreeSet<String>,
}

impl PruneSet {
    pub fn new<P, L>(projects: P, libraries: L) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        Self {
            projects: projects.into_iter().map(Into::into).collect(),
            libraries: libraries.into_iter().map(Into::into).collect(),
        }
    }

    /// Keep everything.
    pub fn all() -> Self {
        Self::new([WILDCARD], [WILDCARD])
    }

    fn names(&self, kind: SectionKind) -> &BTreeSet<String> {
        match kind {
            SectionKind::Projects => &self.projects,
            SectionKind::Libraries => &self.libraries,
        }
    }

    pub fn keeps(&self, kind: SectionKind, name: &str) -> bool {
        let names = self.names(kind);
        names.contains(WILDCARD) || names.contains(name)
    }
}

/// Restrict `manifest` to the entries named in `keep`.
///
/// When nothing is left in either section this fails with
/// [`ValidationError::EmptyAfterPrune`], or warns and returns the empty
/// manifest when `force` is set.
pub fn prune(manifest: &Manifest, keep: &PruneSet, force: bool) -> Result<Manifest, ValidationError> {
    let mut pruned = manifest.clone();
    for kind in SectionKind::ALL {
        for name in keep.names(kind) {
            if name != WILDCARD && !manifest.section(kind).contains(name) {
                warn!("requested {} '{name}' is not in the manifest", kind.singular());
            }
        }
        pruned
            .section_mut(kind)
            .retain(|name, _| keep.keeps(kind, name.as_str()));
    }

    if pruned.projects.is_empty() && pruned.libraries.is_empty() {
        if !force {
            return Err(ValidationError::EmptyAfterPrune);
        }
        warn!("no projects or libraries left after pruning; continuing because force is set");
    }
    Ok(pruned)
}
