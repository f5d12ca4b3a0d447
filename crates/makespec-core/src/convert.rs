//! Conversion of a resolved manifest into a composer-style dependency
//! manifest.

use crate::CoreError;
use makespec_schema::{EntrySpec, Manifest};
use serde::Serialize;
use std::collections::BTreeMap;

const PLACEHOLDER_VERSION: &str = "Enter correct project name and version number";
const DEFAULT_CORE_MAJOR: u32 = 8;
/// Last platform major whose package versions embed core compatibility.
const LEGACY_MAJOR: u32 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyManifest {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub repositories: Vec<Repository>,
    pub require: BTreeMap<String, String>,
    #[serde(rename = "minimum-stability")]
    pub minimum_stability: String,
    #[serde(rename = "prefer-stable")]
    pub prefer_stable: bool,
    pub extra: DependencyExtra,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyExtra {
    #[serde(rename = "installer-paths")]
    pub installer_paths: BTreeMap<String, Vec<String>>,
    /// Patch URLs by dependency, then by description.
    pub patches: BTreeMap<String, BTreeMap<String, String>>,
}

/// Install locations routed by package type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallCategory {
    Core,
    ModuleContrib,
    ModuleCustom,
    ThemeContrib,
    ThemeCustom,
    ProfileContrib,
    Library,
    ToolExtension,
}

impl InstallCategory {
    pub const ALL: [InstallCategory; 8] = [
        InstallCategory::Core,
        InstallCategory::ModuleContrib,
        InstallCategory::ModuleCustom,
        InstallCategory::ThemeContrib,
        InstallCategory::ThemeCustom,
        InstallCategory::ProfileContrib,
        InstallCategory::Library,
        InstallCategory::ToolExtension,
    ];

    pub fn path(self) -> &'static str {
        match self {
            InstallCategory::Core => "web/core",
            InstallCategory::ModuleContrib => "web/modules/contrib/{$name}",
            InstallCategory::ModuleCustom => "web/modules/custom/{$name}",
            InstallCategory::ThemeContrib => "web/themes/contrib/{$name}",
            InstallCategory::ThemeCustom => "web/themes/custom/{$name}",
            InstallCategory::ProfileContrib => "web/profiles/contrib/{$name}",
            InstallCategory::Library => "web/libraries/{$name}",
            InstallCategory::ToolExtension => "drush/contrib/{$name}",
        }
    }

    pub fn package_type(self) -> &'static str {
        match self {
            InstallCategory::Core => "type:drupal-core",
            InstallCategory::ModuleContrib => "type:drupal-module",
            InstallCategory::ModuleCustom => "type:drupal-custom-module",
            InstallCategory::ThemeContrib => "type:drupal-theme",
            InstallCategory::ThemeCustom => "type:drupal-custom-theme",
            InstallCategory::ProfileContrib => "type:drupal-profile",
            InstallCategory::Library => "type:drupal-library",
            InstallCategory::ToolExtension => "type:drupal-drush",
        }
    }
}

fn core_package(major: u32) -> &'static str {
    if major <= LEGACY_MAJOR {
        "drupal/drupal"
    } else {
        "drupal/core"
    }
}

/// `8.x` becomes `8.*`.
fn core_constraint(version: &str) -> String {
    version.replace('x', "*")
}

/// Version requirement for a contributed project, or `None` when the
/// manifest gives nothing to derive one from.
///
/// `#revision` pins only a branch or tag; an explicit version stands alone.
fn project_constraint(spec: &EntrySpec, major: u32) -> Option<String> {
    let (base, revision) = match &spec.version {
        Some(version) => (version.clone(), None),
        None => {
            let download = spec.download.as_ref()?;
            let base = download.branch.clone().or_else(|| download.tag.clone())?;
            (base, download.revision.as_deref())
        }
    };
    let mut constraint = base.replace('x', "0");
    if major <= LEGACY_MAJOR {
        constraint = format!("{major}.{constraint}");
    }
    if let Some(revision) = revision {
        constraint = format!("{constraint}#{revision}");
    }
    Some(constraint)
}

fn patch_label(dependency: &str, key: &str) -> String {
    if key.bytes().all(|b| b.is_ascii_digit()) {
        format!("Enter {dependency} patch #{key} description here")
    } else {
        key.to_owned()
    }
}

/// Translate a resolved manifest into a dependency manifest.
pub fn convert(manifest: &Manifest) -> DependencyManifest {
    let major = manifest.core_major().unwrap_or(DEFAULT_CORE_MAJOR);
    let core_key = core_package(major);

    let mut require = BTreeMap::from([
        ("composer/installers".to_owned(), "^1.0.20".to_owned()),
        ("cweagans/composer-patches".to_owned(), "~1.0".to_owned()),
    ]);
    if let Some(core) = &manifest.core_version {
        require.insert(core_key.to_owned(), core_constraint(core));
    }

    let mut patches: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for (name, spec) in manifest.projects.iter() {
        let dependency = if spec.is_core(name) {
            if let Some(version) = &spec.version {
                require.insert(core_key.to_owned(), core_constraint(version));
            }
            core_key.to_owned()
        } else {
            let dependency = format!("drupal/{name}");
            let constraint =
                project_constraint(spec, major).unwrap_or_else(|| PLACEHOLDER_VERSION.to_owned());
            require.insert(dependency.clone(), constraint);
            dependency
        };

        for (key, patch) in &spec.patches {
            patches
                .entry(dependency.clone())
                .or_default()
                .insert(patch_label(&dependency, key), patch.url().to_owned());
        }
    }

    for (name, spec) in manifest.libraries.iter() {
        let version = spec
            .version
            .clone()
            .unwrap_or_else(|| PLACEHOLDER_VERSION.to_owned());
        require.insert(format!("Verify project name: {name}"), version);
    }

    let installer_paths = InstallCategory::ALL
        .iter()
        .map(|c| (c.path().to_owned(), vec![c.package_type().to_owned()]))
        .collect();

    DependencyManifest {
        name: "drupal/drupal-project".to_owned(),
        description: "Project converted from a makespec build manifest".to_owned(),
        kind: "project".to_owned(),
        repositories: vec![Repository {
            kind: "composer".to_owned(),
            url: format!("https://packages.drupal.org/{major}"),
        }],
        require,
        minimum_stability: "dev".to_owned(),
        prefer_stable: true,
        extra: DependencyExtra {
            installer_paths,
            patches,
        },
    }
}

pub fn to_json_pretty(manifest: &DependencyManifest) -> Result<String, CoreError> {
    Ok(serde_json::to_string_pretty(manifest)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use makespec_schema::{parse_manifest_str, validate};

    fn converted(input: &str) -> DependencyManifest {
        convert(&validate(&parse_manifest_str(input).unwrap()).unwrap())
    }

    #[test]
    fn seeds_installers_and_core() {
        let deps = converted("core: 8.x\napi: 2\n");
        assert_eq!(deps.require["composer/installers"], "^1.0.20");
        assert_eq!(deps.require["cweagans/composer-patches"], "~1.0");
        assert_eq!(deps.require["drupal/core"], "8.*");
        assert_eq!(deps.repositories[0].url, "https://packages.drupal.org/8");
    }

    #[test]
    fn legacy_core_uses_full_distribution_and_prefixed_versions() {
        let deps = converted("core: 7.x\nprojects:\n  drupal: {}\n  views: '3.x'\n");
        assert_eq!(deps.require["drupal/drupal"], "7.*");
        assert_eq!(deps.require["drupal/views"], "7.3.0");
        assert!(!deps.require.contains_key("drupal/core"));
    }

    #[test]
    fn core_project_version_replaces_seed() {
        let deps = converted("core: 8.x\nprojects:\n  drupal:\n    version: 8.3.x\n");
        assert_eq!(deps.require["drupal/core"], "8.3.*");
        assert!(!deps.require.contains_key("drupal/drupal"));
    }

    #[test]
    fn vcs_projects_use_branch_and_revision() {
        let deps = converted(
            r"
core: 8.x
projects:
  devel:
    download:
      type: git
      branch: 8.x-1.x
      revision: abc123
  unknown: {}
",
        );
        assert_eq!(deps.require["drupal/devel"], "8.0-1.0#abc123");
        assert_eq!(deps.require["drupal/unknown"], PLACEHOLDER_VERSION);
    }

    #[test]
    fn explicit_version_ignores_revision() {
        let deps = converted(
            r"
core: 8.x
projects:
  views:
    version: '1.3'
    download:
      type: git
      revision: abc123
",
        );
        assert_eq!(deps.require["drupal/views"], "1.3");
    }

    #[test]
    fn patches_are_flattened_with_labels() {
        let deps = converted(
            r"
core: 8.x
projects:
  views:
    version: '3.1'
    patch:
      - https://example.com/one.patch
  token:
    patches:
      'Fix tokens': https://example.com/fix.patch
",
        );
        let views = &deps.extra.patches["drupal/views"];
        assert_eq!(
            views["Enter drupal/views patch #0 description here"],
            "https://example.com/one.patch"
        );
        assert_eq!(
            deps.extra.patches["drupal/token"]["Fix tokens"],
            "https://example.com/fix.patch"
        );
    }

    #[test]
    fn libraries_need_verification() {
        let deps = converted("core: 8.x\nlibraries:\n  jquery: {}\n");
        assert_eq!(deps.require["Verify project name: jquery"], PLACEHOLDER_VERSION);
    }

    #[test]
    fn routes_every_install_category() {
        let deps = converted("core: 8.x\n");
        assert_eq!(deps.extra.installer_paths.len(), InstallCategory::ALL.len());
        assert_eq!(
            deps.extra.installer_paths["web/modules/custom/{$name}"],
            vec!["type:drupal-custom-module"]
        );
    }

    #[test]
    fn json_keys_follow_declaration_order() {
        let json = to_json_pretty(&converted("core: 8.x\n")).unwrap();
        let order: Vec<usize> = [
            "\"name\"",
            "\"description\"",
            "\"type\"",
            "\"repositories\"",
            "\"require\"",
            "\"minimum-stability\"",
            "\"prefer-stable\"",
            "\"installer-paths\"",
            "\"patches\"",
        ]
        .iter()
        .map(|key| json.find(key).unwrap())
        .collect();
        assert!(order.windows(2).all(|w| w[0] < w[1]), "{json}");
    }
}
