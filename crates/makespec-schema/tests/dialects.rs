use makespec_schema::{
    normalize, parse_detected, parse_manifest_file, parse_manifest_str, validate, Dialect,
    Manifest,
};

const YAML: &str = r"
core: 7.x
api: 2
projects:
  drupal: {}
  views:
    version: '3.8'
    subdir: contrib
    patch:
      - https://example.com/views.patch
libraries:
  jquery:
    download:
      type: file
      url: https://example.com/jquery.zip
    destination: libraries
";

const INI: &str = r"
; same build in the flat dialect
core = 7.x
api = 2

projects[] = drupal
projects[views][version] = 3.8
projects[views][subdir] = contrib
projects[views][patch][] = https://example.com/views.patch

libraries[jquery][download][type] = file
libraries[jquery][download][url] = https://example.com/jquery.zip
libraries[jquery][destination] = libraries
";

fn without_format(mut manifest: Manifest) -> Manifest {
    manifest.detected_format = None;
    manifest
}

#[test]
fn both_dialects_describe_the_same_manifest() {
    let yaml = parse_manifest_str(YAML).unwrap();
    let ini = parse_manifest_str(INI).unwrap();
    assert_eq!(yaml.detected_format, Some(Dialect::Yaml));
    assert_eq!(ini.detected_format, Some(Dialect::Ini));
    assert_eq!(without_format(yaml), without_format(ini));
}

#[test]
fn validated_output_matches_across_dialects() {
    let yaml = validate(&parse_manifest_str(YAML).unwrap()).unwrap();
    let ini = validate(&parse_manifest_str(INI).unwrap()).unwrap();
    assert_eq!(
        serde_json::to_value(&yaml).unwrap(),
        serde_json::to_value(&ini).unwrap()
    );
}

#[test]
fn normalization_is_idempotent_for_both_dialects() {
    for raw in [YAML, INI] {
        let (tree, _) = parse_detected(raw).unwrap();
        let once = normalize(tree);
        assert_eq!(normalize(once.clone()), once);
    }
}

#[test]
fn parses_manifest_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("site.make");
    std::fs::write(&path, INI).unwrap();
    let manifest = parse_manifest_file(&path).unwrap();
    assert_eq!(manifest.projects.len(), 2);
    assert_eq!(manifest.projects.names().next().unwrap(), "drupal");
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = parse_manifest_file(dir.path().join("absent.make")).unwrap_err();
    assert!(err.to_string().contains("failed to read manifest file"));
}
