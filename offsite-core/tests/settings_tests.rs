//! Settings load / save integration tests against a throwaway home directory.

use assert_fs::prelude::*;
use offsite_core::{
    naming::SuffixMode,
    settings::{self, Settings},
    SettingsError,
};
use predicates::prelude::predicate;

#[test]
fn missing_file_yields_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let loaded = settings::load_at(home.path()).expect("load");
    assert_eq!(loaded, Settings::default());
}

#[test]
fn explicit_missing_file_is_not_found() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let err = settings::load_from(&home.path().join("nope.yaml")).unwrap_err();
    assert!(matches!(err, SettingsError::NotFound { .. }), "got: {err}");
}

#[test]
fn corrupt_yaml_reports_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let file = home.child(".offsite/config.yaml");
    file.write_str("naming: [unclosed").expect("write");

    let err = settings::load_at(home.path()).unwrap_err();
    assert!(matches!(err, SettingsError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn zero_transfers_is_rejected() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".offsite/config.yaml")
        .write_str("transfer:\n  transfers: 0\n")
        .expect("write");
    assert!(settings::load_at(home.path()).is_err());
}

#[test]
fn save_then_load_preserves_overrides() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let mut s = Settings::default();
    s.naming.suffix = SuffixMode::ClockLetter;
    s.sync_tool.remove_config_after_run = true;
    s.secrets.secret_id = Some("e4d3d765".into());

    let path = settings::save_at(home.path(), &s, false).expect("save");
    home.child(".offsite/config.yaml").assert(predicate::path::exists());
    home.child(".offsite/config.yaml.tmp")
        .assert(predicate::path::missing());

    let loaded = settings::load_from(&path).expect("load");
    assert_eq!(loaded, s);
}

#[test]
fn save_refuses_to_overwrite_without_force() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    settings::save_at(home.path(), &Settings::default(), false).expect("first save");
    let err = settings::save_at(home.path(), &Settings::default(), false).unwrap_err();
    assert!(matches!(err, SettingsError::AlreadyExists { .. }));
    settings::save_at(home.path(), &Settings::default(), true).expect("forced save");
}

#[cfg(unix)]
#[test]
fn saved_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let home = assert_fs::TempDir::new().expect("tempdir");
    let path = settings::save_at(home.path(), &Settings::default(), false).expect("save");
    let mode = std::fs::metadata(path).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o600);
}
