use anyhow::Result;
use fragment_harness::config::HarnessConfig;
use fragment_harness::utils::validation::Validate;
use fragment_harness::HarnessError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key| vars.get(key).cloned()
}

#[test]
fn test_profile_file_overrides_environment() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("harness.toml");
    std::fs::write(
        &path,
        r#"
[api]
host = "http://staging:9000/"

[poller]
interval_ms = 250
deadline_secs = 120

[relay]
listen_port = 9999
bandwidth_kbps = 200

[paths]
uploads_dir = "/srv/uploads"
storage_owner = "nuno"
snapshot_dir = "out"
"#,
    )?;

    let settings = HarnessConfig::from_file(&path)?.resolve(lookup(&[
        ("API_HOST", "http://ignored:1"),
        ("API_TOKEN", "env-token"),
        ("MUSIC_DIR", "/music"),
    ]))?;

    assert_eq!(settings.api.host, "http://staging:9000");
    assert_eq!(settings.api.token, "env-token");
    assert_eq!(settings.api.music_dir, Some(PathBuf::from("/music")));
    assert_eq!(settings.api.uploads_dir, Some(PathBuf::from("/srv/uploads")));
    assert_eq!(settings.poller.interval, Duration::from_millis(250));
    assert_eq!(settings.poller.deadline, Some(Duration::from_secs(120)));
    assert_eq!(settings.relay.bandwidth_bytes_per_sec(), 200 * 1024);
    assert_eq!(settings.snapshot_dir, PathBuf::from("out"));
    settings.validate()?;
    Ok(())
}

#[test]
fn test_profile_without_token_anywhere_fails() -> Result<()> {
    let config = HarnessConfig::from_toml_str("[api]\nhost = \"http://localhost:38707\"\n")?;
    let err = config.resolve(lookup(&[])).unwrap_err();
    assert!(matches!(err, HarnessError::MissingConfigError { ref field } if field == "API_TOKEN"));
    assert_eq!(err.exit_code(), 3);
    Ok(())
}

#[test]
fn test_out_of_range_interval_fails_validation() -> Result<()> {
    let config = HarnessConfig::from_toml_str("[poller]\ninterval_ms = 5\n")?;
    let settings = config.resolve(lookup(&[("API_TOKEN", "t")]))?;
    assert!(settings.validate().is_err());
    Ok(())
}
