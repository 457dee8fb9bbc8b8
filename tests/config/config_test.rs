//! Coverage for config parsing and registry construction.

use std::path::Path;
use std::time::Duration;

use bondprompt::config::{build_registry, load_config, load_or_default, Config, TemplatesConfig};

#[test]
fn empty_file_yields_defaults() {
    let config: Config = toml::from_str("").expect("parse");
    assert_eq!(config.generator.model, "qwen3:0.6b");
    assert_eq!(config.generator.max_attempts, 1);
    assert!(config.templates.dir.is_none());
    assert!(config.logging.dir.is_none());
    assert_eq!(config.logging.level, "info");
}

#[test]
fn parse_full_config() {
    let toml_str = r#"
[generator]
base_url = "http://gpu-box:11434"
model = "qwen3:8b"
timeout_secs = 90
max_attempts = 3

[templates]
dir = "/etc/bondprompt/templates"
import = "/etc/bondprompt/overrides.json"

[logging]
dir = "/var/log/bondprompt"
level = "bondprompt::recovery=debug,info"
"#;
    let config: Config = toml::from_str(toml_str).expect("parse");
    assert_eq!(config.generator.base_url, "http://gpu-box:11434");
    assert_eq!(config.generator.model, "qwen3:8b");
    assert_eq!(config.generator.timeout(), Duration::from_secs(90));
    assert_eq!(config.generator.max_attempts, 3);
    assert_eq!(
        config.templates.dir.as_deref(),
        Some(Path::new("/etc/bondprompt/templates"))
    );
    assert_eq!(
        config.logging.dir.as_deref(),
        Some(Path::new("/var/log/bondprompt"))
    );
    assert_eq!(config.logging.level, "bondprompt::recovery=debug,info");
}

#[test]
fn partial_section_keeps_other_defaults() {
    let config: Config = toml::from_str("[generator]\nmodel = \"m\"\n").expect("parse");
    assert_eq!(config.generator.model, "m");
    assert_eq!(config.generator.base_url, "http://127.0.0.1:11434");
    assert_eq!(config.generator.timeout_secs, 30);
}

#[test]
fn load_config_reads_file() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("bondprompt.toml");
    std::fs::write(&path, "[generator]\nmax_attempts = 2\n").expect("write");

    let config = load_config(&path).expect("load");
    assert_eq!(config.generator.max_attempts, 2);
    assert!(load_or_default(Some(&path)).is_ok());
}

#[test]
fn malformed_config_is_an_error() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let path = tmp.path().join("bad.toml");
    std::fs::write(&path, "[generator\nmodel = ").expect("write");

    let err = load_config(&path).expect_err("malformed");
    assert!(err.to_string().contains("failed to parse config"));
}

#[test]
fn explicit_missing_config_is_an_error() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    assert!(load_or_default(Some(&tmp.path().join("absent.toml"))).is_err());
}

#[test]
fn registry_applies_dir_then_import() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let dir = tmp.path().join("templates");
    std::fs::create_dir(&dir).expect("mkdir");
    std::fs::write(
        dir.join("basic.toml"),
        "id = \"single-basic\"\nbody = \"from dir {text}\"\n",
    )
    .expect("write toml");
    let import = tmp.path().join("overrides.json");
    std::fs::write(&import, r#"{"single-basic": "from import {text}"}"#).expect("write json");

    let registry = build_registry(&TemplatesConfig {
        dir: Some(dir),
        import: Some(import),
    })
    .expect("registry");
    assert_eq!(
        registry.get("single-basic").map(|t| t.body.as_str()),
        Some("from import {text}")
    );
}

#[test]
fn registry_reports_missing_template_dir() {
    let err = build_registry(&TemplatesConfig {
        dir: Some("/definitely/not/here".into()),
        import: None,
    })
    .expect_err("missing dir");
    assert!(err.to_string().contains("failed to load templates"));
}
