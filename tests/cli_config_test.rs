use std::process::Command;
use tempfile::TempDir;

fn csmrepo(dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_csmrepo"));
    command.current_dir(dir).env_remove("CSM_CONFIG");
    command
}

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let output = csmrepo(temp_path)
        .arg("init")
        .output()
        .expect("Failed to run init command");
    assert!(output.status.success());

    let config_path = temp_path.join(".csmrepo/settings.toml");
    assert!(config_path.exists());

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("version = 1"));
    assert!(content.contains("[repository]"));
    assert!(content.contains("[events]"));
    assert!(content.contains("debounce_ms = 300"));

    // A second init without --force keeps the existing file
    let output = csmrepo(temp_path).arg("init").output().unwrap();
    assert!(!output.status.success());

    let output = csmrepo(temp_path).args(["init", "--force"]).output().unwrap();
    assert!(output.status.success());
}

#[test]
fn test_config_command() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let config_dir = temp_path.join(".csmrepo");
    std::fs::create_dir_all(&config_dir).unwrap();
    let config_content = r#"
version = 2
[events]
debounce_ms = 25
"#;
    std::fs::write(config_dir.join("settings.toml"), config_content).unwrap();

    let output = csmrepo(temp_path)
        .arg("config")
        .output()
        .expect("Failed to run config command");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("version = 2"));
    assert!(stdout.contains("debounce_ms = 25"));
}

#[test]
fn test_config_env_override_in_child() {
    let temp_dir = TempDir::new().unwrap();

    let output = csmrepo(temp_dir.path())
        .arg("config")
        .env("CSM_EVENTS__DEBOUNCE_MS", "42")
        .env("CSM_DIAGNOSTICS__STRICT_ASSERTIONS", "true")
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("debounce_ms = 42"));
    assert!(stdout.contains("strict_assertions = true"));
}

#[test]
fn test_dump_without_repository_fails() {
    let temp_dir = TempDir::new().unwrap();

    let output = csmrepo(temp_dir.path())
        .args(["dump", "--unit", "app"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("No repository"));
}
