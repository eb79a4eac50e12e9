use std::process::Command;

#[test]
fn init_creates_valid_toml() {
    let dir = tempfile::tempdir().unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_diffscribe"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(
        output.status.success(),
        "diffscribe init failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let config_path = dir.path().join(".diffscribe.toml");
    assert!(config_path.exists(), ".diffscribe.toml should exist");

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[llm]"));
    assert!(content.contains("[review]"));

    // Every key is commented out, so this must parse to the defaults.
    let config: diffscribe_core::DiffscribeConfig = toml::from_str(&content).unwrap();
    assert_eq!(config.review.batch_size, 3);
}

#[test]
fn init_refuses_if_exists() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".diffscribe.toml"), "# existing").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_diffscribe"))
        .arg("init")
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let content = std::fs::read_to_string(dir.path().join(".diffscribe.toml")).unwrap();
    assert_eq!(content, "# existing");
}
