use super::*;

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, contents.as_bytes()).expect("write file");
}

#[test]
fn missing_path_yields_defaults() {
    let settings = load_settings(None).expect("load defaults");
    assert_eq!(settings.request_delay_ms, 6_000);
    assert_eq!(settings.progress_every, 10);
    assert_eq!(settings.retry.max_attempts, 1);
    assert_eq!(settings.listen_addr, "0.0.0.0:5000");
}

#[test]
fn partial_file_keeps_other_defaults() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("settings.json");
    write_file(
        &path,
        r#"{"request_delay_ms": 0, "retry": {"max_attempts": 3}, "lm": {"command": "ollama run llama3"}}"#,
    );

    let settings = load_settings(Some(&path)).expect("load settings");
    assert_eq!(settings.request_delay_ms, 0);
    assert_eq!(settings.retry.max_attempts, 3);
    assert_eq!(settings.retry.backoff_ms, 0);
    assert_eq!(settings.lm.command.as_deref(), Some("ollama run llama3"));
    assert_eq!(settings.lm.model, "gpt-3.5-turbo");
    assert_eq!(settings.base_list, PathBuf::from("us_universities.csv"));
}

#[test]
fn unknown_fields_are_rejected() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("settings.json");
    write_file(&path, r#"{"delay": 5}"#);
    assert!(load_settings(Some(&path)).is_err());
}

#[test]
fn invalid_values_are_rejected() {
    let mut settings = Settings::default();
    settings.retry.max_attempts = 0;
    assert!(validate_settings(&settings).is_err());

    let mut settings = Settings::default();
    settings.progress_every = 0;
    assert!(validate_settings(&settings).is_err());

    let mut settings = Settings::default();
    settings.lm.command = Some("  ".to_string());
    assert!(validate_settings(&settings).is_err());
}

#[test]
fn relative_paths_resolve_against_data_dir() {
    let resolved = ResolvedSettings::new(PathBuf::from("/srv/data"), Settings::default());
    assert_eq!(
        resolved.enriched_store_path(),
        PathBuf::from("/srv/data/us_universities_enriched.csv")
    );
    assert_eq!(resolved.seed_store_path(), None);

    let mut settings = Settings::default();
    settings.base_list = PathBuf::from("/elsewhere/base.csv");
    let resolved = ResolvedSettings::new(PathBuf::from("/srv/data"), settings);
    assert_eq!(resolved.base_list_path(), PathBuf::from("/elsewhere/base.csv"));
}

#[test]
fn secret_file_wins_over_env() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let file = dir.path().join("key.txt");
    write_file(&file, "  from-file \n");
    let env_var = "COLLEGE_ENRICH_TEST_SECRET_FILE_WINS";
    std::env::set_var(env_var, "from-env");

    assert_eq!(resolve_secret(&file, env_var).as_deref(), Some("from-file"));

    std::env::remove_var(env_var);
}

#[test]
fn secret_falls_back_to_env_and_blank_is_absent() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let missing = dir.path().join("missing.txt");
    let blank = dir.path().join("blank.txt");
    write_file(&blank, "\n");
    let env_var = "COLLEGE_ENRICH_TEST_SECRET_FALLBACK";

    std::env::set_var(env_var, "from-env");
    assert_eq!(resolve_secret(&missing, env_var).as_deref(), Some("from-env"));
    assert_eq!(resolve_secret(&blank, env_var).as_deref(), Some("from-env"));

    std::env::remove_var(env_var);
    assert_eq!(resolve_secret(&missing, env_var), None);
}

#[test]
fn missing_api_key_is_configuration_error() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut settings = Settings::default();
    settings.api_key_env = "COLLEGE_ENRICH_TEST_NO_SUCH_KEY".to_string();
    let resolved = ResolvedSettings::new(dir.path().join("data"), settings);

    let err = resolved.api_key().expect_err("no key configured");
    assert!(matches!(err, ConfigError::MissingCredential { .. }));
    assert!(resolved.enrichment_client().is_err());
}

#[test]
fn command_backend_needs_no_api_key() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let mut settings = Settings::default();
    settings.api_key_env = "COLLEGE_ENRICH_TEST_NO_SUCH_KEY".to_string();
    settings.lm.command = Some("cat".to_string());
    let resolved = ResolvedSettings::new(dir.path().to_path_buf(), settings);

    let client = resolved.enrichment_client().expect("command backend");
    assert_eq!(client.backend_label(), "command:cat");
}
