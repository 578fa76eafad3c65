use adjutant_domain::config::Config;

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8460);
}

#[test]
fn empty_toml_yields_full_defaults() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config.assistant.default_name, "Chief of Staff");
    assert_eq!(config.assistant.default_timezone, "America/Phoenix");
    assert_eq!(config.completion.max_tokens, 4096);
    assert_eq!(config.credentials.encryption_key_env, "ADJUTANT_ENCRYPTION_KEY");
    assert!(config.observability.otlp_endpoint.is_none());
}

#[test]
fn explicit_server_overrides_parse() {
    let config = Config::from_toml_str(
        r#"
[server]
host = "0.0.0.0"
port = 9000
app_base_url = "https://assistant.example.com"
"#,
    )
    .unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.app_base_url, "https://assistant.example.com");
    // Untouched sections keep their defaults.
    assert_eq!(config.completion.model, "claude-sonnet-4-20250514");
}

#[test]
fn oauth_env_names_default_to_provider_convention() {
    let config = Config::default();
    assert_eq!(config.oauth.google.client_id_env, "GOOGLE_CLIENT_ID");
    assert_eq!(config.oauth.asana.client_secret_env, "ASANA_CLIENT_SECRET");
}

#[test]
fn invalid_toml_is_a_config_error() {
    let err = Config::from_toml_str("server = 3").unwrap_err();
    assert!(err.to_string().contains("invalid config"));
}
