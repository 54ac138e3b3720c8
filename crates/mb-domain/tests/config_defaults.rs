use mb_domain::config::Config;

#[test]
fn default_host_binds_all_interfaces() {
    let config = Config::default();
    assert_eq!(config.server.host, "0.0.0.0");
}

#[test]
fn explicit_host_override_parses() {
    let toml_str = r#"
[server]
host = "127.0.0.1"
port = 3210
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 3210);
}

#[test]
fn unset_sections_fall_back_to_defaults() {
    let config: Config = toml::from_str("[server]\nport = 9100\n").unwrap();
    assert_eq!(config.server.port, 9100);
    assert_eq!(config.launcher.kind, Default::default());
}
