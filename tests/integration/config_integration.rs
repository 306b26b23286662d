//! Integration tests for Configuration System

use crate::integration::test_utils::{record_writes, with_xdg_env, GatedTransport};
use querybind::binding::EvalContext;
use querybind::config::{ConfigLoader, QuerybindConfig};
use querybind::engine::{QueryClient, QueuedSpawner};
use querybind::host::Element;
use querybind::plugin::{install, HostApi};
use querybind::transport::HttpTransport;
use querybind::QueryStatus;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write_workspace_config(workspace: &TempDir, name: &str, contents: &str) {
    let dir = workspace.path().join("config");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(name), contents).unwrap();
}

#[test]
fn test_loaded_config_drives_client_and_plugin() {
    let xdg = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace_config(
        &workspace,
        "config.toml",
        r#"
[client]
stale_time_ms = 60000

[binding]
default_property = "profile"
"#,
    );

    let config = with_xdg_env(&xdg, || ConfigLoader::load(workspace.path())).unwrap();
    let config = config.validated().unwrap();

    let spawner = Arc::new(QueuedSpawner::new());
    let client = QueryClient::new(config.client.defaults(), spawner.clone());
    assert_eq!(client.defaults().stale_time, Duration::from_secs(60));

    let transport = GatedTransport::new();
    let plugin = install(HostApi::from_config(transport.clone(), &config.binding));
    let root = Element::root("app");
    root.provide_engine(Arc::new(client.clone()));
    let element = root.child("card");
    let writes = record_writes(&element, "profile");

    plugin
        .directive(|_: &EvalContext<'_>| Ok("/me".into()))
        .bind(&element)
        .unwrap();
    spawner.run_until_stalled();
    assert!(transport.respond("/me", Ok(json!({ "name": "Ada" }))));
    spawner.run_until_stalled();

    let writes = writes.lock();
    assert_eq!(writes.last().unwrap().status, QueryStatus::Success);
    assert!(element.state().get("query").is_none());
}

#[test]
fn test_global_config_is_read_from_xdg_home() {
    let xdg = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let global_dir = xdg.path().join("querybind");
    std::fs::create_dir_all(&global_dir).unwrap();
    std::fs::write(
        global_dir.join("config.toml"),
        "[transport]\nbase_url = \"https://api.example.com\"\nrequest_timeout_ms = 5000\n",
    )
    .unwrap();

    let config = with_xdg_env(&xdg, || ConfigLoader::load(workspace.path())).unwrap();
    assert_eq!(
        config.transport.base_url.as_deref(),
        Some("https://api.example.com")
    );
    assert_eq!(config.transport.request_timeout_ms, 5000);
    assert_eq!(config.transport.connect_timeout_ms, 10_000);

    let transport = HttpTransport::new(&config.transport).unwrap();
    assert_eq!(
        transport.resolve("/users/1").unwrap().as_str(),
        "https://api.example.com/users/1"
    );
}

#[test]
fn test_invalid_sections_fail_validation() {
    let xdg = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace_config(
        &workspace,
        "config.toml",
        r#"
[transport]
base_url = "not a url"

[logging]
output = "syslog"
"#,
    );

    let config = with_xdg_env(&xdg, || ConfigLoader::load(workspace.path())).unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(config.validated().is_err());
}

#[test]
fn test_unparseable_file_is_a_load_error() {
    let xdg = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    write_workspace_config(&workspace, "config.toml", "[client\nstale_time_ms = ");

    let result = with_xdg_env(&xdg, || ConfigLoader::load(workspace.path()));
    assert!(result.is_err());
}

#[test]
fn test_defaults_round_trip_through_toml() {
    let config = QuerybindConfig::default();
    let text = toml::to_string(&config).unwrap();
    let parsed: QuerybindConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed, config);
}
