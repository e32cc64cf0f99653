//! Config file loading, error messages and validation.

use assert_fs::prelude::*;
use aggregator_core::{
    config::{self, load_at},
    AggregatorConfig, ConfigError, DestinationConfig, NotifyConfig, ResourceId,
};
use rstest::rstest;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// 1. Loading
// ---------------------------------------------------------------------------

#[test]
fn load_full_resource_config() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("aggregator.yaml");
    file.write_str(
        "partitions: [default, kube-system]\n\
         selector: app=web\n\
         endpoint: http://10.0.0.1:8001\n\
         destination:\n  kind: resource\n  namespace: default\n  name: aggregated\n\
         notify:\n  url: http://127.0.0.1:9090/reload\n\
         interval_secs: 30\n",
    )
    .expect("write");

    let cfg = load_at(file.path()).expect("load");
    assert_eq!(cfg.partitions, vec!["default", "kube-system"]);
    assert_eq!(cfg.selector, "app=web");
    assert_eq!(cfg.endpoint, "http://10.0.0.1:8001");
    assert_eq!(cfg.interval_secs, 30);
    assert_eq!(
        cfg.notify,
        Some(NotifyConfig {
            url: "http://127.0.0.1:9090/reload".into(),
            method: "POST".into(),
        })
    );
    assert_eq!(cfg.excluded(), Some(ResourceId::new("default", "aggregated")));
}

#[test]
fn load_minimal_directory_config_uses_defaults() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("aggregator.yaml");
    file.write_str("destination:\n  kind: directory\n  path: /etc/aggregated\n")
        .expect("write");

    let cfg = load_at(file.path()).expect("load");
    assert_eq!(
        cfg.destination,
        DestinationConfig::Directory {
            path: PathBuf::from("/etc/aggregated"),
            exclude: None,
        }
    );
    assert_eq!(cfg.endpoint, config::DEFAULT_ENDPOINT);
    assert_eq!(cfg.interval_secs, config::DEFAULT_INTERVAL_SECS);
    assert!(cfg.notify.is_none());
    assert!(!cfg.dry_run);
}

#[test]
fn load_missing_file_returns_io_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = load_at(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }), "got: {err}");
    assert!(err.to_string().contains("absent.yaml"));
}

#[test]
fn load_corrupt_yaml_returns_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("broken.yaml");
    file.write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("broken.yaml"));
}

#[test]
fn load_rejects_unknown_destination_kind() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("aggregator.yaml");
    file.write_str("destination:\n  kind: bucket\n  path: /x\n")
        .expect("write");

    let err = load_at(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Validation
// ---------------------------------------------------------------------------

fn with_notify(url: &str, method: &str) -> AggregatorConfig {
    let mut cfg = AggregatorConfig::new(DestinationConfig::Directory {
        path: PathBuf::from("/tmp/out"),
        exclude: None,
    });
    cfg.notify = Some(NotifyConfig {
        url: url.to_string(),
        method: method.to_string(),
    });
    cfg
}

#[rstest]
#[case("https://somehost:9090/foo", "POST", true)]
#[case("http://127.0.0.1:8080/-/reload", "PUT", true)]
#[case("\\http:/invalid url", "POST", false)]
#[case("not a url", "POST", false)]
#[case("http://127.0.0.1/hook", "", false)]
#[case("http://127.0.0.1/hook", "PO ST", false)]
fn notify_validation(#[case] url: &str, #[case] method: &str, #[case] ok: bool) {
    let result = with_notify(url, method).validate();
    assert_eq!(result.is_ok(), ok, "url={url:?} method={method:?}: {result:?}");
}

#[rstest]
#[case("", "target")]
#[case("default", "")]
fn resource_destination_requires_identity(#[case] namespace: &str, #[case] name: &str) {
    let cfg = AggregatorConfig::new(DestinationConfig::Resource {
        namespace: namespace.into(),
        name: name.into(),
    });
    assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn directory_destination_requires_path() {
    let cfg = AggregatorConfig::new(DestinationConfig::Directory {
        path: PathBuf::new(),
        exclude: None,
    });
    assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
fn yaml_render_reloads_identically() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let mut cfg = AggregatorConfig::new(DestinationConfig::Directory {
        path: PathBuf::from("/srv/out"),
        exclude: Some(ResourceId::new("default", "target")),
    });
    cfg.partitions = vec!["default".into()];
    cfg.selector = "tier=config".into();

    let file = dir.child("rendered.yaml");
    file.write_str(&config::to_yaml(&cfg).expect("render"))
        .expect("write");
    assert_eq!(load_at(file.path()).expect("load"), cfg);
}
