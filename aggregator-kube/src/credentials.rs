//! In-cluster credentials: the pod's service-account token and cluster CA.
//!
//! The API server address comes from `KUBERNETES_SERVICE_HOST` and
//! `KUBERNETES_SERVICE_PORT`, which the kubelet sets in every pod.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Where the kubelet mounts the service-account secret.
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{0} is not set; is this running inside a cluster?")]
    MissingEnv(&'static str),

    #[error("service account token at {0} is empty")]
    EmptyToken(PathBuf),

    #[error("invalid CA bundle at {path}: {message}")]
    Ca { path: PathBuf, message: String },
}

/// Everything needed to reach the API server from inside a pod.
#[derive(Clone)]
pub struct ServiceAccount {
    pub endpoint: String,
    pub token: String,
    pub tls: Arc<rustls::ClientConfig>,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("endpoint", &self.endpoint)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl ServiceAccount {
    /// Load from the standard mount point and service environment.
    pub fn from_env() -> Result<Self, CredentialsError> {
        let host = env_var("KUBERNETES_SERVICE_HOST")?;
        let port = env_var("KUBERNETES_SERVICE_PORT")?;
        Self::load(Path::new(SERVICE_ACCOUNT_DIR), &host, &port)
    }

    /// Load `token` and `ca.crt` from `dir`.
    pub fn load(dir: &Path, host: &str, port: &str) -> Result<Self, CredentialsError> {
        let token_path = dir.join("token");
        let token = String::from_utf8_lossy(&read(&token_path)?).trim().to_string();
        if token.is_empty() {
            return Err(CredentialsError::EmptyToken(token_path));
        }

        let ca_path = dir.join("ca.crt");
        let tls = tls_config(&read(&ca_path)?)
            .map_err(|message| CredentialsError::Ca { path: ca_path, message })?;

        Ok(Self {
            endpoint: endpoint_for(host, port),
            token,
            tls: Arc::new(tls),
        })
    }
}

fn read(path: &Path) -> Result<Vec<u8>, CredentialsError> {
    fs::read(path).map_err(|source| CredentialsError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn env_var(name: &'static str) -> Result<String, CredentialsError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(CredentialsError::MissingEnv(name))
}

fn endpoint_for(host: &str, port: &str) -> String {
    if host.contains(':') {
        format!("https://[{host}]:{port}")
    } else {
        format!("https://{host}:{port}")
    }
}

/// TLS settings trusting only the certificates in `pem`.
fn tls_config(pem: &[u8]) -> Result<rustls::ClientConfig, String> {
    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut &pem[..]) {
        let cert = cert.map_err(|e| e.to_string())?;
        roots.add(cert).map_err(|e| e.to_string())?;
    }
    if roots.is_empty() {
        return Err("no certificates found".to_string());
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    Ok(rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| e.to_string())?
        .with_root_certificates(roots)
        .with_no_client_auth())
}
