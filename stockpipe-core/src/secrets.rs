//! Secret retrieval.
//!
//! Secrets are addressed by resource path
//! (`projects/{project}/secrets/{name}/versions/{version}`) or by bare name.
//! The store behind the path is pluggable so fixtures can supply keys in memory.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("secret '{path}' not found (expected environment variable {var})")]
    NotFound { path: String, var: String },

    #[error("secret '{0}' is empty")]
    Empty(String),
}

pub trait SecretStore: Send + Sync {
    fn get_secret(&self, path: &str) -> Result<String, SecretError>;
}

/// Extract the secret name from a resource path; a bare name is returned as-is.
pub fn secret_name(path: &str) -> &str {
    let parts: Vec<&str> = path.split('/').collect();
    match parts.iter().position(|p| *p == "secrets") {
        Some(i) if i + 1 < parts.len() => parts[i + 1],
        _ => path,
    }
}

/// Environment variable a secret path resolves to: `alphavantage-api-key` → `ALPHAVANTAGE_API_KEY`.
pub fn env_var_for(path: &str) -> String {
    secret_name(path)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

/// Resolves secrets from process environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get_secret(&self, path: &str) -> Result<String, SecretError> {
        let var = env_var_for(path);
        let value = std::env::var(&var).map_err(|_| SecretError::NotFound {
            path: path.to_string(),
            var: var.clone(),
        })?;
        if value.trim().is_empty() {
            return Err(SecretError::Empty(path.to_string()));
        }
        Ok(value)
    }
}

/// In-memory secrets keyed by secret name.
#[derive(Debug, Default, Clone)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.values
            .insert(secret_name(name).to_string(), value.to_string());
        self
    }
}

impl SecretStore for StaticSecrets {
    fn get_secret(&self, path: &str) -> Result<String, SecretError> {
        self.values
            .get(secret_name(path))
            .cloned()
            .ok_or_else(|| SecretError::NotFound {
                path: path.to_string(),
                var: env_var_for(path),
            })
    }
}
