//! Environment and `.env` file configuration.

use std::fs;
use std::path::Path;

/// Daemon configuration, loaded from the process environment with an
/// optional `.env` file underneath it.
#[derive(Debug, Clone)]
pub struct Config {
    /// Hostname the server identifies as.
    pub server_hostname: String,
    /// Listener port.
    pub server_port: u16,
    /// Listener bind address.
    pub server_address: String,
    /// Domain announced in the greeting and EHLO reply.
    pub server_domain: String,
    /// Hostname announced by the client engine in EHLO.
    pub client_hostname: String,
    /// Default port for outbound deliveries.
    pub client_port: u16,
    /// Relay mode toggle.
    pub relay: bool,
    /// Refuse plaintext mail transactions.
    pub require_tls: bool,
    /// Enable STARTTLS (advertises it in EHLO).
    pub tls_enabled: bool,
    /// Path to the PEM certificate chain.
    pub tls_cert_file: String,
    /// Path to the PEM private key.
    pub tls_key_file: String,
}

impl Config {
    /// Loads configuration, reading `.env` from the working directory
    /// first. Values already present in the environment win over the
    /// file.
    pub fn load() -> Self {
        load_env_file(".env");

        Self {
            server_hostname: env_or("SMTP_SERVER_HOSTNAME", "localhost"),
            server_port: env_as_u16("SMTP_SERVER_PORT", 2525),
            server_address: env_or("SMTP_SERVER_ADDRESS", "0.0.0.0"),
            server_domain: env_or("SMTP_SERVER_DOMAIN", "localhost"),
            client_hostname: env_or("SMTP_CLIENT_HOSTNAME", "localhost"),
            client_port: env_as_u16("SMTP_CLIENT_PORT", 587),
            relay: env_as_bool("SMTP_RELAY", false),
            require_tls: env_as_bool("SMTP_REQUIRE_TLS", false),
            tls_enabled: env_as_bool("SMTP_TLS_ENABLED", false),
            tls_cert_file: env_or("SMTP_TLS_CERT_FILE", "cert.pem"),
            tls_key_file: env_or("SMTP_TLS_KEY_FILE", "key.pem"),
        }
    }

    /// Logs the effective configuration, without key material.
    pub fn log(&self) {
        tracing::info!(
            hostname = %self.server_hostname,
            port = self.server_port,
            address = %self.server_address,
            domain = %self.server_domain,
            relay = self.relay,
            require_tls = self.require_tls,
            tls_enabled = self.tls_enabled,
            client_hostname = %self.client_hostname,
            client_port = self.client_port,
            "configuration loaded"
        );
        if self.tls_enabled {
            tracing::info!(
                cert_file = %self.tls_cert_file,
                key_file = %self.tls_key_file,
                "TLS material configured"
            );
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_string(),
    }
}

fn env_as_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn env_as_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .and_then(|value| parse_bool(&value))
        .unwrap_or(default)
}

/// Accepts the usual truthy spellings.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Loads `KEY=VALUE` lines into the environment. Existing variables are
/// never overwritten; a missing file is not an error.
fn load_env_file(path: impl AsRef<Path>) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for line in contents.lines() {
        let Some((key, value)) = parse_env_line(line) else {
            continue;
        };
        if std::env::var(&key).is_err() {
            std::env::set_var(key, value);
        }
    }
}

/// Parses one `.env` line: comments and blanks yield `None`, quotes
/// around the value are stripped.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    let value = value.trim();
    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}
