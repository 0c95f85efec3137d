//! postboxd - SMTP endpoint daemon.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;

use std::fs::File;
use std::io::BufReader;
use std::process::ExitCode;

use postbox_smtp::server::{Handlers, Server, ServerConfig, TlsIdentity};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load();
    config.log();

    let mut server_config = ServerConfig::new(&config.server_domain)
        .with_relay(config.relay)
        .with_require_tls(config.require_tls);

    if config.tls_enabled {
        match load_tls_identity(&config.tls_cert_file, &config.tls_key_file) {
            Ok(identity) => server_config = server_config.with_tls(identity),
            Err(e) => {
                error!(%e, "failed to load TLS material");
                return ExitCode::FAILURE;
            }
        }
    }

    let handlers = Handlers::new().on_message(|message| {
        info!(
            from = message.from(),
            recipients = message.to().len(),
            subject = message.subject(),
            "message received"
        );
        Ok(())
    });

    let addr = format!("{}:{}", config.server_address, config.server_port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%e, %addr, "failed to start listener");
            return ExitCode::FAILURE;
        }
    };

    let server = Server::new(server_config).with_handlers(handlers);
    if let Err(e) = server.serve(listener).await {
        error!(%e, "server stopped");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Reads PEM files into parsed TLS material.
fn load_tls_identity(
    cert_file: &str,
    key_file: &str,
) -> Result<TlsIdentity, Box<dyn std::error::Error>> {
    let mut cert_reader = BufReader::new(File::open(cert_file)?);
    let certs = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(format!("no certificates in {cert_file}").into());
    }

    let mut key_reader = BufReader::new(File::open(key_file)?);
    let key = rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| format!("no private key in {key_file}"))?;

    Ok(TlsIdentity::new(certs, key)?)
}
