use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use mizan_primitives::{Currency, CurrencyCode, Locale};
use secrecy::SecretString;

/// Configuration for the `mizan-server` daemon.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Mizan inventory, sales and finance server")]
pub struct ServerConfig {
    /// Address to bind the HTTP server to.
    #[arg(long, env = "MIZAN_BIND", default_value = "127.0.0.1")]
    pub bind: String,

    /// Port for the HTTP server.
    #[arg(long, env = "MIZAN_PORT", default_value_t = 4820)]
    pub port: u16,

    /// ISO 4217 code of the shop's trading currency.
    #[arg(long, env = "MIZAN_CURRENCY", default_value = "USD", value_parser = parse_currency)]
    pub currency: Currency,

    /// Key every request must present in `x-api-key`.
    #[arg(long, env = "MIZAN_API_KEY", hide_env_values = true)]
    pub api_key: SecretString,

    /// Secret for the `x-signature` body HMAC.
    #[arg(long, env = "MIZAN_HMAC_SECRET", hide_env_values = true)]
    pub hmac_secret: Option<SecretString>,

    /// Reject requests that carry no `x-signature`.
    #[arg(long, env = "MIZAN_REQUIRE_SIGNATURE", requires = "hmac_secret")]
    pub require_signature: bool,

    /// Keep the books in memory only; nothing survives a restart.
    #[arg(long, env = "MIZAN_EPHEMERAL")]
    pub ephemeral: bool,

    /// Enable verbose logging output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl ServerConfig {
    /// Load configuration from CLI args and environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }

    /// Resolve bind address + port into a [`SocketAddr`].
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let addr: SocketAddr = format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid bind address: {}:{}", self.bind, self.port))?;
        Ok(addr)
    }
}

/// Configuration for the `mizan` command-line client.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Mizan command-line client")]
pub struct ClientConfig {
    /// URL of the running `mizan-server` instance.
    #[arg(long, env = "MIZAN_SERVER_URL", default_value = "http://127.0.0.1:4820")]
    pub server_url: String,

    /// Key sent in `x-api-key`.
    #[arg(long, env = "MIZAN_API_KEY", hide_env_values = true)]
    pub api_key: SecretString,

    /// Signs request bodies into `x-signature` when set.
    #[arg(long, env = "MIZAN_HMAC_SECRET", hide_env_values = true)]
    pub hmac_secret: Option<SecretString>,

    /// User recorded as the author of writes.
    #[arg(long, env = "MIZAN_USER_ID", default_value = "cli")]
    pub user_id: String,

    /// Language for notifications (`en` or `ar`).
    #[arg(long, env = "MIZAN_LANG", default_value = "en")]
    pub lang: Locale,

    /// Enable verbose logging output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl ClientConfig {
    /// Load configuration from CLI args and environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::parse()
    }
}

/// Accept a three-letter currency code in any case.
pub fn parse_currency(s: &str) -> Result<Currency, String> {
    let code = s.trim();
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(format!("expected a three-letter currency code, got {s:?}"));
    }
    Ok(Currency::from_code(CurrencyCode::new(
        &code.to_ascii_uppercase(),
    )))
}
