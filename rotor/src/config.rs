//! Process configuration, read from the command line or the environment

use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};
use rotor_secrets::{
    aws::{SecretsManagerStore, DEFAULT_REGION},
    file::FileSecretStore,
    SecretName, SecretStore,
};
use rotor_tokens::backoff::RetryConfig;

/// Which kind of store holds the secrets
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// AWS Secrets Manager
    Aws,
    /// A local directory of `<name>.json` files
    File,
}

/// How log lines are written
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line
    Json,
    /// Multi-line, human-readable output
    Pretty,
}

/// Rotates an API access token held in a secret store
#[derive(Debug, Parser)]
#[command(name = "rotor", version, about)]
pub struct RotorConfig {
    /// The secret holding `TOKEN_URL`, `CLIENT_ID` and `CLIENT_SECRET`
    #[arg(long, env = "SOURCE_SECRET_NAME")]
    pub source_secret_name: SecretName,

    /// The secret to overwrite with the new token
    #[arg(long, env = "TARGET_SECRET_NAME")]
    pub target_secret_name: SecretName,

    /// The region of the secret store
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// The maximum number of requests made to the authority per rotation
    #[arg(long, env = "TOKEN_MAX_ATTEMPTS", default_value_t = 3)]
    pub max_attempts: u32,

    /// The delay after the first transient failure; later delays are multiples of it
    #[arg(long, env = "TOKEN_RETRY_BASE_DELAY_MS", default_value_t = 1000)]
    pub retry_base_delay_ms: u64,

    /// The time allowed for each request to the authority
    #[arg(long, env = "TOKEN_REQUEST_TIMEOUT_MS", default_value_t = 5000)]
    pub request_timeout_ms: u64,

    /// The kind of store holding both secrets
    #[arg(long, env = "SECRET_STORE", value_enum, default_value_t = StoreKind::Aws)]
    pub secret_store: StoreKind,

    /// The directory used by the file store
    #[arg(long, env = "SECRETS_DIR", required_if_eq("secret_store", "file"))]
    pub secrets_dir: Option<PathBuf>,

    /// Perform a single rotation and exit instead of serving Lambda invocations
    #[arg(long, env = "ROTOR_RUN_ONCE")]
    pub once: bool,

    /// The format of log output
    #[arg(long, env = "ROTOR_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl RotorConfig {
    /// The retry behaviour for transient authority failures
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(
            self.max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    /// The time allowed for each request to the authority
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Builds the configured secret store
    pub async fn secret_store(&self) -> Box<dyn SecretStore> {
        match self.secret_store {
            StoreKind::Aws => Box::new(SecretsManagerStore::from_region(self.region.clone()).await),
            StoreKind::File => {
                let dir = self.secrets_dir.clone().unwrap_or_else(|| PathBuf::from("."));
                Box::new(FileSecretStore::new(dir))
            }
        }
    }
}
