//! Configuration module
//!
//! Every setting can be given as a command-line flag or through the environment
//! (a `.env` file is loaded first when present). Flag and variable names are
//! stable: deployments set them directly.

use clap::{Parser, ValueEnum};

use crate::storage_types::StorageBackend;

const DEFAULT_STORAGE_HOST: &str = "https://storage.googleapis.com";

/// How inbound deliveries are acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AckMode {
    /// The broker considers a message delivered as soon as it is sent.
    /// Failed messages are dropped.
    #[default]
    Auto,
    /// Ack once handled, reject without requeue on failure so the broker can
    /// dead-letter the message.
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Worker configuration.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "ingest-worker",
    about = "Consumes upload requests from AMQP and stores them in a bucket",
    version
)]
pub struct Config {
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,

    #[arg(long, env = "BUCKET_NAME")]
    pub bucket_name: String,

    /// Folder used when a request does not carry a path
    #[arg(long, env = "BUCKET_FOLDER_PATH", default_value = "test")]
    pub bucket_folder_path: String,

    #[arg(long, env = "AMQP_USER_NAME", default_value = "guest")]
    pub amqp_user_name: String,

    #[arg(long, env = "AMQP_PASSWORD", default_value = "guest", hide_env_values = true)]
    pub amqp_password: String,

    #[arg(long, env = "AMQP_IP", default_value = "localhost")]
    pub amqp_ip: String,

    #[arg(long, env = "AMQP_PORT", default_value_t = 5672)]
    pub amqp_port: u16,

    /// Queue upload requests are consumed from
    #[arg(long, env = "AMQP_LISTEN_KEY", default_value = "FILES")]
    pub amqp_listen_key: String,

    /// Queue completion notifications are published to
    #[arg(long, env = "AMQP_RESPONSE_KEY", default_value = "UPLOAD_COMPLETED")]
    pub amqp_response_key: String,

    #[arg(long, env = "AMQP_ACK_MODE", value_enum, default_value_t = AckMode::Auto)]
    pub amqp_ack_mode: AckMode,

    /// Exchange set as `x-dead-letter-exchange` when the inbound queue is declared
    #[arg(long, env = "AMQP_DEAD_LETTER_EXCHANGE")]
    pub amqp_dead_letter_exchange: Option<String>,

    #[arg(long, env = "STORAGE_BACKEND", value_enum, default_value_t = StorageBackend::Gcs)]
    pub storage_backend: StorageBackend,

    /// API endpoint of the object store
    #[arg(long, env = "STORAGE_ENDPOINT", default_value = DEFAULT_STORAGE_HOST)]
    pub storage_endpoint: String,

    #[arg(long, env = "STORAGE_REGION", default_value = "auto")]
    pub storage_region: String,

    /// Host prefix of the public object URLs sent in notifications
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = DEFAULT_STORAGE_HOST)]
    pub public_base_url: String,

    #[arg(long, env = "LOCAL_STORAGE_PATH")]
    pub local_storage_path: Option<String>,
}

impl Config {
    /// Load `.env`, then parse flags and environment. Exits with usage on
    /// invalid flags, like any clap parser.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        let config = Config::parse();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.bucket_name.trim().is_empty() {
            return Err(anyhow::anyhow!("BUCKET_NAME must not be empty"));
        }
        if self.amqp_listen_key.is_empty() || self.amqp_response_key.is_empty() {
            return Err(anyhow::anyhow!(
                "AMQP_LISTEN_KEY and AMQP_RESPONSE_KEY must not be empty"
            ));
        }
        if self.storage_backend == StorageBackend::Local && self.local_storage_path.is_none() {
            return Err(anyhow::anyhow!(
                "LOCAL_STORAGE_PATH must be set for the local storage backend"
            ));
        }
        if self.amqp_dead_letter_exchange.is_some() && self.amqp_ack_mode == AckMode::Auto {
            return Err(anyhow::anyhow!(
                "AMQP_DEAD_LETTER_EXCHANGE requires AMQP_ACK_MODE=manual"
            ));
        }
        Ok(())
    }

    pub fn amqp_url(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}",
            self.amqp_user_name, self.amqp_password, self.amqp_ip, self.amqp_port
        )
    }

    /// Broker URL safe to log.
    pub fn redacted_amqp_url(&self) -> String {
        format!(
            "amqp://{}:***@{}:{}",
            self.amqp_user_name, self.amqp_ip, self.amqp_port
        )
    }

    /// Default tracing filter for the configured verbosity.
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug {
            "ingest_worker=debug,ingest_storage=debug,ingest_core=debug,lapin=info"
        } else {
            "ingest_worker=info,ingest_storage=info,ingest_core=info,lapin=warn"
        }
    }
}
