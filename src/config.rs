use crate::{
    errors::{IntakeError, IntakeResult},
    services::{
        graph_client::{DEFAULT_GRAPH_BASE_URL, DEFAULT_LOGIN_BASE_URL},
        identity::ClientCredentials,
        intake_service::DEFAULT_ROOT_FOLDER,
        payment::DEFAULT_STRIPE_BASE_URL,
    },
};
use clap::Parser;
use std::{env, fmt, path::PathBuf};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub spool_dir: PathBuf,
    pub max_upload_mb: u64,
    pub credentials: ClientCredentials,
    pub drive_id: String,
    pub root_folder: String,
    /// Payment endpoints answer 503 when unset.
    pub stripe_secret_key: Option<String>,
    pub graph_base_url: String,
    pub login_base_url: String,
    pub stripe_base_url: String,
}

/// Command-line + environment configuration.
///
/// Secrets are only read from the environment.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Client intake portal for mixing and mastering orders")]
pub struct Args {
    /// Host to bind to (overrides INTAKE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides INTAKE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where form uploads are spooled (overrides INTAKE_SPOOL_DIR)
    #[arg(long)]
    pub spool_dir: Option<PathBuf>,

    /// Largest accepted request body in MiB (overrides INTAKE_MAX_UPLOAD_MB)
    #[arg(long)]
    pub max_upload_mb: Option<u64>,

    /// Top-level drive folder for all projects (overrides SHAREPOINT_ROOT_FOLDER)
    #[arg(long)]
    pub root_folder: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> IntakeResult<Self> {
        Self::resolve(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge `args` over the variables returned by `var`.
    ///
    /// Fails with a configuration error naming the first missing credential.
    pub fn resolve(args: Args, var: impl Fn(&str) -> Option<String>) -> IntakeResult<Self> {
        let lookup = |name: &str| var(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| {
            lookup(name).ok_or_else(|| {
                IntakeError::Configuration(format!("environment variable {name} is not set"))
            })
        };
        let number = |name: &str| -> IntakeResult<Option<u64>> {
            lookup(name)
                .map(|value| {
                    value.trim().parse::<u64>().map_err(|_| {
                        IntakeError::Configuration(format!("{name} value `{value}` is not a number"))
                    })
                })
                .transpose()
        };

        let credentials = ClientCredentials {
            tenant_id: required("TENANT_ID")?,
            client_id: required("CLIENT_ID")?,
            client_secret: required("CLIENT_SECRET")?,
        };
        let drive_id = required("SHAREPOINT_DRIVE_ID")?;

        let env_port = match number("INTAKE_PORT")? {
            Some(port) => u16::try_from(port).map_err(|_| {
                IntakeError::Configuration(format!("INTAKE_PORT value `{port}` is out of range"))
            })?,
            None => 3000,
        };

        let cfg = Self {
            host: args
                .host
                .or_else(|| lookup("INTAKE_HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: args.port.unwrap_or(env_port),
            spool_dir: args
                .spool_dir
                .or_else(|| lookup("INTAKE_SPOOL_DIR").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("./data/spool")),
            max_upload_mb: match args.max_upload_mb {
                Some(mb) => mb,
                None => number("INTAKE_MAX_UPLOAD_MB")?.unwrap_or(2048),
            },
            credentials,
            drive_id,
            root_folder: args
                .root_folder
                .or_else(|| lookup("SHAREPOINT_ROOT_FOLDER"))
                .unwrap_or_else(|| DEFAULT_ROOT_FOLDER.into()),
            stripe_secret_key: lookup("STRIPE_SECRET_KEY"),
            graph_base_url: lookup("GRAPH_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GRAPH_BASE_URL.into()),
            login_base_url: lookup("LOGIN_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LOGIN_BASE_URL.into()),
            stripe_base_url: lookup("STRIPE_BASE_URL")
                .unwrap_or_else(|| DEFAULT_STRIPE_BASE_URL.into()),
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.max_upload_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("spool_dir", &self.spool_dir)
            .field("max_upload_mb", &self.max_upload_mb)
            .field("credentials", &self.credentials)
            .field("drive_id", &self.drive_id)
            .field("root_folder", &self.root_folder)
            .field("payments_enabled", &self.stripe_secret_key.is_some())
            .field("graph_base_url", &self.graph_base_url)
            .finish_non_exhaustive()
    }
}
