use paperdrop_utils::version_info::RuntimeEnv;
use serde::Deserialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub enum Env {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "prod")]
    Prod,
    #[serde(rename = "test")]
    Test,
}

impl Display for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Env::Local => write!(f, "local"),
            Env::Prod => write!(f, "prod"),
            Env::Test => write!(f, "test"),
        }
    }
}

impl From<&Env> for RuntimeEnv {
    fn from(env: &Env) -> Self {
        match env {
            Env::Local => RuntimeEnv::Local,
            Env::Prod => RuntimeEnv::Prod,
            Env::Test => RuntimeEnv::Test,
        }
    }
}

/// Raw environment snapshot, deserialized by `serde-env` before validation.
#[derive(Debug, Deserialize)]
pub struct RawConfig {
    env: Option<Env>,
    server_addr: Option<String>,
    port: Option<u16>,
    public_base_url: Option<String>,
    uploads_dir: Option<String>,
    database_path: Option<String>,
}

/// Validated service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    env: Env,
    server_addr: String,
    port: u16,
    public_base_url: String,
    uploads_dir: PathBuf,
    database_path: PathBuf,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn init() -> anyhow::Result<Self> {
        let raw: RawConfig = serde_env::from_env()?;
        Self::from_raw(raw)
    }

    pub fn from_raw(raw: RawConfig) -> anyhow::Result<Self> {
        let env = raw.env.unwrap_or(Env::Local);
        let port = raw.port.unwrap_or(3001);

        // Local development binds loopback only; everything else is expected
        // to sit behind its own network boundary.
        let server_addr = raw.server_addr.unwrap_or_else(|| {
            match env {
                Env::Local | Env::Test => "127.0.0.1",
                Env::Prod => "0.0.0.0",
            }
            .to_string()
        });

        // The public base URL is baked into every stored file_url and into the
        // QR artifacts, so prod must state it explicitly.
        let public_base_url = match raw.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => match env {
                Env::Prod => anyhow::bail!("PUBLIC_BASE_URL must be set when ENV is prod"),
                Env::Local | Env::Test => format!("http://{server_addr}:{port}"),
            },
        };

        let uploads_dir = PathBuf::from(raw.uploads_dir.unwrap_or_else(|| "uploads".to_string()));
        let database_path = PathBuf::from(
            raw.database_path
                .unwrap_or_else(|| "data/paperdrop.db".to_string()),
        );

        Ok(Self {
            env,
            server_addr,
            port,
            public_base_url,
            uploads_dir,
            database_path,
        })
    }

    pub fn new_for_test() -> Self {
        Self {
            env: Env::Test,
            server_addr: "127.0.0.1".to_string(),
            port: 3001,
            public_base_url: "http://127.0.0.1:3001".to_string(),
            uploads_dir: PathBuf::from("uploads"),
            database_path: PathBuf::from("data/paperdrop.db"),
        }
    }

    pub fn environment(&self) -> &Env {
        &self.env
    }

    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }
}
