use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

use crate::scoring::TrustThresholds;

#[derive(Parser, Debug)]
#[command(name = "campuspool", about = "Campus ride-sharing API server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Secret used to sign access tokens
    #[arg(long, env = "CAMPUSPOOL_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Password for the seeded admin account
    #[arg(long, env = "CAMPUSPOOL_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub admin: AdminConfig,
    pub rules: RulesConfig,
    pub trust: TrustThresholds,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_minutes: i64,
    pub allowed_email_domain: String,
    pub bcrypt_cost: u32,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct RulesConfig {
    /// How close to departure a rider may flag a request as urgent.
    pub urgent_window_minutes: i64,
    /// Offset of campus local time from UTC; ride dates and times are local.
    pub utc_offset_minutes: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8001,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "campuspool-dev-secret".to_string(),
            token_minutes: 1440,
            allowed_email_domain: "@rvce.edu.in".to_string(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            email: "admin@rvce.edu.in".to_string(),
            password: "admin@123".to_string(),
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            urgent_window_minutes: 60,
            utc_offset_minutes: 330,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI and environment overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref secret) = cli.jwt_secret {
            config.auth.jwt_secret = secret.clone();
        }
        if let Some(ref password) = cli.admin_password {
            config.admin.password = password.clone();
        }

        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("campuspool.db"));
        }

        if config.auth.jwt_secret == AuthConfig::default().jwt_secret {
            tracing::warn!("Using the built-in JWT secret; set CAMPUSPOOL_JWT_SECRET in production");
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".campuspool")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("campuspool.db"))
    }
}
