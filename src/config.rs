use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Book catalog, reading statistics and personal library server.
#[derive(Parser, Debug, Clone)]
#[command(name = "bookshelf-rs")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "BOOKSHELF_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// User management commands.
    User {
        /// User subcommand action.
        #[command(subcommand)]
        action: UserCommand,
    },

    /// Catalog management commands.
    Catalog {
        /// Catalog subcommand action.
        #[command(subcommand)]
        action: CatalogCommand,
    },

    /// Initialize database and create default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// User management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum UserCommand {
    /// Add a new user.
    Add {
        /// Phone number used to sign in.
        phone_number: String,
        /// Display nickname.
        #[arg(short, long)]
        nickname: String,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Delete a user.
    Del {
        /// Phone number of the user to delete.
        phone_number: String,
    },

    /// List all users.
    List,

    /// Change user password.
    Passwd {
        /// Phone number of the user.
        phone_number: String,
        /// New password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },
}

/// Catalog management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum CatalogCommand {
    /// Create a category.
    Category {
        /// Category name.
        name: String,
    },

    /// Import books from a JSON file.
    Import {
        /// Path to a JSON array of books.
        path: PathBuf,
    },

    /// List books and categories.
    List,
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Kakao sign-in configuration.
    #[serde(default)]
    pub kakao: KakaoConfig,

    /// SMS verification configuration.
    #[serde(default)]
    pub sms: SmsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        8080,
    )
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/bookshelf.db")
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Registration mode: "open", "disabled".
    #[serde(default = "default_registration")]
    pub registration: String,

    /// Session token duration in days.
    #[serde(default = "default_session_days")]
    pub session_days: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            registration: default_registration(),
            session_days: default_session_days(),
        }
    }
}

fn default_registration() -> String {
    "open".to_string()
}

fn default_session_days() -> u32 {
    30
}

impl AuthConfig {
    /// Check if registration is enabled.
    pub fn registration_enabled(&self) -> bool {
        self.registration == "open"
    }
}

/// Kakao sign-in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KakaoConfig {
    /// User profile endpoint.
    #[serde(default = "default_kakao_profile_url")]
    pub profile_url: String,
}

impl Default for KakaoConfig {
    fn default() -> Self {
        Self {
            profile_url: default_kakao_profile_url(),
        }
    }
}

fn default_kakao_profile_url() -> String {
    "https://kapi.kakao.com/v2/user/me".to_string()
}

/// SMS verification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    /// Minutes a code stays valid.
    #[serde(default = "default_sms_valid_minutes")]
    pub valid_minutes: u32,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            valid_minutes: default_sms_valid_minutes(),
        }
    }
}

fn default_sms_valid_minutes() -> u32 {
    5
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("bookshelf-rs.toml"),
            dirs::config_dir()
                .map(|p| p.join("bookshelf-rs").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/bookshelf-rs/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# bookshelf-rs configuration

[server]
bind = "0.0.0.0:8080"

[database]
# path = "/var/lib/bookshelf-rs/bookshelf.db"

[auth]
# Registration mode: "open" or "disabled"
registration = "open"
# Session duration in days
session_days = 30

[kakao]
# profile_url = "https://kapi.kakao.com/v2/user/me"

[sms]
# Minutes a verification code stays valid
valid_minutes = 5
"#
        .to_string()
    }
}
