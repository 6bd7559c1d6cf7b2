//! Process configuration, read from flags or the environment.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// A private in-memory database, lost on exit.
    Memory,
    File(PathBuf),
}

impl DatabaseTarget {
    /// Parse a connection string: `:memory:`, `sqlite::memory:`,
    /// `sqlite://<path>`, `sqlite:<path>` or a bare file path.
    pub fn parse(url: &str) -> Self {
        let url = url.trim();
        let rest = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);

        if rest == ":memory:" {
            Self::Memory
        } else {
            Self::File(PathBuf::from(rest))
        }
    }

    /// `focustools.db` in the platform data directory.
    pub fn default_location() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "focustools")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        Ok(Self::File(dirs.data_dir().join("focustools.db")))
    }
}

impl std::fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => f.write_str(":memory:"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "focustools")]
#[command(about = "REST backend for tasks and Pomodoro focus sessions")]
pub struct ServerConfig {
    /// Port for the HTTP API
    #[arg(short, long, env = "PORT", default_value = "3001")]
    pub port: u16,

    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Database connection string (file path, `sqlite://<path>` or `:memory:`)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn database_target(&self) -> Result<DatabaseTarget> {
        match &self.database_url {
            Some(url) => Ok(DatabaseTarget::parse(url)),
            None => DatabaseTarget::default_location(),
        }
    }
}
