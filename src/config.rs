use crate::error::{BadEnvVarSnafu, ParseNumberSnafu, StudentError, StudentResult};
use dotenvy::var;
use secrecy::{ExposeSecret, SecretString};
use snafu::ResultExt;
use std::{str::FromStr, sync::Arc};

const DEFAULT_SERVER_IP: &str = "127.0.0.1:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 15;

#[derive(Clone, Debug)]
pub struct RuntimeConfiguration {
    server_ip: String,
    storage: StorageConfig,
}

impl RuntimeConfiguration {
    pub fn new() -> StudentResult<Self> {
        let server_ip = var("STUDENTS_SERVER_IP").unwrap_or_else(|_| DEFAULT_SERVER_IP.to_string());

        let storage = match var("STUDENTS_STORAGE")
            .ok()
            .map(|kind| kind.parse::<StorageKind>())
            .transpose()?
            .unwrap_or_default()
        {
            StorageKind::Memory => StorageConfig::Memory,
            StorageKind::Postgres => StorageConfig::Postgres(Arc::new(DbConfig::new()?)),
        };

        Ok(Self { server_ip, storage })
    }

    pub fn server_ip(&self) -> &str {
        &self.server_ip
    }

    pub fn storage(&self) -> StorageConfig {
        self.storage.clone()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum StorageKind {
    #[default]
    Memory,
    Postgres,
}

impl FromStr for StorageKind {
    type Err = StudentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(StudentError::UnknownStorage {
                kind: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub enum StorageConfig {
    Memory,
    Postgres(Arc<DbConfig>),
}

#[derive(Debug)]
pub struct DbConfig {
    user: String,
    password: SecretString,
    path: String,
    port: u16,
    database: String,
    max_connections: u32,
}

impl DbConfig {
    pub fn new() -> StudentResult<Self> {
        let get_env_var = |name| var(name).context(BadEnvVarSnafu { name });

        let max_connections = match var("DB_MAX_CONNECTIONS") {
            Ok(max) => max.parse().context(ParseNumberSnafu {
                name: "DB_MAX_CONNECTIONS",
            })?,
            Err(_) => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            user: get_env_var("DB_USER")?,
            password: SecretString::from(get_env_var("DB_PASSWORD")?),
            path: get_env_var("DB_PATH")?,
            port: get_env_var("DB_PORT")?
                .parse()
                .context(ParseNumberSnafu { name: "DB_PORT" })?,
            database: get_env_var("DB_NAME")?,
            max_connections,
        })
    }

    pub const fn max_connections(&self) -> u32 {
        self.max_connections
    }

    pub fn get_db_path(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user,
            self.password.expose_secret(),
            self.path,
            self.port,
            self.database
        )
    }
}
