//! [`Config`] of the server, loaded from a file and `FROC__*` environment
//! variables.

use std::time;

use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;
use smart_default::SmartDefault;
use uuid::Uuid;

/// Configuration of the whole server.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: Server,

    /// Service configuration.
    pub service: Service,

    /// Postgres configuration.
    pub postgres: Postgres,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Loads the [`Config`] from the file at the provided `path`, if it
    /// exists, overriding it with `FROC__*` environment variables.
    ///
    /// Nested fields are separated with `__` in variable names, so
    /// `FROC__SERVICE__ADMIN_ID` sets the `service.admin_id`. Missing fields
    /// fall back to their defaults.
    ///
    /// # Errors
    ///
    /// If any source is malformed or has a value of the wrong type.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("FROC")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}

/// HTTP server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host to listen on.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port to listen on.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cors {
    /// Origins allowed to call the API from a browser.
    #[default(vec!["*".to_owned()])]
    pub origins: Vec<String>,
}

/// Service configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Service {
    /// [JWT] secret shared with the identity provider issuing sessions.
    ///
    /// [JWT]: https://wikipedia.org/wiki/JSON_Web_Token
    #[default("secret".to_owned())]
    pub jwt_secret: String,

    /// ID of the `User` reviewing every requested order.
    pub admin_id: Uuid,

    /// Service tasks configuration.
    pub tasks: Tasks,
}

impl From<Service> for service::Config {
    fn from(value: Service) -> Self {
        let Service {
            jwt_secret,
            admin_id,
            tasks:
                Tasks {
                    redeliver_notifications,
                },
        } = value;
        Self {
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                jwt_secret.as_bytes(),
            ),
            admin_id: admin_id.into(),
            redeliver_notifications: redeliver_notifications.into(),
        }
    }
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Tasks {
    /// `RedeliverNotifications` task configuration.
    pub redeliver_notifications: RedeliveryTask,
}

/// `RedeliverNotifications` task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct RedeliveryTask {
    /// Task execution interval.
    #[default(time::Duration::from_secs(60))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,

    /// Number of failed attempts after which a notification is abandoned.
    #[default(5)]
    pub max_attempts: i16,

    /// Maximum number of notifications redelivered at once.
    #[default(100)]
    pub batch_size: usize,
}

impl From<RedeliveryTask> for service::task::redeliver_notifications::Config {
    fn from(value: RedeliveryTask) -> Self {
        let RedeliveryTask {
            interval,
            max_attempts,
            batch_size,
        } = value;
        Self {
            interval,
            max_attempts: max_attempts.into(),
            batch_size,
        }
    }
}

/// Postgres configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host to connect to.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port to connect to.
    #[default(5432)]
    pub port: u16,

    /// User to connect as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to connect with.
    #[default("postgres".to_owned())]
    pub password: String,

    /// Database to connect to.
    #[default("froc".to_owned())]
    pub dbname: String,

    /// Maximum number of pooled connections.
    #[default(16)]
    pub pool_size: usize,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
            pool_size,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            pool: Some(service::infra::postgres::PoolConfig::new(pool_size)),
            ..Self::default()
        }
    }
}

/// Logging configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Most verbose [`LogLevel`] to output.
    pub level: LogLevel,
}

/// Verbosity of logs, from the most verbose to the least.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Everything, including SQL statements and resolver spans.
    Trace,

    /// Diagnostics useful while developing.
    Debug,

    /// Served requests, redeliveries and startup progress.
    #[default]
    Info,

    /// Failed notification deliveries and other recoverable problems.
    Warn,

    /// Failures requiring attention.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

#[cfg(test)]
mod spec {
    use std::time::Duration;

    use super::{Config, Postgres, RedeliveryTask};

    #[test]
    fn defaults_are_usable_without_any_source() {
        let conf = Config::new("definitely-missing-froc-config").unwrap();

        assert_eq!(conf.server.port, 8080);
        assert_eq!(conf.server.cors.origins, ["*"]);
        assert_eq!(conf.postgres.dbname, "froc");
        assert_eq!(conf.service.tasks.redeliver_notifications.max_attempts, 5);
    }

    #[test]
    fn postgres_section_configures_pool() {
        let conf = service::infra::postgres::Config::from(Postgres {
            pool_size: 4,
            ..Postgres::default()
        });

        assert_eq!(conf.dbname.as_deref(), Some("froc"));
        assert_eq!(conf.pool.map(|p| p.max_size), Some(4));
    }

    #[test]
    fn redelivery_section_converts_to_task_config() {
        let conf = service::task::redeliver_notifications::Config::from(
            RedeliveryTask {
                interval: Duration::from_secs(5),
                max_attempts: 3,
                batch_size: 10,
            },
        );

        assert_eq!(conf.interval, Duration::from_secs(5));
        assert_eq!(conf.batch_size, 10);
    }
}
