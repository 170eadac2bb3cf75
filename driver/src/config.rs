//! Application-wide configuration, loaded from the environment
//! (spec.md §6's `TM_*` variables) rather than a YAML file.
//!
//! Grounded on the teacher's `config.rs` singleton pattern
//! (`app_config()`/`init_config()`), adapted to a safe `OnceLock` instead of
//! the teacher's `unsafe static mut`.

use std::sync::OnceLock;

use log::info;
use tm_model::ConfigProfile;

error_chain::error_chain! {
    errors {
        MissingEnvVar(name: &'static str) {
            description("required environment variable is not set")
            display("required environment variable is not set: {}", name)
        }

        InvalidEnvVar(name: &'static str, value: String) {
            description("environment variable has an invalid value")
            display("environment variable {} has an invalid value: {}", name, value)
        }
    }
}

/// Application-wide configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `TM_API_ENDPOINT`: base URL of the front-office API.
    pub api_endpoint: String,

    /// `TM_API_SECRET_KEY`: HMAC key used to sign internal JWTs.
    pub api_secret_key: String,

    /// `TM_REDIS_HOST`.
    pub redis_host: String,

    /// `TM_REDIS_PORT`, default 6379.
    pub redis_port: u16,

    /// `TM_SENTRY_DSN`, optional telemetry sink.
    pub sentry_dsn: Option<String>,

    /// `TM_HOST_WORKSPACE_ROOT`: root under which per-request workspaces
    /// are created on the host.
    pub host_workspace_root: std::path::PathBuf,

    /// `TM_S3FS_ROOT`: mount exposing object-store keys as files.
    pub s3fs_root: std::path::PathBuf,

    /// `TM_WORKERS`, default 4: number of concurrent judge tasks per queue
    /// actor.
    pub workers: u32,

    /// `TM_CONFIG`, default `prod`: selects the builder/sandbox image tag
    /// table.
    pub profile: ConfigProfile,
}

impl AppConfig {
    /// Load configuration from the process environment. Fails with
    /// `MissingEnvVar`/`InvalidEnvVar` rather than panicking, so `main` can
    /// map a config error onto exit code 2 (spec.md §6).
    pub fn from_env() -> Result<Self> {
        let api_endpoint = required_var("TM_API_ENDPOINT")?;
        let api_secret_key = required_var("TM_API_SECRET_KEY")?;
        let redis_host = required_var("TM_REDIS_HOST")?;
        let redis_port = optional_var("TM_REDIS_PORT")
            .map(|v| parse_var("TM_REDIS_PORT", &v))
            .transpose()?
            .unwrap_or(6379);
        let sentry_dsn = optional_var("TM_SENTRY_DSN");
        let host_workspace_root = required_var("TM_HOST_WORKSPACE_ROOT")?.into();
        let s3fs_root = required_var("TM_S3FS_ROOT")?.into();
        let workers = optional_var("TM_WORKERS")
            .map(|v| parse_var("TM_WORKERS", &v))
            .transpose()?
            .unwrap_or(4);
        let profile = match optional_var("TM_CONFIG") {
            Some(tag) => {
                ConfigProfile::from_tag(&tag).ok_or_else(|| Error::from(ErrorKind::InvalidEnvVar("TM_CONFIG", tag)))?
            }
            None => ConfigProfile::default(),
        };

        Ok(AppConfig {
            api_endpoint,
            api_secret_key,
            redis_host,
            redis_port,
            sentry_dsn,
            host_workspace_root,
            s3fs_root,
            workers,
            profile,
        })
    }

    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.redis_host, self.redis_port)
    }
}

fn required_var(name: &'static str) -> Result<String> {
    std::env::var(name).map_err(|_| Error::from(ErrorKind::MissingEnvVar(name)))
}

fn optional_var(name: &'static str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::from(ErrorKind::InvalidEnvVar(name, value.to_owned())))
}

static SINGLETON: OnceLock<AppConfig> = OnceLock::new();

/// The application-wide configuration. Panics if [`init_config`] has not
/// run yet.
pub fn app_config() -> &'static AppConfig {
    SINGLETON.get().expect("application configuration has not been initialized yet")
}

/// Load configuration from the environment and install it as the
/// application-wide singleton. Panics if called more than once.
pub fn init_config() -> Result<()> {
    info!("initializing application configuration from the environment");
    let config = AppConfig::from_env()?;
    SINGLETON
        .set(config)
        .map_err(|_| "application configuration has already been initialized")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redis_url_uses_configured_host_and_port() {
        let config = AppConfig {
            api_endpoint: "http://api".to_owned(),
            api_secret_key: "secret".to_owned(),
            redis_host: "redis-host".to_owned(),
            redis_port: 6380,
            sentry_dsn: None,
            host_workspace_root: "/workspaces".into(),
            s3fs_root: "/mnt/s3fs".into(),
            workers: 4,
            profile: ConfigProfile::Prod,
        };
        assert_eq!(config.redis_url(), "redis://redis-host:6380/");
    }
}
