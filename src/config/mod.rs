use serde::Deserialize;
use std::net::IpAddr;

const DEFAULTS: &str = include_str!("defaults.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
	pub telemetry: TelemetryConfig,
	pub server: ServerConfig,
	pub database: DatabaseConfig,
	pub storage: StorageConfig,
	pub identity: IdentityConfig,
}

impl AppConfig {
	/// Loads the configuration from the embedded defaults, an optional `config.toml` in the
	/// working directory and `CASEGATE_`-prefixed environment variables, in that order.
	///
	/// Nested keys are separated by a double underscore, e.g. `CASEGATE_DATABASE__URL`.
	pub fn new() -> Result<Self, config::ConfigError> {
		config::Config::builder()
			.add_source(config::File::from_str(DEFAULTS, config::FileFormat::Toml))
			.add_source(config::File::with_name("config.toml").required(false))
			.add_source(
				config::Environment::with_prefix("CASEGATE")
					.prefix_separator("_")
					.separator("__"),
			)
			.build()?
			.try_deserialize()
	}

	/// The embedded defaults only, without file or environment overrides.
	#[cfg(test)]
	pub fn defaults() -> Self {
		config::Config::builder()
			.add_source(config::File::from_str(DEFAULTS, config::FileFormat::Toml))
			.build()
			.and_then(config::Config::try_deserialize)
			.unwrap()
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
	/// Default log level. `RUST_LOG` takes precedence.
	pub level: String,
	/// Sentry DSN. Sentry stays disabled if this is absent.
	pub sentry: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
	pub http: HttpServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
	// The interface the DICOMweb gateway will be listening on
	pub interface: IpAddr,
	pub port: u16,
	/// Path prefix that is stripped before routing, e.g. `/functions/v1/dicomweb`.
	pub base_path: String,
	pub graceful_shutdown: bool,
	/// Request timeout in seconds. No timeout is applied if absent.
	pub request_timeout: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
	/// Postgres connection string of the case store.
	pub url: String,
	pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
	/// Custom S3 endpoint (MinIO, Supabase storage, ...). Uses AWS if absent.
	pub endpoint: Option<String>,
	pub region: Option<String>,
	pub bucket: String,
	pub endpoint_style: S3EndpointStyle,
	pub credentials: Option<S3Credentials>,
	/// Upper bound for concurrent sub-folder listings during file discovery.
	pub listing_concurrency: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum S3EndpointStyle {
	Path,
	VHost,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Credentials {
	pub access_key: String,
	pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
	/// Organizational root that prefixes every synthesized study UID.
	pub uid_root: String,
}
