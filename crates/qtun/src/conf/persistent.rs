use std::{net::SocketAddr, path::PathBuf, time::Duration};

use educe::Educe;
use figment::{
	Figment,
	providers::{Env, Format, Toml, Yaml},
};
use qtun_socks::bridge::AuthMode;
use serde::{Deserialize, Serialize};

/// On-disk configuration shape. Deserialized via `figment`, then converted
/// into [`super::runtime::RuntimeConfig`], the immutable shape the client
/// dialer, pool, and server actually consume.
#[derive(Debug, Deserialize, Serialize, Educe)]
#[educe(Default)]
pub struct PersistentConfig {
	pub socks:   SocksOpt,
	pub tunnel:  TunnelOpt,
}

#[derive(Debug, Deserialize, Serialize, Educe)]
#[educe(Default)]
pub struct SocksOpt {
	#[educe(Default(expression = "127.0.0.1:6666".parse().unwrap()))]
	pub listen_addr: SocketAddr,

	#[educe(Default = AuthModeConfig::NoAuth)]
	pub auth: AuthModeConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, Educe)]
#[educe(Default)]
pub enum AuthModeConfig {
	#[educe(Default)]
	NoAuth,
	Password { username: String, password: String },
}

impl From<AuthModeConfig> for AuthMode {
	fn from(config: AuthModeConfig) -> Self {
		match config {
			AuthModeConfig::NoAuth => AuthMode::NoAuth,
			AuthModeConfig::Password { username, password } => AuthMode::Password { username, password },
		}
	}
}

#[derive(Debug, Deserialize, Serialize, Educe)]
#[educe(Default)]
pub struct TunnelOpt {
	/// Server host; resolved at dial time, so either a name or a literal IP
	/// works here.
	#[educe(Default = "127.0.0.1")]
	pub server_host: String,

	#[educe(Default(expression = 9443))]
	pub server_port: u16,

	#[educe(Default = "localhost")]
	pub sni: String,

	#[educe(Default = "change-me")]
	pub shared_secret: String,

	#[educe(Default(expression = 128))]
	pub pool_size: usize,

	#[serde(with = "humantime_serde")]
	#[educe(Default(expression = Duration::from_secs(60)))]
	pub handshake_timeout: Duration,

	/// Paths are only meaningful for `server`; the client only dials.
	pub cert_path: Option<PathBuf>,
	pub key_path:  Option<PathBuf>,

	/// Bind address for `server` mode.
	#[educe(Default(expression = "0.0.0.0:9443".parse().unwrap()))]
	pub listen_addr: SocketAddr,
}

impl PersistentConfig {
	pub fn export_to_file(&self, file_path: &PathBuf, format: &str) -> eyre::Result<()> {
		use std::{fs, io::Write};

		match format.to_lowercase().as_str() {
			"yaml" => {
				let yaml_content = serde_yaml::to_string(&self)?;
				let mut file = fs::File::create(file_path)?;
				file.write_all(yaml_content.as_bytes())?;
			}
			"toml" => {
				let toml_content = toml::to_string_pretty(&self)?;
				let mut file = fs::File::create(file_path)?;
				file.write_all(toml_content.as_bytes())?;
			}
			_ => return Err(eyre::eyre!("unsupported file format: {}", format)),
		}

		Ok(())
	}

	pub fn load(config_path: Option<String>, config_dir: Option<PathBuf>) -> eyre::Result<Self> {
		let mut figment = Figment::new();

		if let Some(config_dir) = config_dir {
			let toml_file = config_dir.join("config.toml");
			if toml_file.exists() {
				figment = figment.merge(Toml::file(toml_file));
			}
			let yaml_file = config_dir.join("config.yaml");
			if yaml_file.exists() {
				figment = figment.merge(Yaml::file(yaml_file));
			}
		} else {
			let toml_file = std::path::Path::new("config.toml");
			if toml_file.exists() {
				figment = figment.merge(Toml::file(toml_file));
			}
			let yaml_file = std::path::Path::new("config.yaml");
			if yaml_file.exists() {
				figment = figment.merge(Yaml::file(yaml_file));
			}
		}

		if let Some(config_path) = config_path {
			if config_path.ends_with(".yaml") || config_path.ends_with(".yml") {
				figment = figment.merge(Yaml::file(config_path));
			} else {
				figment = figment.merge(Toml::file(config_path));
			}
		}

		// Environment variables override both discovered and explicit files.
		figment = figment.merge(Env::prefixed("QTUN_"));

		Ok(figment.extract()?)
	}
}
