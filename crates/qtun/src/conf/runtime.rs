use std::sync::Arc;

use qtun_proto::{client::DialerOpts, proto::SecretHash, tls::client_config};
use qtun_socks::inbound::SocksInboundOpts;

use super::persistent::PersistentConfig;

/// Immutable, validated configuration derived from [`PersistentConfig`]. This
/// is what the rest of the binary actually consumes; the persistent shape
/// exists only to round-trip through `figment`.
pub struct RuntimeConfig {
	pub socks:  SocksInboundOpts,
	pub dialer: Arc<DialerOpts>,

	pub server_listen_addr: std::net::SocketAddr,
	pub cert_path:          Option<std::path::PathBuf>,
	pub key_path:           Option<std::path::PathBuf>,

	pub pool_size: usize,
}

impl RuntimeConfig {
	pub fn from_persist(config: PersistentConfig) -> eyre::Result<Self> {
		let tls = client_config().map_err(|err| eyre::eyre!("building client TLS config: {err}"))?;
		let secret = Arc::new(SecretHash::new(config.tunnel.shared_secret.as_bytes()));

		// The configured host may be a name rather than a literal IP; resolve it
		// up front so a bad address surfaces at startup instead of on first dial.
		let remote = {
			use std::net::ToSocketAddrs;
			(config.tunnel.server_host.as_str(), config.tunnel.server_port)
				.to_socket_addrs()?
				.next()
				.ok_or_else(|| eyre::eyre!("cannot resolve {}", config.tunnel.server_host))?
		};

		let dialer = Arc::new(DialerOpts { remote, server_name: config.tunnel.sni.clone(), tls, secret });

		Ok(Self {
			socks: SocksInboundOpts { listen_addr: config.socks.listen_addr, auth: config.socks.auth.into() },
			dialer,
			server_listen_addr: config.tunnel.listen_addr,
			cert_path: config.tunnel.cert_path,
			key_path: config.tunnel.key_path,
			pool_size: config.tunnel.pool_size,
		})
	}
}
