use std::sync::Arc;

use clap::Parser as _;
use qtun_core::info;
use qtun_proto::{pool::Pool, proto::SecretHash, tls::server_config};
use tokio_util::sync::CancellationToken;
use tracing::Level;

use crate::cli::{Cli, Commands, ConfigFormat};

mod cli;
mod conf;
mod log;

// curl --socks5 127.0.0.1:6666 example.com
#[tokio::main]
async fn main() -> eyre::Result<()> {
	{
		#[cfg(feature = "aws-lc-rs")]
		rustls::crypto::aws_lc_rs::default_provider().install_default().unwrap();
		#[cfg(feature = "ring")]
		rustls::crypto::ring::default_provider().install_default().unwrap();
	}

	log::init_log(Level::INFO)?;
	info!(target: "[MAIN]", "qtun starting");

	let cli = match Cli::try_parse() {
		Ok(v) => v,
		Err(err) => {
			println!("{:#}", err);
			return Ok(());
		}
	};

	if cli.version {
		const VER: &str = match option_env!("QTUN_OVERRIDE_VERSION") {
			Some(v) => v,
			None => env!("CARGO_PKG_VERSION"),
		};
		println!("qtun {VER}");
		return Ok(());
	}

	let Some(command) = cli.command else {
		println!("no subcommand given; run with --help");
		return Ok(());
	};

	match command {
		Commands::Init { format, output } => {
			let config = conf::PersistentConfig::default();
			let format_str = match format {
				ConfigFormat::Yaml => "yaml",
				ConfigFormat::Toml => "toml",
			};
			config.export_to_file(&output, format_str)?;
			println!("wrote default configuration to {}", output.display());
			Ok(())
		}
		Commands::Client => run_client(&cli).await,
		Commands::Server => run_server(&cli).await,
	}
}

async fn run_client(cli: &Cli) -> eyre::Result<()> {
	let persisted = conf::PersistentConfig::load(cli.config.clone(), cli.config_dir.clone())?;
	let runtime = conf::RuntimeConfig::from_persist(persisted)?;

	let cancel = CancellationToken::new();
	let capacity = Pool::capacity_for(runtime.pool_size);
	let worker_count = Pool::worker_count(runtime.pool_size);
	let pool = Arc::new(Pool::new(capacity, cancel.clone()));
	pool.spawn_refill_workers(runtime.dialer.clone(), worker_count);
	info!(target: "[MAIN]", "pool capacity {capacity}, {worker_count} refill workers");

	let socks_cancel = cancel.clone();
	let socks_task = tokio::spawn(async move { qtun_socks::inbound::listen(runtime.socks, pool, socks_cancel).await });

	tokio::select! {
		_ = tokio::signal::ctrl_c() => {
			info!(target: "[MAIN]", "shutting down");
			cancel.cancel();
		}
		result = socks_task => {
			result??;
		}
	}

	Ok(())
}

async fn run_server(cli: &Cli) -> eyre::Result<()> {
	let persisted = conf::PersistentConfig::load(cli.config.clone(), cli.config_dir.clone())?;
	let runtime = conf::RuntimeConfig::from_persist(persisted)?;

	let cert_path = runtime.cert_path.ok_or_else(|| eyre::eyre!("server mode requires tunnel.cert_path"))?;
	let key_path = runtime.key_path.ok_or_else(|| eyre::eyre!("server mode requires tunnel.key_path"))?;
	let (cert_chain, key) = load_cert_and_key(&cert_path, &key_path)?;

	let tls = server_config(cert_chain, key).map_err(|err| eyre::eyre!("building server TLS config: {err}"))?;
	let server_tls_config = quinn::ServerConfig::with_crypto(Arc::new(tls));
	let endpoint = quinn::Endpoint::server(server_tls_config, runtime.server_listen_addr)?;
	info!(target: "[MAIN]", "listening on {}", runtime.server_listen_addr);

	let secret = runtime.dialer.secret.clone();
	let cancel = CancellationToken::new();
	let accept_cancel = cancel.clone();
	let accept_task = tokio::spawn(qtun_proto::server::accept_loop(endpoint, secret, accept_cancel));

	tokio::select! {
		_ = tokio::signal::ctrl_c() => {
			info!(target: "[MAIN]", "shutting down");
			cancel.cancel();
		}
		result = accept_task => {
			result??;
		}
	}

	Ok(())
}

fn load_cert_and_key(
	cert_path: &std::path::Path,
	key_path: &std::path::Path,
) -> eyre::Result<(Vec<rustls::pki_types::CertificateDer<'static>>, rustls::pki_types::PrivateKeyDer<'static>)> {
	let cert_file = std::fs::File::open(cert_path)?;
	let mut cert_reader = std::io::BufReader::new(cert_file);
	let cert_chain = rustls_pemfile::certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;

	let key_file = std::fs::File::open(key_path)?;
	let mut key_reader = std::io::BufReader::new(key_file);
	let key = rustls_pemfile::private_key(&mut key_reader)?.ok_or_else(|| eyre::eyre!("no private key found in {}", key_path.display()))?;

	Ok((cert_chain, key))
}
