use std::{net::SocketAddr, sync::Arc};

use qtun_core::{info, warn};
use qtun_proto::pool::Pool;
use snafu::ResultExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::{
	BindSocketSnafu, Error, IoSnafu,
	bridge::{AuthMode, handle_client},
};

pub struct SocksInboundOpts {
	pub listen_addr: SocketAddr,
	pub auth:        AuthMode,
}

/// Binds the local SOCKS5 listener and spawns one bridge task per accepted
/// connection until `cancel` fires.
pub async fn listen(opts: SocksInboundOpts, pool: Arc<Pool>, cancel: CancellationToken) -> Result<(), Error> {
	let listener = TcpListener::bind(opts.listen_addr).await.context(BindSocketSnafu { socket_addr: opts.listen_addr })?;
	info!(target: "[SOCKS]", "listening on {}", opts.listen_addr);

	let auth = Arc::new(opts.auth);
	loop {
		tokio::select! {
			_ = cancel.cancelled() => {
				info!(target: "[SOCKS]", "listener stopping");
				return Ok(());
			}
			accepted = listener.accept() => {
				let (stream, peer) = accepted.context(IoSnafu)?;
				let pool = pool.clone();
				let auth = auth.clone();
				tokio::spawn(async move {
					if let Err(err) = handle_client(stream, &auth, pool).await {
						warn!(target: "[SOCKS]", "client {peer} failed: {err}");
					}
				});
			}
		}
	}
}
