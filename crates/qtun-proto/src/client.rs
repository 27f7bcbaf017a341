use std::{net::SocketAddr, sync::Arc, time::Duration};

use qtun_core::info;

use crate::{
	connection::TunnelConnection,
	error::Error,
	proto::{ResponseCode, SecretHash, build_handshake_payload},
};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);
pub const ALPN: &[u8] = b"h3-27";

/// Client-side dial options. TLS configuration (trust anchors, SNI) is built
/// by the caller via [`crate::tls::client_config`] and handed in opaque.
pub struct DialerOpts {
	pub remote:       SocketAddr,
	pub server_name:  String,
	pub tls:          quinn::crypto::rustls::QuicClientConfig,
	pub secret:       Arc<SecretHash>,
}

/// Dials a fresh QUIC session to `opts.remote`, opens one bidirectional
/// stream, and runs the padded authentication handshake on it. Returns a
/// ready, authenticated [`TunnelConnection`] on `AUTH_OK`.
pub async fn dial(opts: &DialerOpts) -> Result<TunnelConnection, Error> {
	let client_config = quinn::ClientConfig::new(Arc::new(opts.tls.clone()));
	let mut endpoint = quinn::Endpoint::client("0.0.0.0:0".parse().unwrap())?;
	endpoint.set_default_client_config(client_config);

	let connecting = endpoint.connect(opts.remote, &opts.server_name)?;
	let session = connecting.await?;

	let conn = TunnelConnection::open(session).await?;
	conn.set_deadline(Some(HANDSHAKE_TIMEOUT)).await;

	match handshake(&conn, &opts.secret).await {
		Ok(()) => {
			conn.set_deadline(None).await;
			info!(target: "[CLIENT]", "authenticated tunnel to {}", conn.remote_addr());
			Ok(conn)
		}
		Err(err) => {
			conn.close().await;
			Err(err)
		}
	}
}

/// Runs the padded authentication handshake on an already-open stream.
///
/// quinn's open_bi() is observable on the server's accept_bi() as soon as
/// the first bytes land, so the handshake payload itself unblocks the
/// accept side; no separate priming write is needed.
async fn handshake(conn: &TunnelConnection, secret: &SecretHash) -> Result<(), Error> {
	let payload = build_handshake_payload(secret);
	conn.write_all(&payload).await?;

	let mut resp = [0u8; 1];
	conn.read_exact(&mut resp).await?;
	ResponseCode::from(resp[0]).into_auth_result()
}
