use std::sync::Arc;

use fast_socks5::{
	Socks5Command,
	server::{SimpleUserPassword, Socks5ServerProtocol, SocksServerError},
};
use qtun_core::{info, io::copy_io, warn};
use qtun_proto::{
	connection::QuicStream,
	error::Error as TunnelError,
	pool::Pool,
	proto::{ResponseCode, encode_target},
};
use tokio::net::TcpStream;

use crate::{Error, convert_addr};

/// Credentials accepted by the local SOCKS5 listener; independent of the
/// tunnel's own shared-secret authentication.
pub enum AuthMode {
	NoAuth,
	Password { username: String, password: String },
}

/// Drives one accepted SOCKS5 connection end to end: negotiate, read the
/// CONNECT request, acquire a pooled tunnel connection, exchange the target
/// record, and relay bytes until either side closes.
pub async fn handle_client(stream: TcpStream, auth: &AuthMode, pool: Arc<Pool>) -> Result<(), Error> {
	let proto = match auth {
		AuthMode::NoAuth => Socks5ServerProtocol::accept_no_auth(stream).await?,
		AuthMode::Password { username, password } => {
			let checker = SimpleUserPassword { username: username.clone(), password: password.clone() };
			Socks5ServerProtocol::accept_password_auth(stream, checker).await?.0
		}
	};

	let (proto, cmd, target) = proto.read_command().await?;
	if cmd != Socks5Command::Connect {
		// BIND and UDP ASSOCIATE are out of scope; refuse anything but CONNECT.
		let _ = proto.reply_error(&fast_socks5::ReplyError::CommandNotSupported).await;
		return Err(SocksServerError::Bug("unsupported SOCKS5 command").into());
	}

	let host_target = convert_addr(&target);

	let mut attempts_left = 3u8;
	loop {
		let conn = pool.acquire().await?;

		conn.write_all(encode_target(&host_target)?.as_ref()).await?;
		let mut resp = [0u8; 1];
		conn.read_exact(&mut resp).await?;

		match ResponseCode::from(resp[0]).into_target_result() {
			Ok(()) => {
				let bind_addr = std::net::SocketAddr::from(([0, 0, 0, 0], 0));
				let mut socket = proto.reply_success(bind_addr).await?;
				info!(target: "[SOCKS]", "bridged to {host_target}");

				let (send, recv, _session) = conn.into_streams();
				let mut quic = QuicStream::new(send, recv);
				let (up, down, err) = copy_io(&mut socket, &mut quic).await;
				if let Some(err) = err {
					warn!(target: "[SOCKS]", "relay to {host_target} ended: {err}");
				}
				info!(target: "[SOCKS]", "relay to {host_target} done ({up}B up, {down}B down)");
				return Ok(());
			}
			Err(TunnelError::InvalidPassword { .. }) => {
				warn!(target: "[SOCKS]", "tunnel rejected our shared secret; refusing client");
				let _ = proto.reply_error(&fast_socks5::ReplyError::GeneralFailure).await;
				return Err(TunnelError::InvalidPassword { backtrace: std::backtrace::Backtrace::capture() }.into());
			}
			Err(err @ (TunnelError::InvalidHost { .. } | TunnelError::ConnectFailed { .. })) => {
				let _ = proto.reply_error(&fast_socks5::ReplyError::HostUnreachable).await;
				return Err(err.into());
			}
			Err(err) => {
				attempts_left -= 1;
				if attempts_left == 0 {
					let _ = proto.reply_error(&fast_socks5::ReplyError::GeneralFailure).await;
					return Err(err.into());
				}
				warn!(target: "[SOCKS]", "pooled connection failed ({err}); retrying with another one");
			}
		}
	}
}
