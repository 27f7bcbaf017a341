use std::{net::SocketAddr, sync::Arc, time::Duration};

use qtun_core::{error, info, io::copy_io, types::TargetAddr, warn};
use tokio::{io::AsyncReadExt, net::TcpStream};
use tokio_util::{codec::Decoder, sync::CancellationToken};

use crate::{
	connection::QuicStream,
	proto::{AddressCodec, ResponseCode, SecretHash},
};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);
const TOKEN_LEN: usize = 32;
const MAX_PADDING: usize = 256;
const PADDING_CHUNK: usize = 32;

/// Binds a QUIC endpoint and accepts sessions until `cancel` fires. Each
/// session and each stream on it gets its own task; a session's lifetime is
/// its idle timeout plus however long its streams stay active.
pub async fn accept_loop(
	endpoint: quinn::Endpoint,
	secret: Arc<SecretHash>,
	cancel: CancellationToken,
) -> Result<(), std::io::Error> {
	loop {
		tokio::select! {
			_ = cancel.cancelled() => {
				endpoint.close(0u32.into(), b"shutting down");
				info!(target: "[SERVER]", "accept loop stopped");
				return Ok(());
			}
			incoming = endpoint.accept() => {
				let Some(incoming) = incoming else {
					return Ok(());
				};
				let secret = secret.clone();
				let cancel = cancel.clone();
				tokio::spawn(async move {
					match incoming.await {
						Ok(session) => handle_session(session, secret, cancel).await,
						Err(err) => warn!(target: "[SERVER]", "handshake failed: {err}"),
					}
				});
			}
		}
	}
}

async fn handle_session(session: quinn::Connection, secret: Arc<SecretHash>, cancel: CancellationToken) {
	let remote = session.remote_address();
	info!(target: "[SERVER]", "session accepted from {remote}");
	loop {
		tokio::select! {
			_ = cancel.cancelled() => return,
			accepted = session.accept_bi() => {
				match accepted {
					Ok((send, recv)) => {
						let secret = secret.clone();
						tokio::spawn(async move {
							if let Err(err) = handle_stream(send, recv, remote, secret).await {
								warn!(target: "[SERVER]", "stream from {remote} failed: {err}");
							}
						});
					}
					Err(_) => return,
				}
			}
		}
	}
}

async fn handle_stream(
	mut send: quinn::SendStream,
	mut recv: quinn::RecvStream,
	remote: SocketAddr,
	secret: Arc<SecretHash>,
) -> Result<(), std::io::Error> {
	if !authenticate(&mut send, &mut recv, &secret).await? {
		// Silent close: no response byte on auth failure, matching the
		// anti-probing requirement. A passive observer sees the same
		// behavior as a stalled stream.
		return Ok(());
	}

	let target = match read_target(&mut recv).await {
		Ok(target) => target,
		Err(_) => {
			write_response(&mut send, ResponseCode::InvalidHost).await?;
			return Ok(());
		}
	};

	let target_addr = match target.to_socket_addr() {
		Ok(addr) => addr,
		Err(_) => {
			write_response(&mut send, ResponseCode::InvalidHost).await?;
			return Ok(());
		}
	};

	let tcp = match tokio::time::timeout(Duration::from_secs(10), TcpStream::connect(target_addr)).await {
		Ok(Ok(tcp)) => tcp,
		_ => {
			write_response(&mut send, ResponseCode::ConnectFailed).await?;
			return Ok(());
		}
	};

	write_response(&mut send, ResponseCode::Ok).await?;
	info!(target: "[SERVER]", "relaying {remote} <-> {target_addr}");

	let mut quic = QuicStream::new(send, recv);
	let mut tcp = tcp;
	let (up, down, err) = copy_io(&mut quic, &mut tcp).await;
	if let Some(err) = err {
		error!(target: "[SERVER]", "relay {remote} <-> {target_addr} ended: {err}");
	}
	info!(target: "[SERVER]", "relay {remote} <-> {target_addr} done ({up}B up, {down}B down)");
	Ok(())
}

/// Reads the 32-byte token and up to 256 bytes of padding in chunks,
/// recomputing `SHA-256(secret_hash || padding_so_far)` after each chunk.
/// Matches as soon as any prefix hashes correctly; times out or exhausts the
/// padding budget silently.
async fn authenticate(
	send: &mut quinn::SendStream,
	recv: &mut quinn::RecvStream,
	secret: &SecretHash,
) -> Result<bool, std::io::Error> {
	let deadline = tokio::time::Instant::now() + HANDSHAKE_TIMEOUT;

	let mut token = [0u8; TOKEN_LEN];
	match tokio::time::timeout_at(deadline, recv.read_exact(&mut token)).await {
		Ok(Ok(())) => {}
		_ => return Ok(false),
	}

	let mut padding = Vec::with_capacity(MAX_PADDING);
	loop {
		if secret.verify(&padding, &token) {
			write_response(send, ResponseCode::AuthOk).await?;
			return Ok(true);
		}
		if padding.len() >= MAX_PADDING {
			return Ok(false);
		}
		let remaining = MAX_PADDING - padding.len();
		let chunk_len = PADDING_CHUNK.min(remaining);
		let mut chunk = vec![0u8; chunk_len];
		match tokio::time::timeout_at(deadline, recv.read_exact(&mut chunk)).await {
			Ok(Ok(())) => padding.extend_from_slice(&chunk),
			_ => return Ok(false),
		}
	}
}

async fn read_target(recv: &mut quinn::RecvStream) -> Result<TargetAddr, std::io::Error> {
	let mut kind = [0u8; 1];
	recv.read_exact(&mut kind).await.map_err(std::io::Error::other)?;

	let mut decoder = AddressCodec;
	let mut buf = bytes::BytesMut::from(&kind[..]);
	loop {
		if let Ok(Some(addr)) = decoder.decode(&mut buf) {
			return Ok(addr);
		}
		let mut more = [0u8; 16];
		let n = recv.read(&mut more).await.map_err(std::io::Error::other)?;
		if n == 0 {
			return Err(std::io::Error::other("truncated target record"));
		}
		buf.extend_from_slice(&more[..n]);
	}
}

async fn write_response(send: &mut quinn::SendStream, code: ResponseCode) -> Result<(), std::io::Error> {
	use tokio::io::AsyncWriteExt as _;
	send.write_all(&[u8::from(code)]).await.map_err(std::io::Error::other)
}
