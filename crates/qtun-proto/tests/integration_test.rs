//! End-to-end tests driving a real QUIC endpoint pair over loopback: a
//! client dials, authenticates, sends a target record, and relays bytes
//! against a stub TCP listener playing the role of the target.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use qtun_core::types::TargetAddr;
use qtun_proto::{
	client::{DialerOpts, dial},
	proto::{SecretHash, encode_target},
	tls,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::TcpListener,
};
use tokio_util::sync::CancellationToken;

fn self_signed_cert() -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
	let cert = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
	let cert_der = CertificateDer::from(cert.cert);
	let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());
	(vec![cert_der], PrivateKeyDer::Pkcs8(key_der))
}

fn install_crypto_provider() {
	static INIT: std::sync::Once = std::sync::Once::new();
	INIT.call_once(|| {
		let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
	});
}

async fn start_server(secret: Arc<SecretHash>) -> (SocketAddr, CancellationToken) {
	install_crypto_provider();
	let (cert_chain, key) = self_signed_cert();
	let server_config = tls::server_config(cert_chain, key).unwrap();
	let endpoint = quinn::Endpoint::server(
		quinn::ServerConfig::with_crypto(Arc::new(server_config)),
		"127.0.0.1:0".parse().unwrap(),
	)
	.unwrap();
	let addr = endpoint.local_addr().unwrap();

	let cancel = CancellationToken::new();
	let server_cancel = cancel.clone();
	tokio::spawn(async move {
		let _ = qtun_proto::server::accept_loop(endpoint, secret, server_cancel).await;
	});
	(addr, cancel)
}

async fn dial_authenticated(addr: SocketAddr, secret: Arc<SecretHash>) -> qtun_proto::Error {
	install_crypto_provider();
	let opts = DialerOpts {
		remote: addr,
		server_name: "localhost".to_string(),
		tls: qtun_proto::tls::client_config().unwrap(),
		secret,
	};
	dial(&opts).await.unwrap_err()
}

#[test_log::test(tokio::test)]
async fn happy_path_relays_bytes_over_tcp() -> eyre::Result<()> {
	let secret = Arc::new(SecretHash::new(b"correct horse battery staple"));
	let (server_addr, _cancel) = start_server(secret.clone()).await;

	let target_listener = TcpListener::bind("127.0.0.1:0").await?;
	let target_addr = target_listener.local_addr()?;
	let target_ip = match target_addr.ip() {
		std::net::IpAddr::V4(v4) => v4,
		_ => unreachable!("bound to an IPv4 loopback address"),
	};
	tokio::spawn(async move {
		let (mut sock, _) = target_listener.accept().await.unwrap();
		let mut buf = [0u8; 9];
		sock.read_exact(&mut buf).await.unwrap();
		assert_eq!(&buf, b"GET /\r\n\r\n");
		sock.write_all(b"OK\n").await.unwrap();
	});

	let opts = DialerOpts {
		remote: server_addr,
		server_name: "localhost".to_string(),
		tls: tls::client_config()?,
		secret,
	};
	let conn = dial(&opts).await?;

	conn.write_all(encode_target(&TargetAddr::IPv4(target_ip, target_addr.port()))?.as_ref()).await?;

	let mut resp = [0u8; 1];
	conn.read_exact(&mut resp).await?;
	assert_eq!(resp[0], 0x02, "expected OK response code");

	let (mut send, mut recv, _session) = conn.into_streams();
	send.write_all(b"GET /\r\n\r\n").await?;
	let mut reply = [0u8; 3];
	recv.read_exact(&mut reply).await?;
	assert_eq!(&reply, b"OK\n");

	Ok(())
}

#[test_log::test(tokio::test)]
async fn wrong_secret_never_gets_a_response() -> eyre::Result<()> {
	let server_secret = Arc::new(SecretHash::new(b"correct horse battery staple"));
	let (server_addr, _cancel) = start_server(server_secret).await;

	let wrong_secret = Arc::new(SecretHash::new(b"guess"));
	let err = dial_authenticated(server_addr, wrong_secret).await;
	// The server closes the stream silently rather than writing a response
	// byte, so the client observes a transport-level failure, never an
	// explicit InvalidPassword response.
	assert!(!matches!(err, qtun_proto::Error::InvalidPassword { .. }));
	Ok(())
}

#[test_log::test(tokio::test)]
async fn unreachable_target_returns_connect_failed() -> eyre::Result<()> {
	let secret = Arc::new(SecretHash::new(b"shared"));
	let (server_addr, _cancel) = start_server(secret.clone()).await;

	let opts = DialerOpts { remote: server_addr, server_name: "localhost".to_string(), tls: tls::client_config()?, secret };
	let conn = dial(&opts).await?;

	// Nothing listens on this port.
	conn.write_all(encode_target(&TargetAddr::IPv4(std::net::Ipv4Addr::LOCALHOST, 1))?.as_ref()).await?;

	let mut resp = [0u8; 1];
	tokio::time::timeout(Duration::from_secs(5), conn.read_exact(&mut resp)).await??;
	assert_eq!(resp[0], 0x05, "expected CONNECT_FAILED response code");
	Ok(())
}
