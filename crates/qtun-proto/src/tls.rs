use std::sync::Arc;

use rustls::crypto::CryptoProvider;

use crate::client::ALPN;

/// Builds a client TLS config trusting the platform root store (TLS 1.3
/// only), with ALPN fixed to the tunnel protocol's negotiated value.
pub fn client_config() -> Result<quinn::crypto::rustls::QuicClientConfig, rustls::Error> {
	use rustls::ClientConfig;
	use rustls_platform_verifier::BuilderVerifierExt;

	let provider = CryptoProvider::get_default().expect("no default rustls crypto provider installed");
	let mut config = ClientConfig::builder_with_provider(provider.clone())
		.with_protocol_versions(&[&rustls::version::TLS13])
		.unwrap()
		.with_platform_verifier()
		.with_no_client_auth();
	config.alpn_protocols = vec![ALPN.to_vec()];
	quinn::crypto::rustls::QuicClientConfig::try_from(config)
}

/// Builds a server TLS config from an already-loaded certificate chain and
/// private key. Loading the PEM/DER material from disk is outside this
/// crate's scope; the caller supplies parsed `rustls` types.
pub fn server_config(
	cert_chain: Vec<rustls::pki_types::CertificateDer<'static>>,
	key: rustls::pki_types::PrivateKeyDer<'static>,
) -> Result<quinn::crypto::rustls::QuicServerConfig, rustls::Error> {
	let provider = CryptoProvider::get_default().expect("no default rustls crypto provider installed");
	let mut config = rustls::ServerConfig::builder_with_provider(provider.clone())
		.with_protocol_versions(&[&rustls::version::TLS13])
		.unwrap()
		.with_no_client_auth()
		.with_single_cert(cert_chain, key)?;
	config.alpn_protocols = vec![ALPN.to_vec()];
	quinn::crypto::rustls::QuicServerConfig::try_from(Arc::new(config))
}
