use std::backtrace::Backtrace;

use snafu::prelude::*;

/// Failures surfaced by the tunnel protocol crate.
///
/// Each variant corresponds to one of the error kinds named by the component
/// design: malformed wire data is a protocol error, a dial/accept/stream
/// failure is a transport error, a handshake mismatch is an authentication
/// error, and so on. The binary crate flattens these into its own reporting
/// error at the outermost boundary.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
	#[snafu(display("FQDN {domain:?} is {len} bytes, which exceeds the 255-byte wire limit"))]
	FqdnTooLong { domain: String, len: usize, backtrace: Backtrace },

	#[snafu(display("unknown target address kind {value}"))]
	UnknownAddressKind { value: u8, backtrace: Backtrace },

	#[snafu(display("domain bytes are not valid UTF-8"))]
	FailParseDomain { source: std::str::Utf8Error, backtrace: Backtrace },

	#[snafu(display("unknown response code {value}"))]
	UnknownResponseCode { value: u8, backtrace: Backtrace },

	#[snafu(display("server rejected the shared secret"))]
	InvalidPassword { backtrace: Backtrace },

	#[snafu(display("server could not decode the target address"))]
	InvalidHost { backtrace: Backtrace },

	#[snafu(display("server could not connect to the target"))]
	ConnectFailed { backtrace: Backtrace },

	#[snafu(display("handshake did not complete before its deadline"))]
	HandshakeTimeout { backtrace: Backtrace },

	#[snafu(display("tunnel connection is already closed"))]
	ConnectionClosed { backtrace: Backtrace },

	#[snafu(display("pool dequeue timed out after {seconds}s"))]
	PoolTimeout { seconds: u64, backtrace: Backtrace },

	#[snafu(display("pool shutdown was requested"))]
	PoolShuttingDown { backtrace: Backtrace },

	#[snafu(display("QUIC connect failed"))]
	Connect { source: quinn::ConnectError, backtrace: Backtrace },

	#[snafu(display("QUIC connection failed"))]
	Connection { source: quinn::ConnectionError, backtrace: Backtrace },

	#[snafu(display("QUIC write failed"))]
	Write { source: quinn::WriteError, backtrace: Backtrace },

	#[snafu(display("QUIC read failed"))]
	Read { source: quinn::ReadError, backtrace: Backtrace },

	#[snafu(display("QUIC read_exact failed"))]
	ReadExact { source: quinn::ReadExactError, backtrace: Backtrace },

	Io { source: std::io::Error, backtrace: Backtrace },
}

impl From<std::io::Error> for Error {
	#[inline(always)]
	fn from(source: std::io::Error) -> Self {
		#[cfg(debug_assertions)]
		panic!("IO error should not be created by From<io::Error>: {source}");
		#[cfg(not(debug_assertions))]
		{
			use snafu::IntoError as _;
			IoSnafu.into_error(source)
		}
	}
}

impl From<quinn::ConnectError> for Error {
	fn from(source: quinn::ConnectError) -> Self {
		use snafu::IntoError as _;
		ConnectSnafu.into_error(source)
	}
}

impl From<quinn::ConnectionError> for Error {
	fn from(source: quinn::ConnectionError) -> Self {
		use snafu::IntoError as _;
		ConnectionSnafu.into_error(source)
	}
}

impl From<quinn::WriteError> for Error {
	fn from(source: quinn::WriteError) -> Self {
		use snafu::IntoError as _;
		WriteSnafu.into_error(source)
	}
}

impl From<quinn::ReadExactError> for Error {
	fn from(source: quinn::ReadExactError) -> Self {
		use snafu::IntoError as _;
		ReadExactSnafu.into_error(source)
	}
}

impl Error {
	/// Whether this error rules out retrying with a different pooled
	/// connection (vs. being a config-fatal or target-fatal response).
	pub fn is_recoverable(&self) -> bool {
		!matches!(self, Error::InvalidPassword { .. } | Error::ConnectFailed { .. } | Error::InvalidHost { .. })
	}
}
