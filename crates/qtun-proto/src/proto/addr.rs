use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut};
use num_enum::{FromPrimitive, IntoPrimitive};
use qtun_core::types::TargetAddr;
use snafu::{ResultExt, ensure};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{Error, FailParseDomainSnafu, FqdnTooLongSnafu, UnknownAddressKindSnafu};

/// Codec for the target address record: `kind[1] || addr[var] || port[2]`.
#[derive(Debug, Clone, Copy)]
pub struct AddressCodec;

/// Address kind byte, fixed by the wire contract.
#[derive(IntoPrimitive, FromPrimitive, Copy, Clone, Debug, PartialEq)]
#[repr(u8)]
pub enum AddressKind {
	IPv4   = 1,
	IPv6   = 2,
	Fqdn   = 3,
	#[num_enum(catch_all)]
	Other(u8),
}

#[cfg(feature = "decode")]
impl Decoder for AddressCodec {
	type Error = Error;
	type Item = TargetAddr;

	fn decode(&mut self, src: &mut bytes::BytesMut) -> Result<Option<Self::Item>, Self::Error> {
		if src.is_empty() {
			return Ok(None);
		}

		let kind = AddressKind::from(src[0]);
		ensure!(!matches!(kind, AddressKind::Other(_)), UnknownAddressKindSnafu { value: u8::from(kind) });

		match kind {
			AddressKind::IPv4 => {
				if src.len() < 1 + 4 + 2 {
					return Ok(None);
				}
				src.advance(1);
				let mut octets = [0; 4];
				src.copy_to_slice(&mut octets);
				let port = src.get_u16();
				Ok(Some(TargetAddr::IPv4(Ipv4Addr::from(octets), port)))
			}
			AddressKind::IPv6 => {
				if src.len() < 1 + 16 + 2 {
					return Ok(None);
				}
				src.advance(1);
				let mut octets = [0; 16];
				src.copy_to_slice(&mut octets);
				let port = src.get_u16();
				Ok(Some(TargetAddr::IPv6(Ipv6Addr::from(octets), port)))
			}
			AddressKind::Fqdn => {
				if src.len() < 1 + 1 {
					return Ok(None);
				}
				let len = src[1] as usize;
				if src.len() < 1 + 1 + len + 2 {
					return Ok(None);
				}
				src.advance(2);
				let domain = &src[..len];
				let domain = std::str::from_utf8(domain).context(FailParseDomainSnafu)?.to_string();
				src.advance(len);
				let port = src.get_u16();
				Ok(Some(TargetAddr::Domain(domain, port)))
			}
			AddressKind::Other(value) => UnknownAddressKindSnafu { value }.fail(),
		}
	}
}

#[cfg(feature = "encode")]
impl Encoder<TargetAddr> for AddressCodec {
	type Error = Error;

	fn encode(&mut self, item: TargetAddr, dst: &mut bytes::BytesMut) -> Result<(), Self::Error> {
		match item {
			TargetAddr::IPv4(ip, port) => {
				dst.reserve(1 + 4 + 2);
				dst.put_u8(AddressKind::IPv4.into());
				dst.put_slice(&ip.octets());
				dst.put_u16(port);
			}
			TargetAddr::IPv6(ip, port) => {
				dst.reserve(1 + 16 + 2);
				dst.put_u8(AddressKind::IPv6.into());
				dst.put_slice(&ip.octets());
				dst.put_u16(port);
			}
			TargetAddr::Domain(domain, port) => {
				if domain.len() > u8::MAX as usize {
					return FqdnTooLongSnafu { domain, len: domain.len() }.fail();
				}
				dst.reserve(1 + 1 + domain.len() + 2);
				dst.put_u8(AddressKind::Fqdn.into());
				dst.put_u8(domain.len() as u8);
				dst.put_slice(domain.as_bytes());
				dst.put_u16(port);
			}
		}
		Ok(())
	}
}

/// Encodes a target address to its exact wire representation, without going
/// through the [`tokio_util::codec`] framing machinery. Used by callers that
/// already hold a plain byte buffer (e.g. before the first QUIC write).
#[cfg(feature = "encode")]
pub fn encode_target(addr: &TargetAddr) -> Result<bytes::Bytes, Error> {
	let mut buf = bytes::BytesMut::new();
	AddressCodec.encode(addr.clone(), &mut buf)?;
	Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
	use std::net::{Ipv4Addr, Ipv6Addr};

	use futures_util::SinkExt as _;
	use tokio_stream::StreamExt as _;
	use tokio_util::codec::{FramedRead, FramedWrite};

	use super::*;

	#[test_log::test(tokio::test)]
	async fn round_trips_every_kind() -> eyre::Result<()> {
		let vars = vec![
			TargetAddr::IPv4(Ipv4Addr::new(93, 184, 216, 34), 80),
			TargetAddr::IPv6(Ipv6Addr::UNSPECIFIED, 12),
			TargetAddr::Domain(String::from("example.com"), 443),
		];

		let buffer = Vec::with_capacity(128);
		let mut writer = FramedWrite::new(buffer, AddressCodec);
		for var in &vars {
			writer.send(var.clone()).await?;
		}

		let buffer = writer.get_ref();
		let mut reader = FramedRead::new(buffer.as_slice(), AddressCodec);
		for var in vars {
			let frame = reader.next().await.unwrap()?;
			assert_eq!(var, frame);
		}
		Ok(())
	}

	#[test_log::test(tokio::test)]
	async fn rejects_fqdn_over_255_bytes() {
		let domain = "a".repeat(256);
		let mut buf = bytes::BytesMut::new();
		let err = AddressCodec.encode(TargetAddr::Domain(domain, 80), &mut buf).unwrap_err();
		assert!(matches!(err, Error::FqdnTooLong { .. }));
	}

	#[test_log::test(tokio::test)]
	async fn rejects_unknown_kind_byte() {
		let mut buf = bytes::BytesMut::from(&[0x09u8, 0, 0, 0, 0, 0, 80][..]);
		let err = AddressCodec.decode(&mut buf).unwrap_err();
		assert!(matches!(err, Error::UnknownAddressKind { value: 0x09 }));
	}

	#[test_log::test(tokio::test)]
	async fn hex_check() -> eyre::Result<()> {
		let encoded = encode_target(&TargetAddr::Domain("example.com".into(), 443))?;
		assert_eq!(hex::encode(&encoded), "030b6578616d706c652e636f6d01bb");
		Ok(())
	}
}
