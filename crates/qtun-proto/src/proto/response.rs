use num_enum::{FromPrimitive, IntoPrimitive};

use crate::error::{ConnectFailedSnafu, Error, InvalidHostSnafu, InvalidPasswordSnafu, UnknownResponseCodeSnafu};

/// The single response byte the server writes after each handshake step.
/// The numbering is part of the wire contract and MUST NOT change without a
/// protocol version bump.
#[derive(IntoPrimitive, FromPrimitive, Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ResponseCode {
	AuthOk          = 0x01,
	Ok              = 0x02,
	InvalidPassword = 0x03,
	InvalidHost     = 0x04,
	ConnectFailed   = 0x05,
	#[num_enum(catch_all)]
	Other(u8),
}

impl ResponseCode {
	/// Converts a target-stage response byte into the matching protocol
	/// error, or `Ok(())` for [`ResponseCode::Ok`].
	pub fn into_target_result(self) -> Result<(), Error> {
		use snafu::IntoError as _;
		match self {
			ResponseCode::Ok => Ok(()),
			ResponseCode::InvalidHost => Err(InvalidHostSnafu.build()),
			ResponseCode::ConnectFailed => Err(ConnectFailedSnafu.build()),
			ResponseCode::InvalidPassword => Err(InvalidPasswordSnafu.build()),
			ResponseCode::Other(value) => Err(UnknownResponseCodeSnafu { value }.build()),
		}
	}

	/// Converts a handshake-stage response byte into the matching result.
	pub fn into_auth_result(self) -> Result<(), Error> {
		use snafu::IntoError as _;
		match self {
			ResponseCode::AuthOk => Ok(()),
			ResponseCode::InvalidPassword => Err(InvalidPasswordSnafu.build()),
			ResponseCode::Other(value) => Err(UnknownResponseCodeSnafu { value }.build()),
			other => Err(UnknownResponseCodeSnafu { value: u8::from(other) }.build()),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn wire_values_are_fixed() {
		assert_eq!(u8::from(ResponseCode::AuthOk), 0x01);
		assert_eq!(u8::from(ResponseCode::Ok), 0x02);
		assert_eq!(u8::from(ResponseCode::InvalidPassword), 0x03);
		assert_eq!(u8::from(ResponseCode::InvalidHost), 0x04);
		assert_eq!(u8::from(ResponseCode::ConnectFailed), 0x05);
	}
}
