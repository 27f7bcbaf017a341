use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Client padding length is sampled uniformly from this range.
pub const PADDING_RANGE: std::ops::Range<usize> = 128..256;
pub const TOKEN_LEN: usize = 32;

/// `SHA-256(shared_secret)`, computed once per configured secret and reused
/// for every handshake so the raw secret only ever touches memory once.
#[derive(Clone)]
pub struct SecretHash([u8; 32]);

impl SecretHash {
	pub fn new(shared_secret: &[u8]) -> Self {
		let mut hasher = Sha256::new();
		hasher.update(shared_secret);
		Self(hasher.finalize().into())
	}

	/// `SHA-256(secret_hash || padding)`.
	pub fn token_for(&self, padding: &[u8]) -> [u8; 32] {
		let mut hasher = Sha256::new();
		hasher.update(self.0);
		hasher.update(padding);
		hasher.finalize().into()
	}

	/// Constant-time comparison of a candidate token against the token this
	/// secret would produce for `padding`.
	pub fn verify(&self, padding: &[u8], candidate: &[u8; 32]) -> bool {
		let expected = self.token_for(padding);
		expected.ct_eq(candidate).into()
	}
}

/// Builds the client's handshake payload: `token(32) || padding(128..256)`.
pub fn build_handshake_payload(secret: &SecretHash) -> Vec<u8> {
	let mut rng = rand::rng();
	let padding_len = PADDING_RANGE.start + (rng.next_u32() as usize % (PADDING_RANGE.end - PADDING_RANGE.start));
	let mut padding = vec![0u8; padding_len];
	rng.fill_bytes(&mut padding);

	let token = secret.token_for(&padding);

	let mut payload = Vec::with_capacity(TOKEN_LEN + padding_len);
	payload.extend_from_slice(&token);
	payload.extend_from_slice(&padding);
	payload
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn token_matches_hand_computed_hash() {
		let secret = SecretHash::new(b"test");
		let padding = vec![0u8; 128];

		let mut hasher = Sha256::new();
		hasher.update(Sha256::digest(b"test"));
		hasher.update(&padding);
		let expected: [u8; 32] = hasher.finalize().into();

		assert_eq!(secret.token_for(&padding), expected);
		assert!(secret.verify(&padding, &expected));
	}

	#[test]
	fn verify_rejects_wrong_secret() {
		let secret = SecretHash::new(b"test");
		let other = SecretHash::new(b"wrong");
		let padding = vec![1u8; 140];
		let token = other.token_for(&padding);
		assert!(!secret.verify(&padding, &token));
	}

	#[test]
	fn generated_padding_is_in_range() {
		let secret = SecretHash::new(b"test");
		for _ in 0..64 {
			let payload = build_handshake_payload(&secret);
			let padding_len = payload.len() - TOKEN_LEN;
			assert!(PADDING_RANGE.contains(&padding_len), "padding_len={padding_len}");
		}
	}
}
