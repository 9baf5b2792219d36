//! Parsed claim sets and unverified JWT payload inspection.
//!
//! Signature verification is the job of a verifying collaborator. The helpers here only read
//! the payload segment of a compact JWT, which is enough to learn when a token expires.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, error::ConfigError};

/// Claim set of the current token, including its authoritative expiry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Claims {
	/// `sub` claim, when present.
	pub subject: Option<String>,
	/// `iat` claim, when present.
	#[serde(with = "time::serde::timestamp::option")]
	pub issued_at: Option<OffsetDateTime>,
	/// `exp` claim; the instant the token stops being valid.
	#[serde(with = "time::serde::timestamp")]
	pub expires_at: OffsetDateTime,
	/// Every other claim carried by the token.
	pub extra: BTreeMap<String, Value>,
}
impl Claims {
	/// Creates a claim set expiring at the provided instant.
	pub fn new(expires_at: OffsetDateTime) -> Self {
		Self { subject: None, issued_at: None, expires_at, extra: BTreeMap::new() }
	}

	/// Creates a claim set issued now and expiring after `lifetime`.
	pub fn expiring_in(lifetime: Duration) -> Self {
		let now = OffsetDateTime::now_utc();

		Self::new(now + lifetime).with_issued_at(now)
	}

	/// Sets the subject.
	pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
		self.subject = Some(subject.into());

		self
	}

	/// Sets the issued-at instant.
	pub fn with_issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = Some(instant);

		self
	}

	/// Adds an arbitrary claim.
	pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.extra.insert(name.into(), value.into());

		self
	}

	/// Looks up an additional claim by name.
	pub fn claim(&self, name: &str) -> Option<&Value> {
		self.extra.get(name)
	}

	/// Decodes the payload of a compact JWT without checking its signature.
	pub fn from_unverified_jwt(token: &str) -> Result<Self> {
		let mut payload = decode_payload(token)?;
		let expires_at = match payload.remove("exp") {
			Some(value) => numeric_date(&value, "exp")?,
			None => return Err(ConfigError::MissingExpiry.into()),
		};
		let issued_at = payload.remove("iat").map(|value| numeric_date(&value, "iat")).transpose()?;
		let subject = match payload.remove("sub") {
			Some(Value::String(sub)) => Some(sub),
			Some(_) => return Err(ConfigError::malformed_claims("`sub` must be a string").into()),
			None => None,
		};

		Ok(Self { subject, issued_at, expires_at, extra: payload.into_iter().collect() })
	}

	/// Returns `true` if `instant` is at or past the expiry.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}
}

/// Reads the `exp` claim of a compact JWT without verifying it.
///
/// Returns `None` for opaque (non-JWT) tokens and for JWTs without a usable `exp`.
pub fn peek_jwt_expiry(token: &str) -> Option<OffsetDateTime> {
	let payload = decode_payload(token).ok()?;

	numeric_date(payload.get("exp")?, "exp").ok()
}

fn decode_payload(token: &str) -> Result<Map<String, Value>> {
	let mut segments = token.split('.');
	let payload = match (segments.next(), segments.next()) {
		(Some(_header), Some(payload)) if !payload.is_empty() => payload,
		_ => return Err(ConfigError::malformed_claims("token is not a compact JWT").into()),
	};
	let bytes = URL_SAFE_NO_PAD
		.decode(payload.trim_end_matches('='))
		.map_err(ConfigError::malformed_claims)?;

	serde_json::from_slice(&bytes).map_err(|e| ConfigError::malformed_claims(e).into())
}

fn numeric_date(value: &Value, name: &str) -> Result<OffsetDateTime> {
	let seconds = value
		.as_i64()
		.or_else(|| value.as_f64().map(|secs| secs.trunc() as i64))
		.ok_or_else(|| ConfigError::malformed_claims(format!("`{name}` must be a number")))?;

	OffsetDateTime::from_unix_timestamp(seconds)
		.map_err(|e| ConfigError::malformed_claims(format!("`{name}` is out of range: {e}")).into())
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	fn jwt(payload: &str) -> String {
		format!(
			"{}.{}.signature",
			URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
			URL_SAFE_NO_PAD.encode(payload)
		)
	}

	#[test]
	fn decodes_standard_claims_and_keeps_extras() {
		let token = jwt(r#"{"sub":"alice","iat":1735689600,"exp":1735693200,"email":"a@b.c"}"#);
		let claims = Claims::from_unverified_jwt(&token).expect("Payload should decode.");

		assert_eq!(claims.subject.as_deref(), Some("alice"));
		assert_eq!(claims.issued_at, Some(macros::datetime!(2025-01-01 00:00 UTC)));
		assert_eq!(claims.expires_at, macros::datetime!(2025-01-01 01:00 UTC));
		assert_eq!(claims.claim("email"), Some(&Value::from("a@b.c")));
		assert!(claims.claim("exp").is_none());
	}

	#[test]
	fn missing_expiry_is_an_invariant_violation() {
		let err = Claims::from_unverified_jwt(&jwt(r#"{"sub":"alice"}"#))
			.expect_err("Tokens without exp must be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::MissingExpiry)));
	}

	#[test]
	fn opaque_tokens_are_malformed() {
		let err = Claims::from_unverified_jwt("opaque-access-token")
			.expect_err("Opaque tokens carry no claims.");

		assert!(matches!(err, Error::Config(ConfigError::MalformedClaims { .. })));
		assert_eq!(peek_jwt_expiry("opaque-refresh-token"), None);
	}

	#[test]
	fn peek_reads_fractional_expiry() {
		let token = jwt(r#"{"exp":1735693200.75}"#);

		assert_eq!(peek_jwt_expiry(&token), Some(macros::datetime!(2025-01-01 01:00 UTC)));
	}

	#[test]
	fn expiry_boundary_is_inclusive() {
		let claims = Claims::new(macros::datetime!(2025-01-01 01:00 UTC));

		assert!(!claims.is_expired_at(macros::datetime!(2025-01-01 00:59:59 UTC)));
		assert!(claims.is_expired_at(macros::datetime!(2025-01-01 01:00 UTC)));
	}
}
