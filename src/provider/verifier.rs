//! Claims extraction for freshly issued tokens.

// self
use crate::{_prelude::*, auth::Claims, error::ConfigError, oauth::IssuedTokens};

/// Turns a token-endpoint response into the claims that drive renewal.
///
/// Production deployments plug in a verifier that checks signatures, issuer, and audience
/// against the provider's keys. The returned [`Claims::expires_at`] becomes the credential's
/// authoritative expiry.
pub trait ClaimsVerifier
where
	Self: Send + Sync,
{
	/// Verifies `tokens` and returns their claims.
	fn verify(&self, tokens: &IssuedTokens) -> Result<Claims>;
}

/// Reads claims without verifying signatures.
///
/// Uses the ID token payload when one was issued, then a JWT access token payload, and
/// finally `expires_in` for opaque access tokens. Suitable for tests and for deployments
/// where the resource server validates tokens itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnverifiedClaims;
impl ClaimsVerifier for UnverifiedClaims {
	fn verify(&self, tokens: &IssuedTokens) -> Result<Claims> {
		if let Some(id_token) = &tokens.material.id_token {
			return Claims::from_unverified_jwt(id_token.expose());
		}
		if let Ok(claims) = Claims::from_unverified_jwt(tokens.material.access_token.expose()) {
			return Ok(claims);
		}

		let expires_in = tokens.expires_in.ok_or(ConfigError::MissingExpiry)?;

		let expires_at =
			tokens.received_at.checked_add(expires_in).ok_or(ConfigError::ExpiresInOutOfRange)?;

		Ok(Claims::new(expires_at).with_issued_at(tokens.received_at))
	}
}
