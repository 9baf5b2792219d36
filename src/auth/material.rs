//! Opaque token material handed to credential consumers.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Access, ID, and refresh tokens issued together by an identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMaterial {
	/// Bearer token presented to resource servers.
	pub access_token: TokenSecret,
	/// OIDC ID token, when the grant returned one.
	pub id_token: Option<TokenSecret>,
	/// Renewal token, when the grant returned one.
	pub refresh_token: Option<TokenSecret>,
}
impl TokenMaterial {
	/// Creates material holding only an access token.
	pub fn new(access_token: impl Into<String>) -> Self {
		Self { access_token: TokenSecret::new(access_token), id_token: None, refresh_token: None }
	}

	/// Attaches an ID token.
	pub fn with_id_token(mut self, token: impl Into<String>) -> Self {
		self.id_token = Some(TokenSecret::new(token));

		self
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Returns `true` if a refresh token is present.
	pub fn has_refresh_token(&self) -> bool {
		self.refresh_token.is_some()
	}

	/// Keeps `previous`'s refresh token when this material arrived without one.
	///
	/// Some providers only rotate the access/ID tokens on a `refresh_token` grant.
	pub fn retain_refresh_token(mut self, previous: &TokenMaterial) -> Self {
		if self.refresh_token.is_none() {
			self.refresh_token = previous.refresh_token.clone();
		}

		self
	}
}
