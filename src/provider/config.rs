//! Validated identity-provider settings.

// std
use std::net::IpAddr;
// crates.io
use url::Host;
// self
use crate::{
	_prelude::*,
	auth::{ProviderId, TokenSecret},
};

/// Client authentication modes for token-endpoint calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
	#[default]
	/// HTTP Basic with `client_id`/`client_secret`.
	ClientSecretBasic,
	/// Form POST body parameters for `client_id`/`client_secret`.
	ClientSecretPost,
	/// Public client; only `client_id` is sent.
	None,
}

/// Grant used to renew a credential.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalGrant {
	#[default]
	/// Exchange the credential's refresh token (end-user sessions).
	RefreshToken,
	/// Re-issue through `client_credentials` (service identities).
	ClientCredentials,
}

/// Errors raised while building or validating an [`IdpConfig`].
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum IdpConfigError {
	/// Token endpoint is mandatory.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Client identifier is mandatory.
	#[error("Missing client identifier.")]
	MissingClientId,
	/// Secret-based authentication needs a secret.
	#[error("The {method:?} client authentication method requires a client secret.")]
	MissingClientSecret {
		/// Configured authentication method.
		method: ClientAuthMethod,
	},
	/// Endpoints must use HTTPS unless they point at the local machine.
	#[error("The token endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// Scope tokens must be non-empty and free of whitespace.
	#[error("Scope `{scope}` is invalid.")]
	InvalidScope {
		/// Offending scope.
		scope: String,
	},
}

/// Identity provider settings used by [`OidcUpdater`](crate::provider::OidcUpdater).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdpConfig {
	/// Provider identifier.
	pub id: ProviderId,
	/// Token endpoint used for every renewal.
	pub token_endpoint: Url,
	/// OAuth client identifier.
	pub client_id: String,
	/// OAuth client secret, when the client is confidential.
	#[serde(default)]
	pub client_secret: Option<TokenSecret>,
	/// How the client authenticates to the token endpoint.
	#[serde(default)]
	pub client_auth_method: ClientAuthMethod,
	/// Scopes requested on every grant; empty keeps the provider's defaults.
	#[serde(default)]
	pub scopes: Vec<String>,
	/// Grant used when a credential is due.
	#[serde(default)]
	pub renewal_grant: RenewalGrant,
}
impl IdpConfig {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ProviderId) -> IdpConfigBuilder {
		IdpConfigBuilder::new(id)
	}

	/// Checks every invariant; deserialized configs should be validated before use.
	pub fn validate(&self) -> Result<(), IdpConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(IdpConfigError::MissingClientId);
		}
		if self.client_secret.is_none() && self.client_auth_method != ClientAuthMethod::None {
			return Err(IdpConfigError::MissingClientSecret { method: self.client_auth_method });
		}

		validate_endpoint(&self.token_endpoint)?;

		if let Some(scope) =
			self.scopes.iter().find(|scope| scope.is_empty() || scope.contains(char::is_whitespace))
		{
			return Err(IdpConfigError::InvalidScope { scope: scope.clone() });
		}

		Ok(())
	}
}

/// Builder for [`IdpConfig`] values.
#[derive(Debug)]
pub struct IdpConfigBuilder {
	id: ProviderId,
	token_endpoint: Option<Url>,
	client_id: Option<String>,
	client_secret: Option<TokenSecret>,
	client_auth_method: ClientAuthMethod,
	scopes: Vec<String>,
	renewal_grant: RenewalGrant,
}
impl IdpConfigBuilder {
	/// Creates a new builder seeded with the provided identifier.
	pub fn new(id: ProviderId) -> Self {
		Self {
			id,
			token_endpoint: None,
			client_id: None,
			client_secret: None,
			client_auth_method: ClientAuthMethod::default(),
			scopes: Vec::new(),
			renewal_grant: RenewalGrant::default(),
		}
	}

	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the client identifier.
	pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the client secret.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(TokenSecret::new(secret));

		self
	}

	/// Overrides the client authentication method.
	pub fn client_auth_method(mut self, method: ClientAuthMethod) -> Self {
		self.client_auth_method = method;

		self
	}

	/// Adds requested scopes.
	pub fn scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes.extend(scopes.into_iter().map(Into::into));

		self
	}

	/// Overrides the renewal grant.
	pub fn renewal_grant(mut self, grant: RenewalGrant) -> Self {
		self.renewal_grant = grant;

		self
	}

	/// Consumes the builder and validates the resulting config.
	pub fn build(self) -> Result<IdpConfig, IdpConfigError> {
		let config = IdpConfig {
			id: self.id,
			token_endpoint: self.token_endpoint.ok_or(IdpConfigError::MissingTokenEndpoint)?,
			client_id: self.client_id.ok_or(IdpConfigError::MissingClientId)?,
			client_secret: self.client_secret,
			client_auth_method: self.client_auth_method,
			scopes: self.scopes,
			renewal_grant: self.renewal_grant,
		};

		config.validate()?;

		Ok(config)
	}
}

fn validate_endpoint(url: &Url) -> Result<(), IdpConfigError> {
	let loopback = match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
		Some(Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
		None => false,
	};

	match url.scheme() {
		"https" => Ok(()),
		"http" if loopback => Ok(()),
		_ => Err(IdpConfigError::InsecureEndpoint { url: url.to_string() }),
	}
}
