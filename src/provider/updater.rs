//! [`CredentialUpdater`] backed by an OIDC token endpoint.

// self
use crate::{
	_prelude::*,
	auth::{CredentialId, TokenMaterial, peek_jwt_expiry},
	credential::{
		CredentialState, CredentialUpdate, CredentialUpdater, RefreshableCredential,
		RefreshableCredentialBuilder, UpdateFuture,
	},
	error::ConfigError,
	http::{ReqwestHttpClient, TokenHttpClient},
	oauth::{ReqwestTransportErrorMapper, TokenEndpoint, TransportErrorMapper},
	obs::obs_event,
	provider::{ClaimsVerifier, IdpConfig, RenewalGrant, UnverifiedClaims},
};

/// Renews credentials against one identity provider.
///
/// With [`RenewalGrant::RefreshToken`] the current refresh token is exchanged; a provider
/// that omits a new one leaves the previous refresh token in place. A refresh token that is
/// itself a JWT past its `exp` fails with [`Error::RefreshTokenExpired`] before any network
/// call. With [`RenewalGrant::ClientCredentials`] every renewal is a fresh
/// [`issue`](Self::issue).
pub struct OidcUpdater<C = ReqwestHttpClient, M = ReqwestTransportErrorMapper>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	config: Arc<IdpConfig>,
	endpoint: TokenEndpoint<C, M>,
	verifier: Arc<dyn ClaimsVerifier>,
}
impl OidcUpdater {
	/// Creates an updater that talks to the provider through `http_client`.
	pub fn new(config: IdpConfig, http_client: ReqwestHttpClient) -> Result<Self> {
		Self::with_transport(config, http_client, ReqwestTransportErrorMapper)
	}
}
impl<C, M> OidcUpdater<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates an updater over a custom transport and error mapper.
	pub fn with_transport(
		config: IdpConfig,
		http_client: impl Into<Arc<C>>,
		error_mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		config.validate().map_err(ConfigError::from)?;

		let endpoint = TokenEndpoint::from_config(&config, http_client, error_mapper)?;

		Ok(Self { config: Arc::new(config), endpoint, verifier: Arc::new(UnverifiedClaims) })
	}

	/// Replaces the claims verifier.
	pub fn with_verifier(mut self, verifier: impl 'static + ClaimsVerifier) -> Self {
		self.verifier = Arc::new(verifier);

		self
	}

	/// Provider settings.
	pub fn config(&self) -> &IdpConfig {
		&self.config
	}

	/// Obtains a new credential through the `client_credentials` grant.
	pub async fn issue(&self) -> Result<CredentialUpdate> {
		let tokens = self.endpoint.client_credentials(&self.config.scopes).await?;
		let claims = self.verifier.verify(&tokens)?;

		Ok(CredentialUpdate::new(tokens.material, claims))
	}

	/// Exchanges `current`'s refresh token for new material.
	pub async fn refresh(&self, current: &TokenMaterial) -> Result<CredentialUpdate> {
		let refresh_token =
			current.refresh_token.as_ref().ok_or(ConfigError::MissingRefreshToken)?.expose();

		if peek_jwt_expiry(refresh_token).is_some_and(|exp| exp <= OffsetDateTime::now_utc()) {
			obs_event!(info, provider = self.config.id.as_str(), "Refresh token expired; skipping token endpoint.");

			return Err(Error::RefreshTokenExpired);
		}

		let tokens = self.endpoint.refresh(refresh_token, &self.config.scopes).await?;
		let claims = self.verifier.verify(&tokens)?;

		Ok(CredentialUpdate::new(tokens.material.retain_refresh_token(current), claims))
	}

	/// Starts a credential builder that renews through this updater.
	pub fn credential(
		self: &Arc<Self>,
		id: CredentialId,
		initial: CredentialUpdate,
	) -> RefreshableCredentialBuilder {
		RefreshableCredential::builder(id, self.clone(), initial)
	}
}
impl<C, M> CredentialUpdater for OidcUpdater<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn update(&self, current: Arc<CredentialState>) -> UpdateFuture<'_> {
		Box::pin(async move {
			match self.config.renewal_grant {
				RenewalGrant::RefreshToken => self.refresh(&current.material).await,
				RenewalGrant::ClientCredentials => self.issue().await,
			}
		})
	}
}
impl<C, M> Debug for OidcUpdater<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OidcUpdater")
			.field("provider", &self.config.id)
			.field("renewal_grant", &self.config.renewal_grant)
			.finish()
	}
}
