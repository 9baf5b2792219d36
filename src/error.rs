//! Crate-level error types shared by credentials, the scheduler, and token-endpoint clients.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem or violated invariant (e.g., a token without an expiry).
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Identifier validation failed.
	#[error(transparent)]
	Identifier(#[from] crate::auth::IdentifierError),
	/// Scheduler lifecycle misuse.
	#[error(transparent)]
	Scheduler(#[from] SchedulerError),
	/// Temporary upstream failure; callers may retry.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The renewal credential itself has expired; re-authentication is required.
	#[error("Refresh token has expired; the credential can no longer be renewed.")]
	RefreshTokenExpired,
	/// Provider rejected the grant (e.g., a revoked or unknown refresh token).
	#[error("Provider rejected the grant: {reason}.")]
	InvalidGrant {
		/// Provider- or client-supplied reason string.
		reason: String,
	},
	/// Client authentication failed or credentials are malformed.
	#[error("Client authentication failed: {reason}.")]
	InvalidClient {
		/// Provider- or client-supplied reason string.
		reason: String,
	},
	/// A custom update capability failed.
	#[error("Credential update failed: {reason}.")]
	Update {
		/// Updater-supplied reason string.
		reason: String,
	},
}
impl Error {
	/// Returns `true` when no further automated renewal can succeed.
	///
	/// Owners should invalidate the session or credential and force re-authentication.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			Self::RefreshTokenExpired | Self::InvalidGrant { .. } | Self::InvalidClient { .. }
		)
	}

	/// Returns `true` for failures that may succeed when retried later.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Transient(_) | Self::Transport(_) | Self::Update { .. })
	}

	/// Builds an [`Error::Update`] from any displayable reason.
	pub fn update(reason: impl Display) -> Self {
		Self::Update { reason: reason.to_string() }
	}
}

/// Configuration and invariant failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Identity provider configuration contains an invalid URL.
	#[error("Identity provider configuration contains an invalid URL.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Identity provider configuration failed validation.
	#[cfg(feature = "reqwest")]
	#[error("Identity provider configuration is invalid.")]
	InvalidIdpConfig(#[from] crate::provider::IdpConfigError),
	/// Token claims are missing the `exp` claim.
	#[error("Token claims are missing an expiry.")]
	MissingExpiry,
	/// Token claims could not be decoded.
	#[error("Token claims are malformed: {reason}.")]
	MalformedClaims {
		/// Decoder-supplied reason string.
		reason: String,
	},
	/// Current credential has no refresh token to renew with.
	#[error("Credential is missing a refresh token.")]
	MissingRefreshToken,
	/// Token endpoint returned an excessively large `expires_in`.
	#[error("The expires_in value exceeds the supported range.")]
	ExpiresInOutOfRange,
	/// Token endpoint returned a non-positive duration.
	#[error("The expires_in value must be positive.")]
	NonPositiveExpiresIn,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}

	/// Builds a [`ConfigError::MalformedClaims`] from any displayable reason.
	pub fn malformed_claims(reason: impl Display) -> Self {
		Self::MalformedClaims { reason: reason.to_string() }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Scheduler lifecycle failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum SchedulerError {
	/// `start` was called outside a tokio runtime.
	#[error("The refresh scheduler must be started from within a tokio runtime.")]
	NoRuntime,
	/// `start` was called while the worker is already running.
	#[error("The refresh scheduler worker is already running.")]
	AlreadyStarted,
	/// `start` was called after `stop`.
	#[error("The refresh scheduler has been shut down.")]
	ShutDown,
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Provider returned an unexpected but non-fatal response.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Provider- or client-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token endpoint.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token endpoint.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
