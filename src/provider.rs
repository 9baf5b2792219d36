//! OIDC identity-provider integration.
//!
//! `config` holds the validated [`IdpConfig`] (token endpoint, client authentication,
//! scopes, and the grant used for renewal). `verifier` turns token-endpoint responses into
//! [`Claims`](crate::auth::Claims) through the pluggable [`ClaimsVerifier`]. `updater` ties
//! both to the token-endpoint facade as [`OidcUpdater`], a ready-made
//! [`CredentialUpdater`](crate::credential::CredentialUpdater).

pub mod config;
pub mod updater;
pub mod verifier;

pub use config::*;
pub use updater::*;
pub use verifier::*;
