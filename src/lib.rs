//! Proactive OIDC credential renewal: per-credential singleflight refresh, a process-wide
//! expiry scheduler, and a pluggable token-endpoint client.
//!
//! A [`credential::RefreshableCredential`] holds token material plus the claims it was issued
//! with and knows when it should be renewed. The [`scheduler::RefreshScheduler`] keeps every
//! registered credential in an expiry-ordered wait set and renews each one shortly before it
//! expires from a single background task, while request paths can still force a
//! just-in-time refresh through the same per-credential guard.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod credential;
pub mod error;
pub mod http;
#[cfg(feature = "reqwest")] pub mod oauth;
pub mod obs;
#[cfg(feature = "reqwest")] pub mod provider;
pub mod scheduler;

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _, tracing_subscriber as _};
