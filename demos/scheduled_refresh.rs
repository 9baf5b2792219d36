//! Demonstrates proactive renewal: a short-lived session credential is registered with a
//! scheduler, renewed by the background worker through a mocked OIDC token endpoint, and
//! finally renewed on demand from a request path.

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use time::{Duration, OffsetDateTime};
use tracing_subscriber::EnvFilter;
// self
use token_refresher::{
	auth::{Claims, CredentialId, ProviderId, TokenMaterial},
	credential::{CredentialUpdate, RefreshMode, Session},
	http::ReqwestHttpClient,
	provider::{IdpConfig, OidcUpdater},
	scheduler::{RefreshScheduler, SchedulerConfig},
	url::Url,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
		)
		.init();

	let server = MockServer::start_async().await;
	let _token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token").body_includes("grant_type=refresh_token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"bearer\",\"expires_in\":3}",
			);
		})
		.await;
	let config = IdpConfig::builder(ProviderId::new("demo-idp")?)
		.token_endpoint(Url::parse(&server.url("/token"))?)
		.client_id("demo-client")
		.client_secret("super-secret")
		.build()?;
	let http_client = ReqwestHttpClient::new(StdDuration::from_secs(5))?;
	let updater = Arc::new(OidcUpdater::new(config, http_client)?);
	let session = Session::new();
	let credential = updater
		.credential(
			CredentialId::new("demo-session")?,
			CredentialUpdate::new(
				TokenMaterial::new("initial-access").with_refresh_token("demo-refresh"),
				Claims::new(OffsetDateTime::now_utc() + Duration::seconds(2)),
			),
		)
		.session(session.clone())
		.build();
	let scheduler = RefreshScheduler::new(
		SchedulerConfig::default().with_poll_interval(StdDuration::from_millis(250)),
	);

	scheduler.start()?;
	scheduler.register(&credential).await;

	tokio::time::sleep(StdDuration::from_secs(5)).await;

	println!(
		"Worker renewed {} time(s); token now expires at {}.",
		scheduler.metrics().refreshed(),
		credential.expire_at()
	);

	let renewed = scheduler.refresh_now(&credential, RefreshMode::JustInTime).await?;

	println!("On-demand renewal performed: {renewed}.");

	session.invalidate();
	scheduler.stop();

	Ok(())
}
