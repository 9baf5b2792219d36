// self
use crate::{credential::RefreshMode, obs::RefreshOutcome};

/// Records a renewal outcome via the global metrics recorder (when enabled).
pub fn record_refresh_outcome(mode: RefreshMode, outcome: RefreshOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"token_refresher_refresh_total",
			"trigger" => mode.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (mode, outcome);
	}
}
