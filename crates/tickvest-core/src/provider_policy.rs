use std::time::Duration;

use crate::ProviderId;

/// Free-tier request quota for a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderPolicy {
    pub provider_id: ProviderId,
    pub quota_window: Duration,
    pub quota_limit: u32,
}

impl ProviderPolicy {
    fn alphavantage_default() -> Self {
        Self {
            provider_id: ProviderId::Alphavantage,
            quota_window: Duration::from_secs(60),
            quota_limit: 5,
        }
    }

    fn twelvedata_default() -> Self {
        Self {
            provider_id: ProviderId::Twelvedata,
            quota_window: Duration::from_secs(60),
            quota_limit: 8,
        }
    }

    fn finnhub_default() -> Self {
        Self {
            provider_id: ProviderId::Finnhub,
            quota_window: Duration::from_secs(60),
            quota_limit: 60,
        }
    }

    /// Quota every adapter starts with; Yahoo publishes none for the chart endpoint.
    pub fn default_for(provider_id: ProviderId) -> Option<Self> {
        match provider_id {
            ProviderId::Alphavantage => Some(Self::alphavantage_default()),
            ProviderId::Twelvedata => Some(Self::twelvedata_default()),
            ProviderId::Finnhub => Some(Self::finnhub_default()),
            ProviderId::Yahoo => None,
        }
    }
}
