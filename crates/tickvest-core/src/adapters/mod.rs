//! Upstream quote provider adapters.
//!
//! | Adapter | Endpoint | Key | History |
//! |---------|----------|-----|---------|
//! | [`YahooAdapter`] | `/v8/finance/chart/{symbol}` | none | yes |
//! | [`FinnhubAdapter`] | `/api/v1/quote` | `X-Finnhub-Token` header | no |
//! | [`TwelveDataAdapter`] | `/quote` | `apikey` query | no |
//! | [`AlphaVantageAdapter`] | `GLOBAL_QUOTE` | `apikey` query | no |

mod alphavantage;
mod finnhub;
mod twelvedata;
mod yahoo;

pub use alphavantage::AlphaVantageAdapter;
pub use finnhub::FinnhubAdapter;
pub use twelvedata::TwelveDataAdapter;
pub use yahoo::YahooAdapter;

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::circuit_breaker::CircuitBreaker;
use crate::data_source::SourceError;
use crate::http_client::{HttpClient, HttpRequest, HttpResponse};
use crate::provider_policy::ProviderPolicy;
use crate::throttling::RateBudget;
use crate::ProviderId;

/// Transport guard shared by every adapter: circuit breaker, optional rate
/// budget, status mapping and outcome bookkeeping around one GET.
#[derive(Clone)]
pub(crate) struct Upstream {
    provider: ProviderId,
    http_client: Arc<dyn HttpClient>,
    circuit_breaker: Arc<CircuitBreaker>,
    rate_budget: Option<RateBudget>,
    timeout_ms: u64,
}

impl Upstream {
    pub(crate) fn new(provider: ProviderId, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            provider,
            http_client,
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            rate_budget: ProviderPolicy::default_for(provider)
                .as_ref()
                .map(RateBudget::from_policy),
            timeout_ms: 4_000,
        }
    }

    pub(crate) fn set_circuit_breaker(&mut self, circuit_breaker: Arc<CircuitBreaker>) {
        self.circuit_breaker = circuit_breaker;
    }

    pub(crate) fn set_rate_budget(&mut self, rate_budget: Option<RateBudget>) {
        self.rate_budget = rate_budget;
    }

    pub(crate) fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.timeout_ms = timeout_ms;
    }

    pub(crate) fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Issues `request` and hands a 2xx body to `parse`. The combined outcome
    /// is recorded on the circuit breaker.
    pub(crate) async fn call<T, F>(&self, request: HttpRequest, parse: F) -> Result<T, SourceError>
    where
        F: FnOnce(&str) -> Result<T, SourceError>,
    {
        if !self.circuit_breaker.allow_request() {
            return Err(SourceError::circuit_open(self.provider));
        }

        if let Some(Err(wait)) = self.rate_budget.as_ref().map(RateBudget::try_acquire) {
            return Err(SourceError::rate_limited(format!(
                "{} free-tier limit exceeded; retry in {:.2}s",
                self.provider,
                wait.as_secs_f64()
            )));
        }

        let started = Instant::now();
        let request = request.with_timeout_ms(self.timeout_ms);
        let result = match self.http_client.execute(request).await {
            Ok(response) => {
                debug!(
                    provider = %self.provider,
                    status = response.status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "upstream responded"
                );
                self.check_status(&response).and_then(|()| parse(&response.body))
            }
            Err(error) if error.is_timeout() => Err(SourceError::timeout(format!(
                "{} request timed out: {}",
                self.provider,
                error.message()
            ))),
            Err(error) => Err(SourceError::transport(format!(
                "{} transport error: {}",
                self.provider,
                error.message()
            ))),
        };

        match &result {
            Ok(_) => self.circuit_breaker.record_success(),
            Err(error) if error.trips_circuit() => self.circuit_breaker.record_failure(),
            Err(_) => {}
        }
        result
    }

    fn check_status(&self, response: &HttpResponse) -> Result<(), SourceError> {
        if response.is_success() {
            return Ok(());
        }
        Err(SourceError::http_status(
            response.status,
            format!("{} returned status {}", self.provider, response.status),
        ))
    }
}

pub(crate) fn decode<'de, T>(provider: ProviderId, body: &'de str) -> Result<T, SourceError>
where
    T: serde::Deserialize<'de>,
{
    serde_json::from_str(body)
        .map_err(|e| SourceError::malformed(format!("failed to parse {provider} response: {e}")))
}


#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::testing::ScriptedHttpClient;
    use super::Upstream;
    use crate::ProviderId;

    #[test]
    fn budget_follows_the_provider_free_tier() {
        let client = Arc::new(ScriptedHttpClient::default());

        assert!(Upstream::new(ProviderId::Yahoo, client.clone())
            .rate_budget
            .is_none());
        for provider in [
            ProviderId::Finnhub,
            ProviderId::Twelvedata,
            ProviderId::Alphavantage,
        ] {
            assert!(Upstream::new(provider, client.clone()).rate_budget.is_some());
        }
    }
}
