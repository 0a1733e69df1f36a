use std::sync::Arc;

use time::Date;
use tickvest_core::{
    AllSourcesUnavailable, DashboardConfig, Quote, QuotePoller, QuoteRouter, UtcDateTime,
};

/// Shared by every handler.
pub struct AppState {
    pub config: DashboardConfig,
    pub router: Arc<QuoteRouter>,
    pub poller: Arc<QuotePoller>,
}

impl AppState {
    pub fn new(config: DashboardConfig, router: QuoteRouter) -> Self {
        let router = Arc::new(router);
        let poller = Arc::new(QuotePoller::new(
            Arc::clone(&router),
            config.symbol.clone(),
            config.fallback,
            config.cadence,
        ));
        Self {
            config,
            router,
            poller,
        }
    }

    /// Quote for the configured symbol. Uses the poller's copy once it has one.
    pub async fn dashboard_quote(&self) -> Result<Quote, AllSourcesUnavailable> {
        if let Some(quote) = self.poller.current() {
            return Ok(quote);
        }
        let routed = self
            .router
            .fetch_quote(&self.config.symbol, self.config.fallback)
            .await?;
        Ok(routed.data)
    }

    /// Today's date on the exchange calendar.
    pub fn today(&self) -> Date {
        self.router.calendar().local_date(UtcDateTime::now())
    }
}
