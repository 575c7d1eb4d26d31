use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::{
    error::AppError,
    exchange_rate::{DateRange, HistoryPoint, RateRecord},
    mapper,
    upstream::RateSource,
    xml,
};

/// Translation core shared by the REST and SOAP facades.
#[derive(Clone)]
pub struct RatesService {
    source: Arc<dyn RateSource>,
}

impl RatesService {
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self { source }
    }

    pub async fn list_currencies(&self, on: NaiveDateTime) -> Result<Vec<RateRecord>, AppError> {
        let (names, rates) = tokio::try_join!(
            self.source.list_currencies(),
            self.source.rates_on_date(on)
        )?;

        let names = xml::parse(&names)?;
        let rates = xml::parse(&rates)?;
        let records = mapper::join_currency_table(&names, &rates)?;
        log::info!("Got {} rates for {}", records.len(), on.date());

        Ok(records)
    }

    pub async fn get_history(
        &self,
        code: &str,
        range: DateRange,
    ) -> Result<Vec<HistoryPoint>, AppError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AppError::InvalidInput("code is empty".to_string()));
        }

        let raw = self.source.rate_history(&range, code).await?;
        let rates = xml::parse(&raw)?;
        let mut points = mapper::extract_history(&rates)?;

        let total = points.len();
        points.retain(|point| range.contains(point.date));
        if points.len() != total {
            log::warn!(
                "Dropped {} of {} points for {} outside {}..={}",
                total - points.len(),
                total,
                code,
                range.from(),
                range.to()
            );
        }

        Ok(points)
    }
}
