//! Genre-aware revenue forecasting.
//!
//! Headline totals use the clean growth formula. The monthly breakdown applies
//! per-month variance from a [`NoiseSource`], so summing it does not reproduce
//! the headline totals.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::AnalyticsError;
use super::noise::NoiseSource;
use super::period::Period;
use super::tables::AnalyticsTables;

pub const FORECAST_CONFIDENCE: f64 = 0.75;
pub const FORECAST_METHODOLOGY: &str =
    "Trend extrapolation from average monthly revenue with genre-specific growth multipliers";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ForecastHorizon {
    ThreeMonths,
    #[default]
    SixMonths,
    TwelveMonths,
}

impl ForecastHorizon {
    pub fn months(&self) -> u32 {
        match self {
            ForecastHorizon::ThreeMonths => 3,
            ForecastHorizon::SixMonths => 6,
            ForecastHorizon::TwelveMonths => 12,
        }
    }
}

impl TryFrom<u32> for ForecastHorizon {
    type Error = AnalyticsError;

    fn try_from(months: u32) -> Result<Self, Self::Error> {
        match months {
            3 => Ok(ForecastHorizon::ThreeMonths),
            6 => Ok(ForecastHorizon::SixMonths),
            12 => Ok(ForecastHorizon::TwelveMonths),
            other => Err(AnalyticsError::InvalidInput(format!(
                "forecast horizon must be 3, 6 or 12 months, got {}",
                other
            ))),
        }
    }
}

impl From<ForecastHorizon> for u32 {
    fn from(horizon: ForecastHorizon) -> Self {
        horizon.months()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastInput {
    pub total_historical_revenue: f64,
    pub months_observed: u32,
    #[serde(default)]
    pub genre: String,
    /// Last month with data; projections start the month after.
    #[serde(default)]
    pub last_observed: Option<Period>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyProjection {
    pub month: u32,
    pub year: i32,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Forecast {
    pub avg_monthly_revenue: f64,
    pub growth_rate: f64,
    pub next_three_months: f64,
    pub next_six_months: f64,
    pub next_year: f64,
    pub monthly: Vec<MonthlyProjection>,
    pub confidence: f64,
    pub methodology: String,
}

impl Forecast {
    /// The result for inputs without usable history.
    pub fn empty(growth_rate: f64) -> Self {
        Self {
            avg_monthly_revenue: 0.0,
            growth_rate,
            next_three_months: 0.0,
            next_six_months: 0.0,
            next_year: 0.0,
            monthly: Vec::new(),
            confidence: FORECAST_CONFIDENCE,
            methodology: FORECAST_METHODOLOGY.to_string(),
        }
    }
}

pub struct ForecastEngine {
    tables: Arc<AnalyticsTables>,
    noise: Arc<dyn NoiseSource>,
}

impl ForecastEngine {
    pub fn new(tables: Arc<AnalyticsTables>, noise: Arc<dyn NoiseSource>) -> Self {
        Self { tables, noise }
    }

    pub fn forecast(&self, input: &ForecastInput, horizon: ForecastHorizon) -> Forecast {
        let growth_rate = self.tables.growth_rate(&input.genre);

        if input.months_observed == 0
            || !input.total_historical_revenue.is_finite()
            || input.total_historical_revenue < 0.0
        {
            return Forecast::empty(growth_rate);
        }

        let avg = input.total_historical_revenue / input.months_observed as f64;
        let last = input.last_observed.unwrap_or_else(Period::current);

        let monthly = (1..=horizon.months())
            .map(|i| {
                let period = last.plus_months(i as i64);
                let variance = self.noise.sample();
                MonthlyProjection {
                    month: period.month(),
                    year: period.year(),
                    revenue: (avg * growth_rate.powi(i as i32) * variance).round(),
                }
            })
            .collect();

        Forecast {
            avg_monthly_revenue: avg,
            growth_rate,
            next_three_months: (avg * 3.0 * growth_rate).round(),
            next_six_months: (avg * 6.0 * growth_rate.powf(1.5)).round(),
            next_year: (avg * 12.0 * growth_rate.powi(2)).round(),
            monthly,
            confidence: FORECAST_CONFIDENCE,
            methodology: FORECAST_METHODOLOGY.to_string(),
        }
    }
}
