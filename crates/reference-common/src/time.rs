//! Time handling for reforecast initializations and forecast hours.

use std::ops::RangeInclusive;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RefError, RefResult};

/// Years covered by the GEFSv12 reforecast.
pub const REFORECAST_YEARS: RangeInclusive<i32> = 2000..=2019;

/// Forecast hours up to this bound live under the `Days:1-10` prefix.
const FIRST_HORIZON_LAST_HOUR: u32 = 240;

/// Widest accepted half-window, in days.
pub const MAX_WINDOW_DAYS: u32 = 366;

/// How the window around the center date maps onto initialization times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowMode {
    /// The center date's month-day window applied to every reforecast year.
    #[default]
    Climatology,
    /// Only the calendar days either side of the center date.
    Contiguous,
}

/// A window of daily 00z initializations centered on a date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastWindow {
    pub center: NaiveDate,
    /// Days either side of the center date.
    pub days: u32,
    pub mode: WindowMode,
    pub years: RangeInclusive<i32>,
}

impl ForecastWindow {
    pub fn contiguous(center: NaiveDate, days: u32) -> Self {
        Self {
            center,
            days,
            mode: WindowMode::Contiguous,
            years: center.year()..=center.year(),
        }
    }

    pub fn climatology(center: NaiveDate, days: u32, years: RangeInclusive<i32>) -> Self {
        Self {
            center,
            days,
            mode: WindowMode::Climatology,
            years,
        }
    }

    /// Calendar days within the window. Days beyond the representable date
    /// range are dropped.
    fn calendar_days(&self) -> Vec<NaiveDate> {
        let span = self.days as i64;
        (-span..=span)
            .filter_map(|offset| self.center.checked_add_signed(Duration::days(offset)))
            .collect()
    }

    /// Distinct (month, day) pairs covered by the window, in calendar order
    /// starting from the earliest day.
    pub fn month_days(&self) -> Vec<(u32, u32)> {
        let mut out: Vec<(u32, u32)> = Vec::new();
        for date in self.calendar_days() {
            let md = (date.month(), date.day());
            if !out.contains(&md) {
                out.push(md);
            }
        }
        out
    }

    /// Sorted 00z initialization times for the window.
    ///
    /// In climatology mode, month-days that do not exist in a given year
    /// (Feb 29 outside leap years) are skipped.
    pub fn init_times(&self) -> Vec<DateTime<Utc>> {
        let mut dates: Vec<NaiveDate> = match self.mode {
            WindowMode::Contiguous => self.calendar_days(),
            WindowMode::Climatology => {
                let month_days = self.month_days();
                self.years
                    .clone()
                    .flat_map(|year| {
                        month_days
                            .iter()
                            .filter_map(move |&(m, d)| NaiveDate::from_ymd_opt(year, m, d))
                    })
                    .collect()
            }
        };
        dates.sort_unstable();
        dates.dedup();

        dates
            .into_iter()
            .filter_map(|d| d.and_hms_opt(0, 0, 0))
            .map(|ndt| Utc.from_utc_datetime(&ndt))
            .collect()
    }
}

/// Validate a forecast hour and return the 1-based message ordinal it
/// occupies in a 3-hourly reforecast file.
pub fn forecast_hour_ordinal(forecast_hour: u32) -> RefResult<u32> {
    if forecast_hour == 0 {
        return Err(RefError::InvalidConfig(
            "No hour 0 forecast available".to_string(),
        ));
    }
    if forecast_hour % 3 != 0 {
        return Err(RefError::InvalidConfig(format!(
            "Forecast hour must be divisible by 3, got {}",
            forecast_hour
        )));
    }
    Ok(forecast_hour / 3)
}

/// Archive prefix segment holding a given forecast hour.
pub fn forecast_horizon(forecast_hour: u32) -> &'static str {
    if forecast_hour <= FIRST_HORIZON_LAST_HOUR {
        "Days:1-10"
    } else {
        "Days:10-16"
    }
}
