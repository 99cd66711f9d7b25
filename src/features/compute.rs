//! Default feature computation
//!
//! Derives lagged load values and calendar features from a timestamp-indexed
//! table. External signals already present in the input (APX price, weather)
//! are passed through untouched.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use strum::{EnumIter, IntoEnumIterator, IntoStaticStr};
use tracing::debug;

use super::FeatureComputer;
use crate::error::Result;
use crate::table::DataTable;

/// Minute lags produced by default (`T-{m}min`)
pub const MINUTE_LAGS: [i64; 11] = [15, 30, 45, 60, 120, 180, 240, 360, 480, 720, 1440];

/// Day lags produced by default (`T-{d}d`)
pub const DAY_LAGS: std::ops::RangeInclusive<i64> = 1..=14;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Calendar features derived from each row's timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum CalendarFeature {
    /// Fractional hour of day (0.0 - 23.75)
    Hour,
    /// Day of week (0=Monday, 6=Sunday)
    Weekday,
    Month,
    /// 0=winter, 1=spring, 2=summer, 3=autumn
    Season,
    IsWeekend,
    IsHoliday,
    /// Daylight hours at the configured latitude
    DayLength,
}

impl CalendarFeature {
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// Name of the lag feature for `minutes`, preferring whole days for day lags
pub fn lag_name(minutes: i64) -> String {
    if minutes >= MINUTES_PER_DAY && minutes % MINUTES_PER_DAY == 0 {
        format!("T-{}d", minutes / MINUTES_PER_DAY)
    } else {
        format!("T-{}min", minutes)
    }
}

/// Parse `T-{n}min` / `T-{n}d` into a lag in minutes. Lags that do not fit
/// in an `i64` of minutes are not lags.
pub fn parse_lag(name: &str) -> Option<i64> {
    let rest = name.strip_prefix("T-")?;
    let minutes = if let Some(n) = rest.strip_suffix("min") {
        n.parse::<i64>().ok()?
    } else if let Some(n) = rest.strip_suffix('d') {
        n.parse::<i64>().ok()?.checked_mul(MINUTES_PER_DAY)?
    } else {
        return None;
    };
    (minutes > 0).then_some(minutes)
}

/// Feature computer used when the caller does not supply one
#[derive(Debug, Clone)]
pub struct DefaultFeatureComputer {
    load_column: String,
    latitude: f64,
}

impl Default for DefaultFeatureComputer {
    fn default() -> Self {
        // Arnhem, NL
        Self::new("load", 51.98)
    }
}

impl DefaultFeatureComputer {
    /// `latitude` drives the day-length feature
    pub fn new(load_column: impl Into<String>, latitude: f64) -> Self {
        Self {
            load_column: load_column.into(),
            latitude,
        }
    }

    /// Lags to produce for `horizon`, as (column name, minutes).
    ///
    /// A lag shorter than the horizon is not known at forecast time and is
    /// never produced.
    fn lags(&self, feature_names: Option<&[String]>, horizon: f64) -> Vec<(String, i64)> {
        let candidates: Vec<(String, i64)> = match feature_names {
            Some(names) => names
                .iter()
                .filter_map(|name| parse_lag(name).map(|m| (name.clone(), m)))
                .collect(),
            None => MINUTE_LAGS
                .iter()
                .copied()
                .chain(DAY_LAGS.map(|d| d * MINUTES_PER_DAY))
                .map(|m| (lag_name(m), m))
                .collect(),
        };

        let horizon_minutes = horizon * 60.0;
        candidates
            .into_iter()
            .filter(|(_, minutes)| *minutes as f64 >= horizon_minutes)
            .collect()
    }

    fn add_lag_features(&self, out: &mut DataTable, lags: &[(String, i64)]) -> Result<()> {
        let Some(load) = out.column(&self.load_column).map(<[Option<f64>]>::to_vec) else {
            if !lags.is_empty() {
                debug!(column = %self.load_column, "Load column absent, skipping lag features");
            }
            return Ok(());
        };

        let mut positions: HashMap<DateTime<Utc>, usize> = HashMap::with_capacity(out.len());
        for (i, t) in out.index().iter().enumerate() {
            positions.entry(*t).or_insert(i);
        }

        for (name, minutes) in lags {
            if out.has_column(name) {
                continue;
            }
            // A lag reaching outside the representable time range is missing
            let offset = Duration::try_minutes(*minutes);
            let values = out
                .index()
                .iter()
                .map(|t| {
                    offset
                        .and_then(|offset| t.checked_sub_signed(offset))
                        .and_then(|lagged| positions.get(&lagged))
                        .and_then(|&i| load[i])
                })
                .collect();
            out.insert_column(name.clone(), values)?;
        }
        Ok(())
    }

    fn add_calendar_features(&self, out: &mut DataTable, feature_names: Option<&[String]>) -> Result<()> {
        for feature in CalendarFeature::iter() {
            let name = feature.name();
            let wanted = feature_names.map_or(true, |names| names.iter().any(|n| n == name));
            if !wanted || out.has_column(name) {
                continue;
            }
            let values = out
                .index()
                .iter()
                .map(|t| Some(self.calendar_value(feature, t)))
                .collect();
            out.insert_column(name, values)?;
        }
        Ok(())
    }

    fn calendar_value(&self, feature: CalendarFeature, timestamp: &DateTime<Utc>) -> f64 {
        let weekday = timestamp.weekday().num_days_from_monday();
        match feature {
            CalendarFeature::Hour => timestamp.hour() as f64 + timestamp.minute() as f64 / 60.0,
            CalendarFeature::Weekday => weekday as f64,
            CalendarFeature::Month => timestamp.month() as f64,
            CalendarFeature::Season => season(timestamp.month()) as f64,
            CalendarFeature::IsWeekend => flag(weekday >= 5),
            CalendarFeature::IsHoliday => flag(is_dutch_holiday(timestamp.date_naive())),
            CalendarFeature::DayLength => day_length(timestamp.ordinal0(), self.latitude),
        }
    }
}

impl FeatureComputer for DefaultFeatureComputer {
    fn compute(&self, table: &DataTable, feature_names: Option<&[String]>, horizon: f64) -> Result<DataTable> {
        let mut out = table.clone();
        let lags = self.lags(feature_names, horizon);
        self.add_lag_features(&mut out, &lags)?;
        self.add_calendar_features(&mut out, feature_names)?;

        debug!(
            horizon,
            rows = out.len(),
            added = out.num_columns() - table.num_columns(),
            "Computed features"
        );
        Ok(out)
    }
}

fn flag(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

fn season(month: u32) -> u32 {
    match month {
        12 | 1 | 2 => 0,
        3..=5 => 1,
        6..=8 => 2,
        _ => 3,
    }
}

/// Day length in hours for a day of year (0-based) and latitude
fn day_length(day_of_year: u32, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let axis_tilt = 23.44_f64.to_radians();
    let day_angle = 2.0 * std::f64::consts::PI * (day_of_year as f64 - 81.0) / 365.0;
    let declination = axis_tilt * day_angle.sin();

    // Clamped for polar day / night
    let cos_hour_angle = (-lat_rad.tan() * declination.tan()).clamp(-1.0, 1.0);
    let hour_angle = cos_hour_angle.acos();
    (2.0 * hour_angle.to_degrees() / 15.0).clamp(0.0, 24.0)
}

/// Easter Sunday (anonymous Gregorian algorithm)
fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// Dutch public holidays, including the Easter-relative ones
fn is_dutch_holiday(date: NaiveDate) -> bool {
    let fixed = matches!(
        (date.month(), date.day()),
        (1, 1) | (4, 27) | (5, 5) | (12, 25) | (12, 26)
    );
    if fixed {
        return true;
    }

    let Some(easter) = easter_sunday(date.year()) else {
        return false;
    };
    // Good Friday, Easter, Easter Monday, Ascension, Whit Sunday, Whit Monday
    [-2, 0, 1, 39, 49, 50]
        .iter()
        .any(|offset| easter + Duration::days(*offset) == date)
}
