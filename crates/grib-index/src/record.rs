//! Parsed inventory records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Byte length of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteLength {
    /// Derived from the next record's offset.
    Known(u64),
    /// Last message of the file; runs to the end of the GRIB file.
    OpenEnded,
}

/// One line of a GRIB2 inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub message_ordinal: u32,
    pub byte_offset: u64,
    pub byte_length: ByteLength,
    /// Model reference time (`d=YYYYMMDDHH`)
    pub reference_time: DateTime<Utc>,
    /// Variable short name (e.g. "PRMSL")
    pub variable_tag: String,
    /// Level description (e.g. "mean sea level")
    pub level_tag: String,
    /// Forecast description (e.g. "24 hour fcst")
    pub forecast_tag: Option<String>,
    /// Any trailing fields (ensemble info and the like)
    pub extra: Vec<String>,
}

impl IndexRecord {
    pub fn is_open_ended(&self) -> bool {
        matches!(self.byte_length, ByteLength::OpenEnded)
    }

    /// Byte length of the message, using `file_size` for the open-ended last
    /// record.
    pub fn resolve_length(&self, file_size: u64) -> Result<u64, IndexError> {
        match self.byte_length {
            ByteLength::Known(len) => Ok(len),
            ByteLength::OpenEnded if file_size > self.byte_offset => {
                Ok(file_size - self.byte_offset)
            }
            ByteLength::OpenEnded => Err(IndexError::LengthUnresolved {
                ordinal: self.message_ordinal,
                offset: self.byte_offset,
                file_size,
            }),
        }
    }

    /// Forecast lead time in hours, if the forecast tag is recognised.
    ///
    /// `anl` is hour 0, `N hour fcst` is N, ranges such as
    /// `0-6 hour acc fcst` resolve to their end hour, `N day fcst` is 24*N.
    pub fn forecast_hours(&self) -> Option<u32> {
        let tag = self.forecast_tag.as_deref()?.trim();
        if tag == "anl" {
            return Some(0);
        }

        let mut words = tag.split_whitespace();
        let amount = words.next()?;
        let unit = words.next()?;
        let value: u32 = amount.rsplit('-').next()?.parse().ok()?;

        match unit {
            "hour" => Some(value),
            "day" => value.checked_mul(24),
            _ => None,
        }
    }

    /// Render the record back into inventory line form.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{}:{}:d={}:{}:{}",
            self.message_ordinal,
            self.byte_offset,
            self.reference_time.format("%Y%m%d%H"),
            self.variable_tag,
            self.level_tag
        );
        if let Some(fcst) = &self.forecast_tag {
            line.push(':');
            line.push_str(fcst);
        }
        for field in &self.extra {
            line.push(':');
            line.push_str(field);
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(forecast: Option<&str>, length: ByteLength) -> IndexRecord {
        IndexRecord {
            message_ordinal: 8,
            byte_offset: 1000,
            byte_length: length,
            reference_time: Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
            variable_tag: "PRMSL".to_string(),
            level_tag: "mean sea level".to_string(),
            forecast_tag: forecast.map(str::to_string),
            extra: vec!["ENS=low-res ctl".to_string()],
        }
    }

    #[test]
    fn test_forecast_hours() {
        let cases = [
            (Some("anl"), Some(0)),
            (Some("24 hour fcst"), Some(24)),
            (Some("18-24 hour acc fcst"), Some(24)),
            (Some("2 day fcst"), Some(48)),
            (Some("30 min fcst"), None),
            (Some("200000000 day fcst"), None),
            (None, None),
        ];
        for (tag, expected) in cases {
            assert_eq!(record(tag, ByteLength::Known(1)).forecast_hours(), expected, "{:?}", tag);
        }
    }

    #[test]
    fn test_resolve_length() {
        assert_eq!(
            record(None, ByteLength::Known(250)).resolve_length(0).unwrap(),
            250
        );
        assert_eq!(
            record(None, ByteLength::OpenEnded).resolve_length(1600).unwrap(),
            600
        );
        assert!(matches!(
            record(None, ByteLength::OpenEnded).resolve_length(1000),
            Err(IndexError::LengthUnresolved { .. })
        ));
    }

    #[test]
    fn test_to_line() {
        let r = record(Some("24 hour fcst"), ByteLength::OpenEnded);
        assert_eq!(
            r.to_line(),
            "8:1000:d=2000010100:PRMSL:mean sea level:24 hour fcst:ENS=low-res ctl"
        );
    }
}
