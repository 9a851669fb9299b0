//! Selection of the single message a manifest references.

use std::fmt;

use reference_common::{SlotError, VariableSpec};

use crate::record::IndexRecord;

/// Rule identifying one message in an inventory.
///
/// The variable tag always has to match; level and forecast hour narrow the
/// match when set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSelector {
    pub variable_tag: String,
    pub level_tag: Option<String>,
    pub forecast_hour: Option<u32>,
}

impl MessageSelector {
    pub fn new(variable_tag: impl Into<String>) -> Self {
        Self {
            variable_tag: variable_tag.into(),
            level_tag: None,
            forecast_hour: None,
        }
    }

    pub fn with_level(mut self, level_tag: impl Into<String>) -> Self {
        self.level_tag = Some(level_tag.into());
        self
    }

    pub fn with_forecast_hour(mut self, hour: u32) -> Self {
        self.forecast_hour = Some(hour);
        self
    }

    /// Selector for a catalog variable at a forecast hour.
    pub fn for_variable(spec: &VariableSpec, forecast_hour: u32) -> Self {
        Self::new(spec.grib_tag)
            .with_level(spec.level)
            .with_forecast_hour(forecast_hour)
    }

    pub fn matches(&self, record: &IndexRecord) -> bool {
        record.variable_tag == self.variable_tag
            && self
                .level_tag
                .as_ref()
                .map_or(true, |level| &record.level_tag == level)
            && self
                .forecast_hour
                .map_or(true, |hour| record.forecast_hours() == Some(hour))
    }

    /// The one record matching this selector.
    ///
    /// Zero matches and more than one match are both errors; an ambiguous
    /// inventory is never resolved by picking the first line.
    pub fn select<'a>(&self, records: &'a [IndexRecord]) -> Result<&'a IndexRecord, SlotError> {
        let mut matching = records.iter().filter(|r| self.matches(r));
        match (matching.next(), matching.next()) {
            (Some(record), None) => Ok(record),
            (first, _) => Err(SlotError::VariableNotFound {
                selector: self.to_string(),
                matches: first.map_or(0, |_| 2 + matching.count()),
            }),
        }
    }
}

impl fmt::Display for MessageSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.variable_tag)?;
        if let Some(level) = &self.level_tag {
            write!(f, ":{}", level)?;
        }
        if let Some(hour) = self.forecast_hour {
            write!(f, ":{}h", hour)?;
        }
        Ok(())
    }
}
