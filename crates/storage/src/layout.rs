//! Where reforecast files live in the archive.

use reference_common::time::forecast_horizon;
use reference_common::SlotKey;

/// Maps grid slots to archive object keys and reference URLs.
pub trait UrlBuilder: Send + Sync {
    /// Key of the GRIB file, relative to the archive root.
    fn grib_key(&self, slot: &SlotKey) -> String;

    /// Key of the file's `.idx` inventory.
    fn index_key(&self, slot: &SlotKey) -> String {
        format!("{}.idx", self.grib_key(slot))
    }

    /// URL written into manifest chunk references.
    fn url(&self, slot: &SlotKey) -> String;
}

/// GEFSv12 reforecast layout:
/// `{prefix}/{YYYY}/{YYYYMMDDHH}/{member}/{horizon}/{variable}_{YYYYMMDDHH}_{member}.grib2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReforecastLayout {
    pub bucket: String,
    pub prefix: String,
    pub variable: String,
    pub horizon: String,
}

impl ReforecastLayout {
    pub const DEFAULT_BUCKET: &'static str = "noaa-gefs-retrospective";
    pub const DEFAULT_PREFIX: &'static str = "GEFSv12/reforecast";

    /// Layout for `variable` with the horizon directory holding
    /// `forecast_hour`.
    pub fn new(variable: impl Into<String>, forecast_hour: u32) -> Self {
        Self {
            bucket: Self::DEFAULT_BUCKET.to_string(),
            prefix: Self::DEFAULT_PREFIX.to_string(),
            variable: variable.into(),
            horizon: forecast_horizon(forecast_hour).to_string(),
        }
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_horizon(mut self, horizon: impl Into<String>) -> Self {
        self.horizon = horizon.into();
        self
    }
}

impl UrlBuilder for ReforecastLayout {
    fn grib_key(&self, slot: &SlotKey) -> String {
        let init = slot.time.format("%Y%m%d%H");
        let key = format!(
            "{}/{}/{}/{}/{}_{}_{}.grib2",
            slot.time.format("%Y"),
            init,
            slot.member,
            self.horizon,
            self.variable,
            init,
            slot.member
        );
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            key
        } else {
            format!("{}/{}", prefix, key)
        }
    }

    fn url(&self, slot: &SlotKey) -> String {
        format!("s3://{}/{}", self.bucket, self.grib_key(slot))
    }
}
