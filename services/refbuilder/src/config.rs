//! Run configuration: YAML file plus command-line overrides.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use builder::{BuildOptions, SchedulerConfig};
use manifest::AssembleOptions;
use reference_common::time::{forecast_hour_ordinal, MAX_WINDOW_DAYS};
use reference_common::{
    lookup_variable, CoordinateGrid, ForecastWindow, Member, RefError, RefResult, VariableSpec,
    WindowMode, REFORECAST_YEARS,
};
use storage::{ArchiveConfig, ReforecastLayout};

/// Root configuration loaded from `config/refbuilder.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Archive variable name (e.g. "pres_msl")
    #[serde(default = "default_variable")]
    pub variable: String,
    /// Template reference JSON for one message of the variable
    #[serde(default = "default_template")]
    pub template: PathBuf,
    /// Manifest output path; the gaps report is written next to it
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default = "default_members")]
    pub members: Vec<String>,
    #[serde(default = "default_forecast_hour")]
    pub forecast_hour: u32,
    #[serde(default = "default_fill_value")]
    pub fill_value: f64,
    /// Fail instead of writing an empty manifest
    #[serde(default)]
    pub require_slots: bool,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub archive: ArchiveSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_center")]
    pub center: NaiveDate,
    /// Days either side of the center date
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default)]
    pub mode: WindowMode,
    #[serde(default)]
    pub years: YearRange,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            center: default_center(),
            days: default_days(),
            mode: WindowMode::default(),
            years: YearRange::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl Default for YearRange {
    fn default() -> Self {
        Self {
            start: *REFORECAST_YEARS.start(),
            end: *REFORECAST_YEARS.end(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArchiveSettings {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    /// S3-compatible endpoint override
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Read over plain HTTP(S) from this base URL instead of S3
    #[serde(default)]
    pub http_base: Option<String>,
    /// Horizon directory override (default derived from the forecast hour)
    #[serde(default)]
    pub horizon: Option<String>,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            region: default_region(),
            prefix: default_prefix(),
            endpoint: None,
            http_base: None,
            horizon: None,
        }
    }
}

fn default_variable() -> String {
    "pres_msl".to_string()
}

fn default_template() -> PathBuf {
    PathBuf::from("config/templates/pres_msl.json")
}

fn default_output() -> PathBuf {
    PathBuf::from("output/pres_msl.json")
}

fn default_center() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 15).unwrap_or(NaiveDate::MIN)
}

fn default_days() -> u32 {
    3
}

fn default_members() -> Vec<String> {
    ["c00", "p01", "p02", "p03", "p04"]
        .iter()
        .map(|m| m.to_string())
        .collect()
}

fn default_forecast_hour() -> u32 {
    24
}

fn default_fill_value() -> f64 {
    f64::NAN
}

fn default_concurrency() -> usize {
    16
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_bucket() -> String {
    ReforecastLayout::DEFAULT_BUCKET.to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_prefix() -> String {
    ReforecastLayout::DEFAULT_PREFIX.to_string()
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            variable: default_variable(),
            template: default_template(),
            output: default_output(),
            window: WindowConfig::default(),
            members: default_members(),
            forecast_hour: default_forecast_hour(),
            fill_value: default_fill_value(),
            require_slots: false,
            fetch: FetchConfig::default(),
            archive: ArchiveSettings::default(),
        }
    }
}

/// Command-line values that replace their YAML counterparts when given.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Overrides {
    /// Archive variable name
    #[arg(long)]
    pub variable: Option<String>,

    /// Template reference JSON
    #[arg(long, env = "REFBUILDER_TEMPLATE")]
    pub template: Option<PathBuf>,

    /// Manifest output path
    #[arg(short, long, env = "REFBUILDER_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Center date of the window (YYYY-MM-DD)
    #[arg(long)]
    pub center_date: Option<NaiveDate>,

    /// Days either side of the center date
    #[arg(long)]
    pub days: Option<u32>,

    /// Only the days around the center date, not every reforecast year
    #[arg(long)]
    pub contiguous: bool,

    /// Ensemble members, comma separated
    #[arg(long, value_delimiter = ',')]
    pub members: Option<Vec<String>>,

    /// Forecast hour to reference
    #[arg(long)]
    pub forecast_hour: Option<u32>,

    /// Index fetches in flight
    #[arg(long, env = "REFBUILDER_CONCURRENCY")]
    pub concurrency: Option<usize>,

    /// Per-slot request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Read the archive over HTTP(S) from this base URL
    #[arg(long, env = "REFBUILDER_HTTP_BASE")]
    pub http_base: Option<String>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: RunConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), variable = %config.variable, "Loaded run configuration");
        Ok(config)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(variable) = &overrides.variable {
            self.variable = variable.clone();
        }
        if let Some(template) = &overrides.template {
            self.template = template.clone();
        }
        if let Some(output) = &overrides.output {
            self.output = output.clone();
        }
        if let Some(center) = overrides.center_date {
            self.window.center = center;
        }
        if let Some(days) = overrides.days {
            self.window.days = days;
        }
        if overrides.contiguous {
            self.window.mode = WindowMode::Contiguous;
        }
        if let Some(members) = &overrides.members {
            self.members = members.clone();
        }
        if let Some(hour) = overrides.forecast_hour {
            self.forecast_hour = hour;
        }
        if let Some(concurrency) = overrides.concurrency {
            self.fetch.concurrency = concurrency;
        }
        if let Some(secs) = overrides.timeout_secs {
            self.fetch.request_timeout_secs = secs;
        }
        if let Some(base) = &overrides.http_base {
            self.archive.http_base = Some(base.clone());
        }
    }

    pub fn validate(&self) -> RefResult<()> {
        forecast_hour_ordinal(self.forecast_hour)?;
        self.variable_spec()?;

        if self.members.is_empty() {
            return Err(RefError::InvalidConfig("no ensemble members".to_string()));
        }
        let mut seen = HashSet::new();
        for member in &self.members {
            if member.trim().is_empty() {
                return Err(RefError::InvalidConfig("empty member id".to_string()));
            }
            if !seen.insert(member) {
                return Err(RefError::InvalidConfig(format!(
                    "member {} listed twice",
                    member
                )));
            }
        }

        if self.fetch.concurrency == 0 {
            return Err(RefError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.fetch.request_timeout_secs == 0 {
            return Err(RefError::InvalidConfig(
                "request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.window.days > MAX_WINDOW_DAYS {
            return Err(RefError::InvalidConfig(format!(
                "window of {} days exceeds {}",
                self.window.days, MAX_WINDOW_DAYS
            )));
        }
        if self.window.years.start > self.window.years.end {
            return Err(RefError::InvalidConfig(format!(
                "year range {}..{} is empty",
                self.window.years.start, self.window.years.end
            )));
        }
        Ok(())
    }

    pub fn variable_spec(&self) -> RefResult<VariableSpec> {
        lookup_variable(&self.variable)
            .ok_or_else(|| RefError::InvalidConfig(format!("unknown variable {}", self.variable)))
    }

    pub fn forecast_window(&self) -> ForecastWindow {
        match self.window.mode {
            WindowMode::Contiguous => ForecastWindow::contiguous(self.window.center, self.window.days),
            WindowMode::Climatology => ForecastWindow::climatology(
                self.window.center,
                self.window.days,
                self.window.years.start..=self.window.years.end,
            ),
        }
    }

    pub fn grid(&self) -> RefResult<CoordinateGrid> {
        CoordinateGrid::new(
            self.forecast_window().init_times(),
            self.members.iter().map(|m| Member::new(m.as_str())).collect(),
        )
    }

    pub fn archive_config(&self) -> ArchiveConfig {
        ArchiveConfig {
            bucket: self.archive.bucket.clone(),
            region: self.archive.region.clone(),
            endpoint: self.archive.endpoint.clone(),
        }
    }

    pub fn layout(&self) -> ReforecastLayout {
        let layout = ReforecastLayout::new(self.variable.clone(), self.forecast_hour)
            .with_bucket(self.archive.bucket.clone())
            .with_prefix(self.archive.prefix.clone());
        match &self.archive.horizon {
            Some(horizon) => layout.with_horizon(horizon.clone()),
            None => layout,
        }
    }

    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            scheduler: SchedulerConfig {
                concurrency: self.fetch.concurrency,
                request_timeout: Duration::from_secs(self.fetch.request_timeout_secs),
            },
            assemble: AssembleOptions {
                fill_value: self.fill_value,
                forecast_hour: self.forecast_hour,
                require_slots: self.require_slots,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::UrlBuilder;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
variable: pres_msl
template: config/templates/pres_msl.json
output: /tmp/refs/pres_msl.json
window:
  center: 2000-03-01
  days: 1
  mode: climatology
  years:
    start: 2000
    end: 2003
members: [c00, p01]
forecast_hour: 48
fill_value: .nan
fetch:
  concurrency: 8
  request_timeout_secs: 10
archive:
  bucket: noaa-gefs-retrospective
  region: us-east-1
"#;
        let config: RunConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert!(config.fill_value.is_nan());

        // Mar 1 and Mar 2 in 2000..=2003, Feb 29 only in 2000
        let grid = config.grid().unwrap();
        assert_eq!(grid.times().len(), 9);
        assert_eq!(grid.members().len(), 2);
        assert_eq!(config.build_options().scheduler.concurrency, 8);
    }

    #[test]
    fn test_defaults() {
        let config: RunConfig = serde_yaml::from_str("{}").unwrap();
        let defaults = RunConfig::default();
        assert_eq!(config.variable, defaults.variable);
        assert_eq!(config.members, defaults.members);
        assert_eq!(config.fetch, defaults.fetch);
        assert_eq!(config.archive, defaults.archive);
        assert!(config.fill_value.is_nan());
        assert_eq!(config.window.mode, WindowMode::Climatology);
        assert_eq!(config.window.years, YearRange { start: 2000, end: 2019 });
        config.validate().unwrap();
    }

    #[test]
    fn test_overrides() {
        let mut config = RunConfig::default();
        config.apply(&Overrides {
            center_date: NaiveDate::from_ymd_opt(2010, 6, 1),
            days: Some(2),
            contiguous: true,
            members: Some(vec!["c00".to_string()]),
            forecast_hour: Some(252),
            ..Default::default()
        });
        config.validate().unwrap();

        let grid = config.grid().unwrap();
        assert_eq!(grid.times().len(), 5);
        assert_eq!(grid.members().len(), 1);
        assert_eq!(config.layout().horizon, "Days:10-16");
    }

    #[test]
    fn test_rejects_bad_forecast_hours() {
        for hour in [0, 4] {
            let config = RunConfig {
                forecast_hour: hour,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(RefError::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_rejects_bad_members() {
        let empty = RunConfig {
            members: Vec::new(),
            ..Default::default()
        };
        assert!(empty.validate().is_err());

        let duplicate = RunConfig {
            members: vec!["c00".to_string(), "c00".to_string()],
            ..Default::default()
        };
        assert!(duplicate.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_concurrency_and_unknown_variable() {
        let mut config = RunConfig::default();
        config.fetch.concurrency = 0;
        assert!(config.validate().is_err());

        let config = RunConfig {
            variable: "apcp_sfc".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_window() {
        let mut config = RunConfig::default();
        config.window.days = MAX_WINDOW_DAYS;
        config.validate().unwrap();

        config.window.days = MAX_WINDOW_DAYS + 1;
        assert!(matches!(config.validate(), Err(RefError::InvalidConfig(_))));

        config.window.days = u32::MAX;
        assert!(matches!(config.validate(), Err(RefError::InvalidConfig(_))));
    }

    #[test]
    fn test_shipped_config() {
        let path = test_utils::require_config_file!("refbuilder.yaml");
        let config = RunConfig::load(&path).unwrap();
        config.validate().unwrap();
        assert_eq!(config.variable_spec().unwrap().array, "msl");
        // 7 month-days in each of 20 years
        assert_eq!(config.grid().unwrap().len(), 7 * 20 * 5);
    }

    #[test]
    fn test_horizon_override() {
        let mut config = RunConfig::default();
        config.archive.horizon = Some("Days:1-10".to_string());
        config.forecast_hour = 300;
        let layout = config.layout();
        let slot = reference_common::SlotKey::new(
            chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2000, 1, 1, 0, 0, 0).unwrap(),
            "c00",
        );
        assert!(layout.grib_key(&slot).contains("/Days:1-10/"));
    }
}
