//! Reference manifest construction for GEFSv12 reforecast archives.
//!
//! [`FetchScheduler`] pulls every slot's `.idx` inventory and GRIB size with
//! bounded concurrency; [`ReferenceBuilder`] parses, adapts and assembles the
//! results into one [`manifest::ConsolidatedManifest`] plus a gaps report.

pub mod pipeline;
pub mod scheduler;

pub use pipeline::{BuildOptions, BuildOutput, ReferenceBuilder};
pub use scheduler::{FetchResults, FetchScheduler, FetchedIndex, SchedulerConfig};
