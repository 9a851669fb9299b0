//! End-to-end construction: fetch, parse, adapt, assemble.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use grib_index::{parse_index, MessageSelector};
use manifest::{
    AssembleOptions, ConsolidatedManifest, FileReference, GapsReport, ManifestAssembler,
    ReferenceTemplate, TemplateAdapter,
};
use reference_common::time::forecast_hour_ordinal;
use reference_common::{CoordinateGrid, RefError, RefResult, SlotError, SlotKey};
use storage::{RemoteArchive, UrlBuilder};

use crate::scheduler::{FetchScheduler, FetchedIndex, SchedulerConfig};

/// Options for a build.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BuildOptions {
    pub scheduler: SchedulerConfig,
    pub assemble: AssembleOptions,
}

#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub manifest: ConsolidatedManifest,
    pub gaps: GapsReport,
}

/// Builds one consolidated manifest for a grid of reforecast files.
pub struct ReferenceBuilder {
    scheduler: FetchScheduler,
    adapter: TemplateAdapter,
    assembler: ManifestAssembler,
}

impl ReferenceBuilder {
    pub fn new(
        archive: RemoteArchive,
        layout: Arc<dyn UrlBuilder>,
        template: Arc<ReferenceTemplate>,
        selector: MessageSelector,
        options: BuildOptions,
    ) -> RefResult<Self> {
        if options.scheduler.concurrency == 0 {
            return Err(RefError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        let ordinal = forecast_hour_ordinal(options.assemble.forecast_hour)?;

        Ok(Self {
            scheduler: FetchScheduler::new(archive, layout, options.scheduler),
            adapter: TemplateAdapter::new(template.clone(), selector)
                .with_expected_ordinal(ordinal),
            assembler: ManifestAssembler::new(template, options.assemble),
        })
    }

    #[instrument(skip_all, fields(times = grid.times().len(), members = grid.members().len()))]
    pub async fn build(
        &self,
        grid: &CoordinateGrid,
        cancel: &CancellationToken,
    ) -> RefResult<BuildOutput> {
        if grid.is_empty() && self.assembler.options().require_slots {
            return Err(RefError::EmptyGrid);
        }

        let fetched = self.scheduler.run(grid, cancel).await?;

        let references: HashMap<SlotKey, Result<FileReference, SlotError>> = fetched
            .into_iter()
            .map(|(key, result)| {
                let reference = result.and_then(|index| self.process_slot(&key, &index));
                if let Err(e) = &reference {
                    warn!(slot = %key, kind = e.kind(), error = %e, "Slot will be fill-valued");
                }
                (key, reference)
            })
            .collect();

        let (manifest, gaps) = self.assembler.assemble(grid, &references)?;

        info!(
            references = manifest.reference_count(),
            gaps = gaps.gaps.len(),
            "Build complete"
        );

        Ok(BuildOutput { manifest, gaps })
    }

    fn process_slot(&self, key: &SlotKey, index: &FetchedIndex) -> Result<FileReference, SlotError> {
        let text = std::str::from_utf8(&index.body)
            .map_err(|e| SlotError::malformed(format!("index is not UTF-8: {}", e)))?;
        let records = parse_index(text)?;
        let reference = self.adapter.adapt(&records, &index.grib_url, index.file_size)?;

        if reference.reference_time != key.time {
            return Err(SlotError::malformed(format!(
                "index reference time {} does not match slot {}",
                reference.reference_time.format("%Y%m%d%H"),
                key
            )));
        }

        Ok(reference)
    }
}
