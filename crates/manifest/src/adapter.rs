//! Per-file references derived from the template.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use grib_index::{IndexRecord, MessageSelector};
use reference_common::SlotError;

use crate::template::ReferenceTemplate;
use crate::zarr::{ChunkKey, ZArray};

/// Byte range of one chunk inside a remote file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceEntry {
    pub chunk_key: ChunkKey,
    pub url: String,
    pub offset: u64,
    pub length: u64,
}

/// The template re-pointed at one GRIB file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileReference {
    pub entry: ReferenceEntry,
    pub zarray: ZArray,
    pub attrs: Map<String, Value>,
    pub message_ordinal: u32,
    pub reference_time: DateTime<Utc>,
    pub forecast_hours: Option<u32>,
}

/// Copies the template's data array for each file, patching only the byte
/// range of its single chunk.
#[derive(Debug, Clone)]
pub struct TemplateAdapter {
    template: Arc<ReferenceTemplate>,
    selector: MessageSelector,
    expected_ordinal: Option<u32>,
}

impl TemplateAdapter {
    pub fn new(template: Arc<ReferenceTemplate>, selector: MessageSelector) -> Self {
        Self {
            template,
            selector,
            expected_ordinal: None,
        }
    }

    /// Warn when the selected message is not at this ordinal.
    pub fn with_expected_ordinal(mut self, ordinal: u32) -> Self {
        self.expected_ordinal = Some(ordinal);
        self
    }

    pub fn template(&self) -> &ReferenceTemplate {
        &self.template
    }

    pub fn adapt(
        &self,
        records: &[IndexRecord],
        target_url: &str,
        file_size: u64,
    ) -> Result<FileReference, SlotError> {
        let record = self.selector.select(records)?;
        let length = record.resolve_length(file_size)?;

        if let Some(expected) = self.expected_ordinal {
            if record.message_ordinal != expected {
                warn!(
                    url = %target_url,
                    ordinal = record.message_ordinal,
                    expected = expected,
                    "Selected message is not at the expected position"
                );
            }
        }

        let data = self.template.data_array();
        let entry = ReferenceEntry {
            chunk_key: self.template.data_chunk_key().clone(),
            url: target_url.to_string(),
            offset: record.byte_offset,
            length,
        };

        debug!(
            url = %target_url,
            offset = entry.offset,
            length = entry.length,
            "Adapted template"
        );

        Ok(FileReference {
            entry,
            zarray: data.zarray.clone(),
            attrs: data.attrs.clone(),
            message_ordinal: record.message_ordinal,
            reference_time: record.reference_time,
            forecast_hours: record.forecast_hours(),
        })
    }
}
