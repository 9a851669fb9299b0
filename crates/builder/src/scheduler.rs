//! Bounded concurrent fetching of per-slot index files.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use reference_common::{CoordinateGrid, RefError, RefResult, SlotError, SlotKey};
use storage::{RemoteArchive, UrlBuilder};

/// Raw inputs for one slot: the inventory text and the GRIB file's size.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedIndex {
    pub body: Bytes,
    pub file_size: u64,
    /// URL the manifest will reference for this slot.
    pub grib_url: String,
}

pub type FetchResults = HashMap<SlotKey, Result<FetchedIndex, SlotError>>;

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Slots fetched at once
    pub concurrency: usize,
    /// Limit for one slot's index and size requests together
    pub request_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 16,
            request_timeout: Duration::from_secs(30),
        }
    }
}

pub struct FetchScheduler {
    archive: RemoteArchive,
    layout: Arc<dyn UrlBuilder>,
    config: SchedulerConfig,
}

impl FetchScheduler {
    pub fn new(archive: RemoteArchive, layout: Arc<dyn UrlBuilder>, config: SchedulerConfig) -> Self {
        Self {
            archive,
            layout,
            config,
        }
    }

    /// Fetch every slot of the grid, at most `concurrency` at a time.
    ///
    /// Every slot gets exactly one entry; failures are entries, not errors.
    /// Cancellation drops all in-flight requests and returns
    /// [`RefError::Cancelled`].
    pub async fn run(
        &self,
        grid: &CoordinateGrid,
        cancel: &CancellationToken,
    ) -> RefResult<FetchResults> {
        if cancel.is_cancelled() {
            return Err(RefError::Cancelled);
        }

        let slots: Vec<SlotKey> = grid.slots().map(|(_, key)| key).collect();
        let total = slots.len();
        info!(
            slots = total,
            concurrency = self.config.concurrency,
            archive = %self.archive.name(),
            "Fetching index files"
        );

        let fetches = stream::iter(slots)
            .map(|key| async move {
                let result = self.fetch_slot(&key).await;
                (key, result)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect::<Vec<_>>();

        let results: FetchResults = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(slots = total, "Fetch cancelled");
                return Err(RefError::Cancelled);
            }
            results = fetches => results.into_iter().collect(),
        };

        let failed = results.values().filter(|r| r.is_err()).count();
        info!(
            success = total - failed,
            failed = failed,
            "Fetch phase complete"
        );

        Ok(results)
    }

    async fn fetch_slot(&self, key: &SlotKey) -> Result<FetchedIndex, SlotError> {
        let index_key = self.layout.index_key(key);
        let grib_key = self.layout.grib_key(key);
        let grib_url = self.layout.url(key);
        let index_url = format!("{}.idx", grib_url);

        let requests = async {
            tokio::try_join!(self.archive.get(&index_key), self.archive.size(&grib_key))
        };

        match tokio::time::timeout(self.config.request_timeout, requests).await {
            Ok(Ok((body, file_size))) => {
                debug!(slot = %key, bytes = body.len(), file_size = file_size, "Fetched index");
                Ok(FetchedIndex {
                    body,
                    file_size,
                    grib_url,
                })
            }
            Ok(Err(e)) => {
                warn!(slot = %key, error = %e, "Index fetch failed");
                Err(SlotError::transport(index_url, e))
            }
            Err(_) => {
                warn!(slot = %key, timeout = ?self.config.request_timeout, "Index fetch timed out");
                Err(SlotError::transport(
                    index_url,
                    format!("timed out after {:?}", self.config.request_timeout),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use object_store::memory::InMemory;
    use object_store::throttle::{ThrottleConfig, ThrottledStore};
    use reference_common::Member;
    use storage::ReforecastLayout;

    fn grid() -> CoordinateGrid {
        let times = vec![
            Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2000, 1, 2, 0, 0, 0).unwrap(),
        ];
        CoordinateGrid::new(times, vec![Member::from("c00")]).unwrap()
    }

    async fn seeded() -> (RemoteArchive, Arc<dyn UrlBuilder>) {
        seed(RemoteArchive::in_memory()).await
    }

    /// An archive whose object reads stall for `wait` before answering.
    async fn stalled(wait: Duration) -> (RemoteArchive, Arc<dyn UrlBuilder>) {
        let store = ThrottledStore::new(
            InMemory::new(),
            ThrottleConfig {
                wait_get_per_call: wait,
                ..Default::default()
            },
        );
        seed(RemoteArchive::from_store(Arc::new(store), "stalled")).await
    }

    async fn seed(archive: RemoteArchive) -> (RemoteArchive, Arc<dyn UrlBuilder>) {
        let layout = ReforecastLayout::new("pres_msl", 24);
        let key = SlotKey::new(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(), "c00");
        archive
            .put(&layout.index_key(&key), Bytes::from_static(b"1:0:d=2000010100:PRMSL:mean sea level:24 hour fcst\n"))
            .await
            .unwrap();
        archive
            .put(&layout.grib_key(&key), Bytes::from(vec![0u8; 64]))
            .await
            .unwrap();
        (archive, Arc::new(layout))
    }

    #[tokio::test]
    async fn test_every_slot_reported_once() {
        let (archive, layout) = seeded().await;
        let scheduler = FetchScheduler::new(archive, layout, SchedulerConfig::default());
        let results = scheduler.run(&grid(), &CancellationToken::new()).await.unwrap();

        assert_eq!(results.len(), 2);
        let ok: Vec<&FetchedIndex> = results.values().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(ok.len(), 1);
        assert_eq!(ok[0].file_size, 64);
        assert!(ok[0].grib_url.starts_with("s3://noaa-gefs-retrospective/GEFSv12/"));

        let err = results.values().find_map(|r| r.as_ref().err()).unwrap();
        assert_eq!(err.kind(), "transport");
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let (archive, layout) = seeded().await;
        let scheduler = FetchScheduler::new(archive, layout, SchedulerConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = scheduler.run(&grid(), &cancel).await.unwrap_err();
        assert!(matches!(err, RefError::Cancelled));
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out_as_transport_gap() {
        let (archive, layout) = stalled(Duration::from_secs(60)).await;
        let config = SchedulerConfig {
            concurrency: 2,
            request_timeout: Duration::from_millis(50),
        };
        let scheduler = FetchScheduler::new(archive, layout, config);
        let results = scheduler.run(&grid(), &CancellationToken::new()).await.unwrap();

        assert_eq!(results.len(), 2);
        for result in results.values() {
            match result {
                Err(SlotError::Transport { url, message }) => {
                    assert!(url.ends_with(".grib2.idx"), "{}", url);
                    assert!(message.contains("timed out"), "{}", message);
                }
                other => panic!("expected a timeout, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_cancelled_while_fetching() {
        let (archive, layout) = stalled(Duration::from_secs(60)).await;
        let scheduler = FetchScheduler::new(archive, layout, SchedulerConfig::default());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = tokio::time::timeout(Duration::from_secs(5), scheduler.run(&grid(), &cancel))
            .await
            .expect("cancellation should end the run")
            .unwrap_err();
        assert!(matches!(err, RefError::Cancelled));
    }

    #[tokio::test]
    async fn test_empty_grid_fetches_nothing() {
        let (archive, layout) = seeded().await;
        let scheduler = FetchScheduler::new(archive, layout, SchedulerConfig::default());
        let results = scheduler
            .run(&CoordinateGrid::empty(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
