//! `CacheManager` — the single dedicated thread that owns every mutation to
//! the [`SegmentCacheIndex`] and every call into the external
//! [`CacheProvider`].
//!
//! Two concurrency domains meet here: the manager domain (this one
//! worker, running its own single-threaded Tokio runtime) and the client
//! domain (any number of caller threads holding a [`CacheManagerHandle`]
//! and awaiting a response). Commands carry their own reply channel
//! ([`AsyncResult`]); events are fire-and-forget notifications of segment
//! lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::async_result::{AsyncResult, AsyncResultSender};
use crate::bitkey::BitKey;
use crate::cache_provider::CacheProvider;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::index::{LocateRequest, RollupCandidate, SegmentCacheIndex};
use crate::segment::{Segment, SegmentDataset};
use crate::segment_body::SegmentBody;
use crate::segment_column::SegmentColumn;
use crate::segment_header::{Provenance, SegmentHeader};
use crate::value::Value;

/// A request paired with its reply channel.
pub enum ManagerCommand {
    Locate {
        request: LocateRequest,
        respond_to: AsyncResultSender<Vec<SegmentHeader>>,
    },
    IntersectRegion {
        provenance: Provenance,
        region: Vec<SegmentColumn>,
        respond_to: AsyncResultSender<Vec<SegmentHeader>>,
    },
    FindRollupCandidates {
        provenance: Provenance,
        bit_key: BitKey,
        coords: HashMap<String, Value>,
        respond_to: AsyncResultSender<Vec<RollupCandidate>>,
    },
    GetBody {
        header: SegmentHeader,
        respond_to: AsyncResultSender<Option<SegmentBody>>,
    },
    PutBody {
        header: SegmentHeader,
        body: SegmentBody,
        respond_to: AsyncResultSender<bool>,
    },
    Shutdown {
        respond_to: AsyncResultSender<()>,
    },
}

/// A fire-and-forget segment lifecycle notification.
pub enum ManagerEvent {
    /// A SQL worker finished loading a segment. The manager installs it in
    /// the index, caches its body, and asynchronously writes it through
    /// to the provider.
    LoadSucceeded {
        segment: Segment,
        dataset: SegmentDataset,
    },
    /// A load attempt failed; no index mutation happens.
    LoadFailed {
        provenance: Provenance,
        bit_key: BitKey,
        cause: String,
    },
    /// Directly admit a header (and optionally its body) into the index.
    SegmentAdd {
        header: SegmentHeader,
        body: Option<SegmentBody>,
    },
    /// A remote node announced a new segment; its body stays remote until
    /// a caller asks for it.
    ExternalSegmentCreated { header: SegmentHeader },
    /// A remote node announced that a segment was deleted.
    ExternalSegmentDeleted { header: SegmentHeader },
}

enum ManagerMessage {
    Command(ManagerCommand),
    Event(ManagerEvent),
}

/// The client-side, freely cloneable front door to a running
/// [`CacheManager`]. Every method here crosses into the manager thread
/// and back; none of them touch the index or the provider directly.
#[derive(Clone)]
pub struct CacheManagerHandle {
    sender: mpsc::Sender<ManagerMessage>,
    config: CacheConfig,
}

impl CacheManagerHandle {
    async fn send(&self, message: ManagerMessage) -> Result<(), CacheError> {
        self.sender.send(message).await.map_err(|_| {
            CacheError::InvariantViolation("cache manager thread is no longer running".to_string())
        })
    }

    pub async fn locate(&self, request: LocateRequest) -> Result<Vec<SegmentHeader>, CacheError> {
        let (respond_to, result) = AsyncResult::pair();
        self.send(ManagerMessage::Command(ManagerCommand::Locate { request, respond_to }))
            .await?;
        result.resolve(Duration::from_millis(self.config.lookup_timeout_ms)).await
    }

    pub async fn intersect_region(
        &self,
        provenance: Provenance,
        region: Vec<SegmentColumn>,
    ) -> Result<Vec<SegmentHeader>, CacheError> {
        let (respond_to, result) = AsyncResult::pair();
        self.send(ManagerMessage::Command(ManagerCommand::IntersectRegion {
            provenance,
            region,
            respond_to,
        }))
        .await?;
        result.resolve(Duration::from_millis(self.config.scan_timeout_ms)).await
    }

    pub async fn find_rollup_candidates(
        &self,
        provenance: Provenance,
        bit_key: BitKey,
        coords: HashMap<String, Value>,
    ) -> Result<Vec<RollupCandidate>, CacheError> {
        let (respond_to, result) = AsyncResult::pair();
        self.send(ManagerMessage::Command(ManagerCommand::FindRollupCandidates {
            provenance,
            bit_key,
            coords,
            respond_to,
        }))
        .await?;
        result.resolve(Duration::from_millis(self.config.lookup_timeout_ms)).await
    }

    pub async fn get_body(&self, header: SegmentHeader) -> Result<Option<SegmentBody>, CacheError> {
        let (respond_to, result) = AsyncResult::pair();
        self.send(ManagerMessage::Command(ManagerCommand::GetBody { header, respond_to }))
            .await?;
        result.resolve(Duration::from_millis(self.config.read_timeout_ms)).await
    }

    pub async fn put_body(&self, header: SegmentHeader, body: SegmentBody) -> Result<bool, CacheError> {
        let (respond_to, result) = AsyncResult::pair();
        self.send(ManagerMessage::Command(ManagerCommand::PutBody {
            header,
            body,
            respond_to,
        }))
        .await?;
        result.resolve(Duration::from_millis(self.config.write_timeout_ms)).await
    }

    /// Fire-and-forget: enqueue an event and return without waiting for
    /// the manager to process it.
    pub async fn notify(&self, event: ManagerEvent) -> Result<(), CacheError> {
        self.send(ManagerMessage::Event(event)).await
    }

    pub async fn shutdown(&self) -> Result<(), CacheError> {
        let (respond_to, result) = AsyncResult::pair();
        self.send(ManagerMessage::Command(ManagerCommand::Shutdown { respond_to }))
            .await?;
        result.resolve(Duration::from_secs(30)).await
    }
}

/// Owns the manager's dedicated OS thread. Dropping it joins the thread;
/// callers that want to keep talking to the manager should clone a
/// [`CacheManagerHandle`] via [`CacheManager::handle`] before the
/// `CacheManager` itself goes out of scope.
pub struct CacheManager {
    handle: CacheManagerHandle,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl CacheManager {
    pub fn spawn(config: CacheConfig, provider: Arc<dyn CacheProvider>) -> Self {
        let (sender, receiver) = mpsc::channel(1024);
        let handle = CacheManagerHandle {
            sender,
            config: config.clone(),
        };

        let worker = std::thread::Builder::new()
            .name("segment-cache-manager".to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to start cache manager runtime");
                runtime.block_on(run_loop(receiver, config, provider));
            })
            .expect("failed to spawn cache manager thread");

        CacheManager {
            handle,
            worker: Some(worker),
        }
    }

    pub fn handle(&self) -> CacheManagerHandle {
        self.handle.clone()
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

async fn run_loop(
    mut receiver: mpsc::Receiver<ManagerMessage>,
    config: CacheConfig,
    provider: Arc<dyn CacheProvider>,
) {
    let mut index = SegmentCacheIndex::new(config.max_index_headers);
    let mut bodies: HashMap<[u8; 32], SegmentBody> = HashMap::new();

    while let Some(message) = receiver.recv().await {
        match message {
            ManagerMessage::Command(ManagerCommand::Shutdown { respond_to }) => {
                respond_to.complete(Ok(()));
                break;
            }
            ManagerMessage::Command(command) => {
                handle_command(command, &mut index, &mut bodies, &provider, &config).await;
            }
            ManagerMessage::Event(event) => {
                handle_event(event, &mut index, &mut bodies, &provider, &config).await;
            }
        }
    }
}

async fn handle_command(
    command: ManagerCommand,
    index: &mut SegmentCacheIndex,
    bodies: &mut HashMap<[u8; 32], SegmentBody>,
    provider: &Arc<dyn CacheProvider>,
    config: &CacheConfig,
) {
    match command {
        ManagerCommand::Locate { request, respond_to } => {
            respond_to.complete(index.locate(&request));
        }
        ManagerCommand::IntersectRegion {
            provenance,
            region,
            respond_to,
        } => {
            respond_to.complete(index.intersect_region(&provenance, &region));
        }
        ManagerCommand::FindRollupCandidates {
            provenance,
            bit_key,
            coords,
            respond_to,
        } => {
            respond_to.complete(index.find_rollup_candidates(&provenance, bit_key, &coords));
        }
        ManagerCommand::GetBody { header, respond_to } => {
            respond_to.complete(get_body(&header, bodies, provider, config).await);
        }
        ManagerCommand::PutBody {
            header,
            body,
            respond_to,
        } => {
            respond_to.complete(put_body(header, body, bodies, index, provider, config).await);
        }
        ManagerCommand::Shutdown { .. } => unreachable!("shutdown is handled by the event loop"),
    }
}

async fn get_body(
    header: &SegmentHeader,
    bodies: &mut HashMap<[u8; 32], SegmentBody>,
    provider: &Arc<dyn CacheProvider>,
    config: &CacheConfig,
) -> Result<Option<SegmentBody>, CacheError> {
    if let Some(body) = bodies.get(header.unique_id()) {
        return Ok(Some(body.clone()));
    }

    let timeout = Duration::from_millis(config.read_timeout_ms);
    match tokio::time::timeout(timeout, provider.get(header)).await {
        Ok(Ok(Some(body))) => {
            bodies.insert(*header.unique_id(), body.clone());
            Ok(Some(body))
        }
        Ok(Ok(None)) => Ok(None),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(CacheError::Timeout {
            operation: "get".to_string(),
            elapsed_ms: timeout.as_millis() as u64,
        }),
    }
}

async fn put_body(
    header: SegmentHeader,
    body: SegmentBody,
    bodies: &mut HashMap<[u8; 32], SegmentBody>,
    index: &mut SegmentCacheIndex,
    provider: &Arc<dyn CacheProvider>,
    config: &CacheConfig,
) -> Result<bool, CacheError> {
    if let Err(err) = index.insert(header.clone()) {
        return Err(err);
    }
    bodies.insert(*header.unique_id(), body.clone());

    let timeout = Duration::from_millis(config.write_timeout_ms);
    match tokio::time::timeout(timeout, provider.put(&header, &body)).await {
        Ok(Ok(written)) => Ok(written),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(CacheError::Timeout {
            operation: "put".to_string(),
            elapsed_ms: timeout.as_millis() as u64,
        }),
    }
}

async fn handle_event(
    event: ManagerEvent,
    index: &mut SegmentCacheIndex,
    bodies: &mut HashMap<[u8; 32], SegmentBody>,
    provider: &Arc<dyn CacheProvider>,
    config: &CacheConfig,
) {
    match event {
        ManagerEvent::LoadSucceeded { segment, dataset } => {
            let header = segment.to_header();
            if let Err(err) = index.insert(header.clone()) {
                tracing::error!(error = %err, "failed to install loaded segment into index");
                return;
            }
            bodies.insert(*header.unique_id(), dataset.body.clone());

            let timeout = Duration::from_millis(config.write_timeout_ms);
            match tokio::time::timeout(timeout, provider.put(&header, &dataset.body)).await {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => tracing::warn!(error = %err, "provider write failed after load"),
                Err(_) => tracing::warn!("provider write timed out after load"),
            }
        }
        ManagerEvent::LoadFailed {
            provenance,
            bit_key,
            cause,
        } => {
            tracing::warn!(?provenance, %bit_key, %cause, "segment load failed");
        }
        ManagerEvent::SegmentAdd { header, body } => {
            if let Err(err) = index.insert(header.clone()) {
                tracing::error!(error = %err, "failed to admit segment into index");
                return;
            }
            if let Some(body) = body {
                bodies.insert(*header.unique_id(), body.clone());
                let timeout = Duration::from_millis(config.write_timeout_ms);
                if let Err(err) = tokio::time::timeout(timeout, provider.put(&header, &body))
                    .await
                    .unwrap_or(Err(CacheError::Timeout {
                        operation: "put".to_string(),
                        elapsed_ms: timeout.as_millis() as u64,
                    }))
                {
                    tracing::warn!(error = %err, "provider write failed during SegmentAdd");
                }
            }
        }
        ManagerEvent::ExternalSegmentCreated { header } => {
            if let Err(err) = index.insert(header) {
                tracing::error!(error = %err, "failed to admit externally announced segment");
            }
        }
        ManagerEvent::ExternalSegmentDeleted { header } => {
            let id = *header.unique_id();
            if let Err(err) = index.remove(&id) {
                tracing::error!(error = %err, "failed to remove externally deleted segment");
            }
            bodies.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentWithData;
    use crate::segment_body::AxisMetadata;
    use crate::segment_header::Provenance;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn provenance() -> Provenance {
        Provenance {
            schema_name: "S".into(),
            schema_checksum: vec![0],
            cube_name: "C".into(),
            measure_name: "Unit Sales".into(),
            rolap_star_fact_table_name: "sales_fact".into(),
        }
    }

    fn header() -> SegmentHeader {
        SegmentHeader::new(
            provenance(),
            vec![SegmentColumn::from_values(
                "state",
                vec![Value::String("CA".into())],
            )],
            vec![],
            BitKey::single(0),
            vec![],
        )
    }

    fn dense_object_body() -> SegmentBody {
        SegmentBody::empty_dense_object(AxisMetadata {
            axis_value_sets: vec![vec![Value::String("CA".into())]],
            null_axis_flags: vec![false],
        })
    }

    #[tokio::test]
    async fn segment_add_then_locate_finds_the_header() {
        let provider = Arc::new(crate::cache_provider::MemoryCacheProvider::new());
        let manager = CacheManager::spawn(CacheConfig::default(), provider);
        let handle = manager.handle();

        let h = header();
        handle
            .notify(ManagerEvent::SegmentAdd {
                header: h.clone(),
                body: Some(dense_object_body()),
            })
            .await
            .unwrap();

        // Give the fire-and-forget event a moment to land before querying.
        tokio::time::sleep(Duration::from_millis(20)).await;

        let found = handle
            .locate(LocateRequest {
                provenance: provenance(),
                bit_key: BitKey::single(0),
                coords: HashMap::from([("state".to_string(), Value::String("CA".into()))]),
                compound_predicates: vec![],
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].unique_id(), h.unique_id());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_stops_the_manager_thread() {
        let provider = Arc::new(crate::cache_provider::MemoryCacheProvider::new());
        let manager = CacheManager::spawn(CacheConfig::default(), provider);
        let handle = manager.handle();
        handle.shutdown().await.unwrap();

        // The worker thread has exited; further sends fail because the
        // receiver has been dropped along with the loop.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let result = handle
            .locate(LocateRequest {
                provenance: provenance(),
                bit_key: BitKey::single(0),
                coords: HashMap::new(),
                compound_predicates: vec![],
            })
            .await;
        assert!(result.is_err());
    }

    struct SlowProvider {
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CacheProvider for SlowProvider {
        async fn contains(&self, _header: &SegmentHeader) -> Result<bool, CacheError> {
            Ok(false)
        }
        async fn get(&self, _header: &SegmentHeader) -> Result<Option<SegmentBody>, CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(None)
        }
        async fn put(&self, _header: &SegmentHeader, _body: &SegmentBody) -> Result<bool, CacheError> {
            Ok(true)
        }
        async fn remove(&self, _header: &SegmentHeader) -> Result<bool, CacheError> {
            Ok(false)
        }
        async fn get_segment_headers(&self) -> Result<Vec<SegmentHeader>, CacheError> {
            Ok(Vec::new())
        }
        fn add_listener(&self, _listener: Box<dyn crate::cache_provider::CacheListener>) {}
        fn remove_all_listeners(&self) {}
        fn supports_rich_index(&self) -> bool {
            false
        }
        async fn tear_down(&self) -> Result<(), CacheError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn provider_timeout_surfaces_as_timeout_error() {
        let provider = Arc::new(SlowProvider {
            delay: Duration::from_millis(200),
            calls: AtomicUsize::new(0),
        });
        let mut config = CacheConfig::default();
        config.read_timeout_ms = 20;
        let manager = CacheManager::spawn(config, provider);
        let handle = manager.handle();

        let result = handle.get_body(header()).await;
        assert!(matches!(result, Err(CacheError::Timeout { .. })));
        handle.shutdown().await.unwrap();
    }

    #[test]
    fn segment_with_data_type_is_reachable_from_this_module() {
        // Compile-time check that the manager's public surface composes
        // with the rest of the runtime segment types.
        fn _accepts(_: SegmentWithData) {}
    }
}
