//! An in-memory, deterministic [`Controller`] used by tests and by `cli` when no
//! real backend is linked in.
//!
//! Grounded on `storage::MemoryBackend` in the teacher repo: both play the same
//! role of a fully-owned, no-external-dependency stand-in for the trait they
//! implement. Where `MemoryBackend` delegates every call to an owned `CausalGraph`,
//! `MockController` delegates to an owned synthetic trace (`SyntheticTrace`)
//! and simulates asynchronous latency with a background thread rather than a
//! real I/O-bound backend.

use super::{
    ArrayHandle, AsyncOutcome, Controller, FutureHandle, IndexedFetchOutcome, LoadOutcome,
    RawEventPoint, RawSamplePoint, TableArgs, TableFetchOutcome, TableRow, TopologyNodeSnapshot,
    TrackFetchOutcome, TrackSnapshot,
};
use crate::handle::{Handle, HandleKind, Property, ResultCode, Value};
use crate::model::topology::NodeKind;
use crate::model::track::TrackKind;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A minimal synthetic trace the mock controller serves data from: a handful of
/// tracks, each with a handful of events, enough to exercise the provider and
/// table engine end to end without any real trace format.
#[derive(Debug, Clone)]
pub struct SyntheticTrace {
    pub tracks: Vec<SyntheticTrack>,
    /// When set, `load_async` resolves to a failure instead of serving
    /// `tracks` — for exercising the provider's error path without a real
    /// broken trace file.
    pub fail_load: bool,
}

#[derive(Debug, Clone)]
pub struct SyntheticTrack {
    pub id: u64,
    pub name: String,
    pub events: Vec<RawEventPoint>,
}

impl Default for SyntheticTrace {
    fn default() -> Self {
        let events = |track_id: u64, n: u64| -> Vec<RawEventPoint> {
            (0..n)
                .map(|i| RawEventPoint {
                    id: track_id * 1_000_000 + i,
                    start_ns: i * 1_000,
                    duration_ns: 500,
                    level: (i % 3) as u32,
                    name: format!("kernel_{i}"),
                    child_count: 0,
                    combined_name: None,
                })
                .collect()
        };
        SyntheticTrace {
            tracks: vec![
                SyntheticTrack {
                    id: 1,
                    name: "Queue 0".to_string(),
                    events: events(1, 64),
                },
                SyntheticTrack {
                    id: 2,
                    name: "Queue 1".to_string(),
                    events: events(2, 32),
                },
            ],
            fail_load: false,
        }
    }
}

enum Pending {
    Running,
    Done(ResultCode, AsyncOutcome),
    Cancelled,
}

/// In-flight / completed future bookkeeping, shared between the background
/// completion threads and the synchronous polling call from the driver thread
/// — the one place in this crate a concurrent map genuinely earns its keep
/// (see SPEC_FULL.md §3).
pub struct MockController {
    trace: SyntheticTrace,
    futures: Arc<DashMap<u64, Pending>>,
    arrays: DashMap<u64, Vec<Value>>,
    next_id: AtomicU64,
    /// Simulated per-operation latency. Zero in tests that want determinism
    /// without sleeping; non-zero in the `cli` demo so polling is visibly
    /// asynchronous.
    latency: Duration,
}

impl MockController {
    pub fn new(trace: SyntheticTrace, latency: Duration) -> Self {
        Self {
            trace,
            futures: Arc::new(DashMap::new()),
            arrays: DashMap::new(),
            next_id: AtomicU64::new(1),
            latency,
        }
    }

    fn alloc_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn spawn_outcome(&self, future: FutureHandle, outcome: AsyncOutcome) {
        self.spawn_result(future, ResultCode::Success, outcome);
    }

    fn spawn_result(&self, future: FutureHandle, code: ResultCode, outcome: AsyncOutcome) {
        self.futures.insert(future.0.id, Pending::Running);
        let futures = Arc::clone(&self.futures);
        let id = future.0.id;
        let latency = self.latency;
        std::thread::spawn(move || {
            if !latency.is_zero() {
                std::thread::sleep(latency);
            }
            if let Some(mut slot) = futures.get_mut(&id) {
                if matches!(*slot, Pending::Running) {
                    *slot = Pending::Done(code, outcome);
                }
            }
        });
    }

    fn track_by_handle(&self, track: Handle) -> Option<&SyntheticTrack> {
        self.trace.tracks.iter().find(|t| t.id == track.id)
    }

    /// Builds the topology/track snapshot returned by a successful load: one
    /// synthetic host, one process, and one `Queue` node per synthetic track
    /// (spec §4.2.1's node/processor/process/queue walk, minus the handle
    /// round-trips since this controller already owns the data directly).
    fn load_outcome(&self) -> LoadOutcome {
        const HOST_ID: u64 = 1_000_000;
        const PROCESS_ID: u64 = 1_000_001;
        let mut nodes = vec![
            TopologyNodeSnapshot {
                id: HOST_ID,
                kind: NodeKind::Host,
                name: "localhost".to_string(),
                parent: None,
                track_id: None,
            },
            TopologyNodeSnapshot {
                id: PROCESS_ID,
                kind: NodeKind::Process,
                name: "synthetic-process".to_string(),
                parent: Some(HOST_ID),
                track_id: None,
            },
        ];
        let mut tracks = Vec::new();
        let mut min_timestamp = u64::MAX;
        let mut max_timestamp = 0u64;
        for (index, track) in self.trace.tracks.iter().enumerate() {
            nodes.push(TopologyNodeSnapshot {
                id: track.id,
                kind: NodeKind::Queue,
                name: track.name.clone(),
                parent: Some(PROCESS_ID),
                track_id: Some(track.id),
            });
            let min_ts = track.events.iter().map(|e| e.start_ns).min().unwrap_or(0);
            let max_ts = track.events.iter().map(|e| e.start_ns + e.duration_ns).max().unwrap_or(0);
            min_timestamp = min_timestamp.min(min_ts);
            max_timestamp = max_timestamp.max(max_ts);
            tracks.push(TrackSnapshot {
                index: index as u32,
                id: track.id,
                track_type: TrackKind::Events,
                name: track.name.clone(),
                min_ts,
                max_ts,
                num_entries: track.events.len() as u64,
                min_value: 0.0,
                max_value: 0.0,
                topology_node: Some(track.id),
            });
        }
        if tracks.is_empty() {
            min_timestamp = 0;
        }
        LoadOutcome {
            min_timestamp,
            max_timestamp,
            nodes,
            tracks,
        }
    }
}

impl Controller for MockController {
    fn load_async(&self, path: &str) -> (ResultCode, Option<FutureHandle>) {
        debug!(path, "mock controller: load_async");
        let future = self.future_alloc();
        if self.trace.fail_load {
            self.spawn_result(future, ResultCode::DbAccessFailed, AsyncOutcome::Load(LoadOutcome::default()));
        } else {
            self.spawn_outcome(future, AsyncOutcome::Load(self.load_outcome()));
        }
        (ResultCode::Success, Some(future))
    }

    fn get_uint64(&self, _handle: Handle, _prop: Property, _index: u64) -> Result<u64, ResultCode> {
        Err(ResultCode::NotSupported)
    }

    fn get_double(&self, _handle: Handle, _prop: Property, _index: u64) -> Result<f64, ResultCode> {
        Err(ResultCode::NotSupported)
    }

    fn get_string(&self, handle: Handle, _prop: Property, _index: u64) -> Result<String, ResultCode> {
        if handle.kind == HandleKind::Track {
            if let Some(track) = self.track_by_handle(handle) {
                return Ok(track.name.clone());
            }
        }
        Err(ResultCode::InvalidParameter)
    }

    fn get_object(&self, _handle: Handle, _prop: Property, _index: u64) -> Result<Handle, ResultCode> {
        Err(ResultCode::NotSupported)
    }

    fn set_uint64(&self, _handle: Handle, _prop: Property, _index: u64, _value: u64) -> ResultCode {
        ResultCode::NotSupported
    }

    fn set_double(&self, _handle: Handle, _prop: Property, _index: u64, _value: f64) -> ResultCode {
        ResultCode::NotSupported
    }

    fn set_string(&self, _handle: Handle, _prop: Property, _index: u64, _value: &str) -> ResultCode {
        ResultCode::NotSupported
    }

    fn set_object(&self, _handle: Handle, _prop: Property, _index: u64, _value: Handle) -> ResultCode {
        ResultCode::NotSupported
    }

    fn array_alloc(&self, _initial_capacity: u64) -> ArrayHandle {
        let id = self.alloc_id();
        self.arrays.insert(id, Vec::new());
        ArrayHandle(Handle::new(id, HandleKind::Array))
    }

    fn array_free(&self, array: ArrayHandle) {
        self.arrays.remove(&array.0.id);
    }

    fn array_num_entries(&self, array: ArrayHandle) -> u64 {
        self.arrays.get(&array.0.id).map(|v| v.len() as u64).unwrap_or(0)
    }

    fn array_entry(&self, array: ArrayHandle, index: u64) -> Result<Value, ResultCode> {
        self.arrays
            .get(&array.0.id)
            .and_then(|v| v.get(index as usize).cloned())
            .ok_or(ResultCode::InvalidParameter)
    }

    fn future_alloc(&self) -> FutureHandle {
        let id = self.alloc_id();
        FutureHandle(Handle::new(id, HandleKind::Future))
    }

    fn future_free(&self, future: FutureHandle) {
        self.futures.remove(&future.0.id);
    }

    fn future_wait(&self, future: FutureHandle, timeout: Duration) -> ResultCode {
        let deadline = std::time::Instant::now() + timeout;
        loop {
            match self.futures.get(&future.0.id).map(|s| matches!(*s, Pending::Running)) {
                Some(true) => {
                    if timeout.is_zero() || std::time::Instant::now() >= deadline {
                        return ResultCode::Timeout;
                    }
                    std::thread::sleep(Duration::from_millis(1));
                }
                Some(false) => return ResultCode::Success,
                None => return ResultCode::InvalidParameter,
            }
        }
    }

    fn future_cancel(&self, future: FutureHandle) -> ResultCode {
        if let Some(mut slot) = self.futures.get_mut(&future.0.id) {
            if matches!(*slot, Pending::Running) {
                *slot = Pending::Cancelled;
            }
            ResultCode::Success
        } else {
            ResultCode::InvalidParameter
        }
    }

    fn take_outcome(&self, future: FutureHandle) -> Option<(ResultCode, AsyncOutcome)> {
        match self.futures.remove(&future.0.id) {
            Some((_, Pending::Done(code, outcome))) => Some((code, outcome)),
            Some((_, Pending::Cancelled)) => Some((ResultCode::DbAbort, AsyncOutcome::Load(LoadOutcome::default()))),
            _ => None,
        }
    }

    fn get_indexed_property_async(
        &self,
        _host: Handle,
        target: Handle,
        prop: Property,
        _index: u64,
        _count: u64,
        future: FutureHandle,
    ) -> ResultCode {
        // Tag ranges lifted straight from `handle::property_range`: 18000
        // (ExtData), 17000 (FlowControl), 16000 (Callstack) — so each of the
        // event-detail provider's three fetch kinds gets distinguishable
        // synthetic rows instead of one shared empty array.
        let values = match prop.0 {
            18000 => vec![
                Value::String("device".to_string()),
                Value::String("gpu0".to_string()),
                Value::String("grid_dim".to_string()),
                Value::String("128x1x1".to_string()),
            ],
            17000 => vec![
                Value::UInt64(0),
                Value::UInt64(target.id % 2 + 1),
                Value::UInt64(target.id + 1),
                Value::String("produces".to_string()),
            ],
            16000 => vec![
                Value::UInt64(0),
                Value::String("main".to_string()),
                Value::String(String::new()),
                Value::UInt64(1),
                Value::String("kernel_launch".to_string()),
                Value::String("kernel.cpp:42".to_string()),
            ],
            _ => Vec::new(),
        };
        self.spawn_outcome(future, AsyncOutcome::Indexed(IndexedFetchOutcome(values)));
        ResultCode::Success
    }

    fn track_fetch_async(
        &self,
        track: Handle,
        t_start_ns: u64,
        t_end_ns: u64,
        future: FutureHandle,
    ) -> ResultCode {
        let Some(synthetic) = self.track_by_handle(track) else {
            return ResultCode::InvalidParameter;
        };
        let points: Vec<RawEventPoint> = synthetic
            .events
            .iter()
            .filter(|e| e.start_ns >= t_start_ns && e.start_ns < t_end_ns)
            .cloned()
            .collect();
        self.spawn_outcome(future, AsyncOutcome::Track(TrackFetchOutcome::Events(points)));
        ResultCode::Success
    }

    fn graph_fetch_async(
        &self,
        graph: Handle,
        t_start_ns: u64,
        t_end_ns: u64,
        horz_pixels: u32,
        future: FutureHandle,
    ) -> ResultCode {
        let buckets = horz_pixels.max(1) as u64;
        let span = t_end_ns.saturating_sub(t_start_ns).max(1);
        if let Some(track) = self.track_by_handle(graph) {
            // Event-kind track: bin raw events into `buckets` pixel columns,
            // collapsing adjacent same-bucket events into one combined point
            // (the "rendered navigable timeline" viewport, distinct from the
            // full-resolution `track_fetch_async` point cache).
            let bucket_span = (span / buckets).max(1);
            let mut binned: Vec<RawEventPoint> = Vec::new();
            for event in track.events.iter().filter(|e| e.start_ns >= t_start_ns && e.start_ns < t_end_ns) {
                let bucket_start = t_start_ns + (event.start_ns - t_start_ns) / bucket_span * bucket_span;
                match binned.last_mut().filter(|last| last.start_ns == bucket_start) {
                    Some(last) => {
                        last.child_count += 1;
                        last.combined_name = Some(format!("{} (+{})", last.name, last.child_count));
                    }
                    None => binned.push(RawEventPoint {
                        id: event.id,
                        start_ns: bucket_start,
                        duration_ns: bucket_span,
                        level: event.level,
                        name: event.name.clone(),
                        child_count: 0,
                        combined_name: None,
                    }),
                }
            }
            self.spawn_outcome(future, AsyncOutcome::Track(TrackFetchOutcome::Events(binned)));
            return ResultCode::Success;
        }
        let samples: Vec<RawSamplePoint> = (0..buckets)
            .map(|i| RawSamplePoint {
                start_ns: t_start_ns + i * span / buckets,
                value: (i as f64 / buckets as f64).sin().abs(),
            })
            .collect();
        self.spawn_outcome(future, AsyncOutcome::Track(TrackFetchOutcome::Samples(samples)));
        ResultCode::Success
    }

    fn table_fetch_async(&self, _table: Handle, args: TableArgs, future: FutureHandle) -> ResultCode {
        let start = args.start_index.unwrap_or(0);
        let count = args.start_count.unwrap_or(100);
        let all_events: Vec<&RawEventPoint> = self.trace.tracks.iter().flat_map(|t| t.events.iter()).collect();
        let total_rows = all_events.len() as u64;
        let rows = all_events
            .into_iter()
            .skip(start as usize)
            .take(count as usize)
            .map(|e| TableRow(vec![e.id.to_string(), e.name.clone(), e.start_ns.to_string()]))
            .collect();
        self.spawn_outcome(
            future,
            AsyncOutcome::Table(TableFetchOutcome {
                header: vec!["id".to_string(), "name".to_string(), "start_ns".to_string()],
                rows,
                total_rows,
            }),
        );
        ResultCode::Success
    }

    fn save_trimmed_trace(
        &self,
        _t_start_ns: u64,
        _t_end_ns: u64,
        _path: &str,
        future: FutureHandle,
    ) -> ResultCode {
        self.spawn_outcome(future, AsyncOutcome::SaveTrimmedTrace);
        ResultCode::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> MockController {
        MockController::new(SyntheticTrace::default(), Duration::ZERO)
    }

    #[test]
    fn load_completes_and_outcome_is_consumed_once() {
        let c = controller();
        let (code, future) = c.load_async("irrelevant.trace");
        assert_eq!(code, ResultCode::Success);
        let future = future.unwrap();
        assert_eq!(c.future_wait(future, Duration::ZERO), ResultCode::Success);
        assert!(c.take_outcome(future).is_some());
        assert!(c.take_outcome(future).is_none());
    }

    #[test]
    fn array_out_of_range_never_returns_undefined_data() {
        let c = controller();
        let array = c.array_alloc(0);
        assert_eq!(c.array_entry(array, 0), Err(ResultCode::InvalidParameter));
        c.array_free(array);
    }

    #[test]
    fn track_fetch_filters_to_requested_window() {
        let c = controller();
        let track = Handle::new(1, HandleKind::Track);
        let future = c.future_alloc();
        assert_eq!(c.track_fetch_async(track, 0, 5_000, future), ResultCode::Success);
        assert_eq!(c.future_wait(future, Duration::from_millis(50)), ResultCode::Success);
        match c.take_outcome(future) {
            Some((ResultCode::Success, AsyncOutcome::Track(TrackFetchOutcome::Events(events)))) => {
                assert!(events.iter().all(|e| e.start_ns < 5_000));
                assert!(!events.is_empty());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn cancel_before_completion_reports_abort() {
        let c = MockController::new(SyntheticTrace::default(), Duration::from_millis(50));
        let (_, future) = c.load_async("irrelevant.trace");
        let future = future.unwrap();
        assert_eq!(c.future_cancel(future), ResultCode::Success);
        let code = c.future_wait(future, Duration::from_millis(500));
        assert_eq!(code, ResultCode::Success);
        assert_eq!(c.take_outcome(future).unwrap().0, ResultCode::DbAbort);
    }
}
