//! The Data Provider: the request broker/cache/state machine sitting between
//! the [`crate::controller::Controller`] bridge and the UI (spec §4.2).
//!
//! `update()` is the only place time passes for this type — it is meant to be
//! called once per UI frame, non-blockingly drains whatever requests have
//! settled, merges their data into the owned caches, and publishes the
//! corresponding [`crate::bus::BusEvent`]. Nothing here blocks except
//! `cancel_all`, which is the teardown path and genuinely waits.

use crate::bus::{BusEvent, EventBus};
use crate::controller::{
    AsyncOutcome, Controller, FutureHandle, LoadOutcome, TableArgs, TableKind, TrackFetchOutcome,
};
use crate::handle::{Handle, Property, ResultCode, Value};
use crate::model::event_detail::{CallStackFrame, EventDetail, FlowControlEntry, FlowDirection};
use crate::model::table_info::{AppliedQuery, TableInfo};
use crate::model::track::{GroupId, RawEventTrackData, RawSampleTrackData, RawTrackData, TrackInfo, TrackKind};
use crate::model::topology::{Node, Topology};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderState {
    Init,
    Loading,
    Ready,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestType {
    LoadTrace = 0,
    FetchTrack = 1,
    FetchGraph = 2,
    FetchTable = 3,
    FetchEventExtData = 4,
    FetchEventFlowControl = 5,
    FetchEventCallStack = 6,
    SaveTrimmedTrace = 7,
    ExportTable = 8,
}

const SINGLETON_FLAG: u64 = 1 << 63;

/// Request ids for operations with at most one outstanding instance at a time
/// (load, save, export, per-`TableKind` fetch) set the top bit and carry just
/// the request type in the low byte.
fn singleton_request_id(request_type: RequestType) -> u64 {
    SINGLETON_FLAG | (request_type as u64)
}

/// Request id for the single in-flight fetch of a given table kind — a
/// singleton id like [`singleton_request_id`], distinguished further by
/// `kind` so the four table kinds don't collide with each other.
fn table_request_id(kind: TableKind) -> u64 {
    SINGLETON_FLAG | ((kind as u64) << 8) | (RequestType::FetchTable as u64)
}

/// Request ids for per-(track, chunk, group) fetches bit-pack all four
/// fields so two in-flight requests for the same triple collide and the
/// second is rejected as a duplicate (spec §4.2.2, §9).
fn chunk_request_id(object_id: u64, chunk_index: u16, group_id: GroupId, request_type: RequestType) -> u64 {
    debug_assert!(object_id < (1 << 31), "object id must fit 31 bits to avoid colliding with the singleton flag");
    ((object_id & 0x7FFF_FFFF) << 32) | ((chunk_index as u64) << 16) | ((group_id.0 as u64) << 8) | (request_type as u64)
}

/// Time span covered by one chunked track/graph fetch request. Chosen so a
/// multi-second view range still produces a handful of cancelable requests
/// rather than one giant one.
const FETCH_CHUNK_SPAN_NS: u64 = 2_000_000;

/// The `Property` tag passed to `get_indexed_property_async` for each of the
/// three lazily-fetched event-detail sections (spec §4.2.5), so a controller
/// implementation can tell which section a request is for instead of
/// treating them as interchangeable. Reuses the base of each section's own
/// `HandleKind` property range (`core/src/handle.rs::property_range`) rather
/// than minting unrelated numbers.
fn property_for_event_detail(request_type: RequestType) -> Property {
    match request_type {
        RequestType::FetchEventExtData => Property(18000),
        RequestType::FetchEventFlowControl => Property(17000),
        RequestType::FetchEventCallStack => Property(16000),
        other => unreachable!("{other:?} has no event-detail property tag"),
    }
}

/// Which `TrackKind` a table's rows are scoped to, if any (spec §4.2.4 step
/// 4: "only adds tracks of the matching track_type"). `SummaryKernel` rows
/// aggregate across all tracks, so no filter applies.
fn track_kind_for_table(kind: TableKind) -> Option<TrackKind> {
    match kind {
        TableKind::Event | TableKind::EventSearch => Some(TrackKind::Events),
        TableKind::Sample => Some(TrackKind::Samples),
        TableKind::SummaryKernel => None,
    }
}

fn parse_ext_data(values: Vec<Value>) -> Vec<(String, String)> {
    values
        .chunks_exact(2)
        .filter_map(|pair| match pair {
            [Value::String(key), Value::String(value)] => Some((key.clone(), value.clone())),
            _ => None,
        })
        .collect()
}

fn parse_flow_control(values: Vec<Value>) -> Vec<FlowControlEntry> {
    values
        .chunks_exact(4)
        .filter_map(|row| match row {
            [Value::UInt64(direction), Value::UInt64(target_track_id), Value::UInt64(target_event_id), Value::String(label)] => Some(FlowControlEntry {
                direction: if *direction == 0 { FlowDirection::Producer } else { FlowDirection::Consumer },
                target_track_id: *target_track_id,
                target_event_id: *target_event_id,
                label: label.clone(),
            }),
            _ => None,
        })
        .collect()
}

fn parse_call_stack(values: Vec<Value>) -> Vec<CallStackFrame> {
    values
        .chunks_exact(3)
        .filter_map(|row| match row {
            [Value::UInt64(depth), Value::String(symbol), Value::String(source_location)] => Some(CallStackFrame {
                depth: *depth as u32,
                symbol: symbol.clone(),
                source_location: if source_location.is_empty() { None } else { Some(source_location.clone()) },
            }),
            _ => None,
        })
        .collect()
}

#[derive(Debug)]
enum RequestTarget {
    None,
    Track { track_id: u64, chunk_index: u64, group_id: GroupId },
    Graph { graph_id: u64, chunk_index: u64, group_id: GroupId },
    Table { kind: TableKind, start_index: u64 },
    Event { event_id: u64 },
}

struct InFlightRequest {
    future: FutureHandle,
    request_type: RequestType,
    request_time: u64,
    target: RequestTarget,
}

pub struct DataProvider {
    controller: Arc<dyn Controller>,
    state: ProviderState,
    /// Path of the trace the controller is currently bound to, or the one it
    /// was last asked to load while that load is still in flight — the
    /// `source_id` every published [`BusEvent`] is stamped with (spec §4.4).
    trace_path: Option<String>,
    topology: Topology,
    tracks: HashMap<u64, RawTrackData>,
    graphs: HashMap<u64, RawTrackData>,
    /// Per-track summary metadata (name, type, timestamp/value range) built
    /// during load (spec §4.2.1). Populated independently of `tracks`, which
    /// only ever holds a track's resident point cache.
    track_meta: HashMap<u64, TrackInfo>,
    timeline_min_ts: u64,
    timeline_max_ts: u64,
    event_details: HashMap<u64, EventDetail>,
    tables: HashMap<TableKind, TableInfo>,
    requests: HashMap<u64, InFlightRequest>,
    /// Monotonic logical clock used only to order chunk responses against
    /// each other; deliberately not wall-clock time so behavior is
    /// deterministic under test.
    clock: u64,
    next_group_id: u8,
    track_ranges: HashMap<u64, (u64, u64, GroupId)>,
    graph_ranges: HashMap<u64, (u64, u64, GroupId)>,
}

impl DataProvider {
    pub fn new(controller: Arc<dyn Controller>) -> Self {
        Self {
            controller,
            state: ProviderState::Init,
            trace_path: None,
            topology: Topology::new(),
            tracks: HashMap::new(),
            graphs: HashMap::new(),
            track_meta: HashMap::new(),
            timeline_min_ts: 0,
            timeline_max_ts: 0,
            event_details: HashMap::new(),
            tables: HashMap::new(),
            requests: HashMap::new(),
            clock: 0,
            next_group_id: 0,
            track_ranges: HashMap::new(),
            graph_ranges: HashMap::new(),
        }
    }

    pub fn state(&self) -> &ProviderState {
        &self.state
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn track_info(&self, track_id: u64) -> Option<&TrackInfo> {
        self.track_meta.get(&track_id)
    }

    pub fn track_infos(&self) -> impl Iterator<Item = &TrackInfo> {
        self.track_meta.values()
    }

    pub fn timeline_range(&self) -> (u64, u64) {
        (self.timeline_min_ts, self.timeline_max_ts)
    }

    pub fn track(&self, track_id: u64) -> Option<&RawTrackData> {
        self.tracks.get(&track_id)
    }

    pub fn table(&self, kind: TableKind) -> Option<&TableInfo> {
        self.tables.get(&kind)
    }

    pub fn event_detail(&self, event_id: u64) -> Option<&EventDetail> {
        self.event_details.get(&event_id)
    }

    /// The path bus events published from here are stamped with (spec §4.4).
    pub fn source_id(&self) -> Option<String> {
        self.trace_path.clone()
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn group_id_for(ranges: &mut HashMap<u64, (u64, u64, GroupId)>, next_group_id: &mut u8, object_id: u64, t_start_ns: u64, t_end_ns: u64) -> GroupId {
        if let Some((s, e, g)) = ranges.get(&object_id) {
            if *s == t_start_ns && *e == t_end_ns {
                return *g;
            }
        }
        let group = GroupId(*next_group_id);
        *next_group_id = next_group_id.wrapping_add(1);
        ranges.insert(object_id, (t_start_ns, t_end_ns, group));
        group
    }

    /// Begins loading a trace. Returns `false` if a load is already in
    /// flight or the previous load failed outright (spec §4.2.1). Otherwise
    /// closes any prior controller state before issuing the new load.
    pub fn fetch_trace(&mut self, path: &str) -> bool {
        if matches!(self.state, ProviderState::Loading | ProviderState::Error(_)) {
            return false;
        }
        self.close_controller();
        self.trace_path = Some(path.to_string());
        let (code, future) = self.controller.load_async(path);
        if !code.is_non_exceptional() {
            self.state = ProviderState::Error(format!("{code:?}"));
            return false;
        }
        let Some(future) = future else {
            self.state = ProviderState::Error("controller reported success with no future".to_string());
            return false;
        };
        let request_time = self.tick();
        self.requests.insert(
            singleton_request_id(RequestType::LoadTrace),
            InFlightRequest {
                future,
                request_type: RequestType::LoadTrace,
                request_time,
                target: RequestTarget::None,
            },
        );
        self.state = ProviderState::Loading;
        true
    }

    /// Issues one or more chunked `track_fetch_async` calls covering
    /// `[t_start_ns, t_end_ns)`. Returns `false` if the provider isn't
    /// `kReady` (spec §4.2: "Only kReady accepts fetch requests"), the range
    /// is empty, or every chunk in it is already covered by an in-flight
    /// request.
    pub fn fetch_track(&mut self, track: Handle, t_start_ns: u64, t_end_ns: u64) -> bool {
        if self.state != ProviderState::Ready || t_end_ns <= t_start_ns {
            return false;
        }
        let group_id = Self::group_id_for(&mut self.track_ranges, &mut self.next_group_id, track.id, t_start_ns, t_end_ns);
        let request_time = self.tick();
        let mut cursor = t_start_ns;
        let mut chunk_index: u16 = 0;
        let mut issued = 0u64;
        while cursor < t_end_ns {
            let chunk_end = (cursor + FETCH_CHUNK_SPAN_NS).min(t_end_ns);
            let request_id = chunk_request_id(track.id, chunk_index, group_id, RequestType::FetchTrack);
            if !self.requests.contains_key(&request_id) {
                let future = self.controller.future_alloc();
                let code = self.controller.track_fetch_async(track, cursor, chunk_end, future);
                if code.is_success() {
                    self.requests.insert(
                        request_id,
                        InFlightRequest {
                            future,
                            request_type: RequestType::FetchTrack,
                            request_time,
                            target: RequestTarget::Track { track_id: track.id, chunk_index: chunk_index as u64, group_id },
                        },
                    );
                    issued += 1;
                } else {
                    warn!(?code, track_id = track.id, "track_fetch_async rejected");
                }
            }
            cursor = chunk_end;
            chunk_index += 1;
        }
        let data = self
            .tracks
            .entry(track.id)
            .or_insert_with(|| RawTrackData::Event(RawEventTrackData::new(track.id)));
        if let RawTrackData::Event(e) = data {
            e.set_expected_chunks(chunk_index as u64);
        }
        issued > 0
    }

    /// Issues chunked `graph_fetch_async` calls for a sample-series graph,
    /// rendering `horz_pixels` buckets across the range (spec §4.2.3).
    pub fn fetch_graph(&mut self, graph: Handle, t_start_ns: u64, t_end_ns: u64, horz_pixels: u32) -> bool {
        if self.state != ProviderState::Ready || t_end_ns <= t_start_ns {
            return false;
        }
        let group_id = Self::group_id_for(&mut self.graph_ranges, &mut self.next_group_id, graph.id, t_start_ns, t_end_ns);
        let request_time = self.tick();
        let mut cursor = t_start_ns;
        let mut chunk_index: u16 = 0;
        let mut issued = 0u64;
        while cursor < t_end_ns {
            let chunk_end = (cursor + FETCH_CHUNK_SPAN_NS).min(t_end_ns);
            let request_id = chunk_request_id(graph.id, chunk_index, group_id, RequestType::FetchGraph);
            if !self.requests.contains_key(&request_id) {
                let future = self.controller.future_alloc();
                let code = self.controller.graph_fetch_async(graph, cursor, chunk_end, horz_pixels, future);
                if code.is_success() {
                    self.requests.insert(
                        request_id,
                        InFlightRequest {
                            future,
                            request_type: RequestType::FetchGraph,
                            request_time,
                            target: RequestTarget::Graph { graph_id: graph.id, chunk_index: chunk_index as u64, group_id },
                        },
                    );
                    issued += 1;
                }
            }
            cursor = chunk_end;
            chunk_index += 1;
        }
        let track_type = self.track_meta.get(&graph.id).map(|info| info.track_type);
        let data = self.graphs.entry(graph.id).or_insert_with(|| match track_type {
            Some(TrackKind::Events) => RawTrackData::Event(RawEventTrackData::new(graph.id)),
            _ => RawTrackData::Sample(RawSampleTrackData::new(graph.id)),
        });
        data.set_expected_chunks(chunk_index as u64);
        issued > 0
    }

    /// Issues the single in-flight table fetch for `kind`, replacing any
    /// prior in-flight fetch of the same kind (spec §4.2.4: one request per
    /// table type).
    pub fn fetch_table(&mut self, table: Handle, kind: TableKind, mut args: TableArgs) -> bool {
        if self.state != ProviderState::Ready {
            return false;
        }
        if !args.track_handles.is_empty() {
            if let Some(expected) = track_kind_for_table(kind) {
                args.track_handles.retain(|handle| self.track_meta.get(&handle.id).map(|info| info.track_type) == Some(expected));
                if args.track_handles.is_empty() {
                    return false;
                }
            }
        }
        let request_id = table_request_id(kind);
        let applied = AppliedQuery {
            sort_column: args.sort_column,
            sort_order: args.sort_order,
            filter: args.filter.clone(),
            group: args.group.clone(),
        };
        let start_index = args.start_index.unwrap_or(0);
        let future = self.controller.future_alloc();
        let code = self.controller.table_fetch_async(table, args, future);
        if !code.is_success() {
            return false;
        }
        let request_time = self.tick();
        self.requests.insert(
            request_id,
            InFlightRequest {
                future,
                request_type: RequestType::FetchTable,
                request_time,
                target: RequestTarget::Table { kind, start_index },
            },
        );
        self.tables.entry(kind).or_insert_with(|| TableInfo::new(kind)).pending = Some(applied);
        true
    }

    /// Populates `basic_info` synchronously from whatever track data is
    /// already cached, then kicks off the three lazily-fetched sections
    /// (spec §4.2.5).
    pub fn fetch_event(&mut self, event_id: u64, host: Handle, track_id: u64) {
        if self.state != ProviderState::Ready {
            return;
        }
        let detail = self.event_details.entry(event_id).or_insert_with(|| EventDetail::new(event_id));
        if detail.basic_info.is_none() {
            if let Some(RawTrackData::Event(track)) = self.tracks.get(&track_id) {
                if let Some(event) = track.points().iter().find(|e| e.id == event_id) {
                    detail.basic_info = Some(crate::model::event_detail::BasicInfo {
                        event_id,
                        track_id,
                        name: event.name.clone(),
                        start_ns: event.start_ns,
                        duration_ns: event.duration_ns,
                    });
                }
            }
        }
        for request_type in [RequestType::FetchEventExtData, RequestType::FetchEventFlowControl, RequestType::FetchEventCallStack] {
            // A true singleton per request type, not per event (spec §4.2.2):
            // at most one ext-data/flow-control/call-stack fetch of a given
            // kind is ever in flight at a time, across every event.
            let request_id = singleton_request_id(request_type);
            if self.requests.contains_key(&request_id) {
                continue;
            }
            let future = self.controller.future_alloc();
            let prop = property_for_event_detail(request_type);
            let code = self.controller.get_indexed_property_async(host, Handle::new(event_id, crate::handle::HandleKind::Event), prop, 0, u64::MAX, future);
            if code.is_success() {
                let request_time = self.tick();
                self.requests.insert(
                    request_id,
                    InFlightRequest {
                        future,
                        request_type,
                        request_time,
                        target: RequestTarget::Event { event_id },
                    },
                );
            }
        }
    }

    /// Evicts a track's resident point cache without tearing down the whole
    /// trace (spec §3 "Lifecycle/ownership"). Rejected while the track still
    /// has chunks outstanding unless `force` is set; a track with no cached
    /// data at all is trivially freed.
    pub fn free_track(&mut self, track_id: u64, force: bool) -> bool {
        let has_unfinished_chunks = self.tracks.get(&track_id).map(|data| !data.all_data_ready()).unwrap_or(false);
        if has_unfinished_chunks && !force {
            return false;
        }
        self.tracks.remove(&track_id);
        self.track_ranges.remove(&track_id);
        true
    }

    pub fn save_trimmed_trace(&mut self, t_start_ns: u64, t_end_ns: u64, path: &str) -> bool {
        if self.state != ProviderState::Ready {
            return false;
        }
        let request_id = singleton_request_id(RequestType::SaveTrimmedTrace);
        if self.requests.contains_key(&request_id) {
            return false;
        }
        let future = self.controller.future_alloc();
        let code = self.controller.save_trimmed_trace(t_start_ns, t_end_ns, path, future);
        if !code.is_success() {
            return false;
        }
        let request_time = self.tick();
        self.requests.insert(
            request_id,
            InFlightRequest {
                future,
                request_type: RequestType::SaveTrimmedTrace,
                request_time,
                target: RequestTarget::None,
            },
        );
        true
    }

    /// Issues an export-to-file request for `kind` (spec §4.3.3/§4.2.6):
    /// re-runs the table's current query with paging cleared and
    /// `args.output_path` set, so the backend materialises a CSV instead of
    /// returning a window. Returns `false` if an export for this kind is
    /// already in flight.
    pub fn export_table(&mut self, table: Handle, kind: TableKind, args: TableArgs) -> bool {
        if self.state != ProviderState::Ready {
            return false;
        }
        let request_id = singleton_request_id(RequestType::ExportTable) | ((kind as u64) << 8);
        if self.requests.contains_key(&request_id) {
            return false;
        }
        let future = self.controller.future_alloc();
        let code = self.controller.table_fetch_async(table, args, future);
        if !code.is_success() {
            return false;
        }
        let request_time = self.tick();
        self.requests.insert(
            request_id,
            InFlightRequest {
                future,
                request_type: RequestType::ExportTable,
                request_time,
                target: RequestTarget::Table { kind, start_index: 0 },
            },
        );
        true
    }

    /// Non-blocking. Call once per frame: polls every in-flight request with
    /// `timeout = 0`, merges whatever has settled, and publishes the
    /// matching bus event.
    pub fn update(&mut self, bus: &mut EventBus) {
        let settled: Vec<u64> = self
            .requests
            .iter()
            .filter(|(_, req)| self.controller.future_wait(req.future, Duration::ZERO).is_success())
            .map(|(id, _)| *id)
            .collect();

        for request_id in settled {
            let Some(req) = self.requests.remove(&request_id) else { continue };
            let outcome = self.controller.take_outcome(req.future);
            self.controller.future_free(req.future);
            let Some((code, outcome)) = outcome else { continue };
            self.apply_outcome(req, code, outcome, bus);
        }
    }

    fn apply_outcome(&mut self, req: InFlightRequest, code: ResultCode, outcome: AsyncOutcome, bus: &mut EventBus) {
        let source_id = self.trace_path.clone();
        match (req.request_type, req.target, outcome) {
            (RequestType::LoadTrace, _, AsyncOutcome::Load(load)) => {
                if code.is_success() {
                    self.apply_load_outcome(load);
                    self.state = ProviderState::Ready;
                    bus.publish(BusEvent::TopologyChanged { source_id: source_id.clone() });
                    bus.publish(BusEvent::TraceLoaded { success: true, source_id });
                } else {
                    self.state = ProviderState::Error(format!("{code:?}"));
                    bus.publish(BusEvent::TraceLoaded { success: false, source_id });
                }
            }
            (RequestType::FetchTrack, RequestTarget::Track { track_id, chunk_index, group_id }, AsyncOutcome::Track(TrackFetchOutcome::Events(events))) => {
                let applied = if let Some(RawTrackData::Event(data)) = self.tracks.get_mut(&track_id) {
                    data.merge_chunk(chunk_index, group_id, req.request_time, events)
                } else {
                    false
                };
                if applied {
                    bus.publish(BusEvent::NewTrackData { track_id, request_id: 0, success: code.is_success(), source_id });
                } else {
                    debug!(track_id, chunk_index, "dropped stale track chunk response");
                }
            }
            (RequestType::FetchGraph, RequestTarget::Graph { graph_id, chunk_index, group_id }, AsyncOutcome::Track(TrackFetchOutcome::Samples(samples))) => {
                let applied = if let Some(RawTrackData::Sample(data)) = self.graphs.get_mut(&graph_id) {
                    data.merge_chunk(chunk_index, group_id, req.request_time, samples)
                } else {
                    false
                };
                if applied {
                    bus.publish(BusEvent::NewTrackData { track_id: graph_id, request_id: 0, success: code.is_success(), source_id });
                } else {
                    debug!(graph_id, chunk_index, "dropped stale graph sample chunk response");
                }
            }
            (RequestType::FetchGraph, RequestTarget::Graph { graph_id, chunk_index, group_id }, AsyncOutcome::Track(TrackFetchOutcome::Events(events))) => {
                let applied = if let Some(RawTrackData::Event(data)) = self.graphs.get_mut(&graph_id) {
                    data.merge_chunk(chunk_index, group_id, req.request_time, events)
                } else {
                    false
                };
                if applied {
                    bus.publish(BusEvent::NewTrackData { track_id: graph_id, request_id: 0, success: code.is_success(), source_id });
                } else {
                    debug!(graph_id, chunk_index, "dropped stale graph event chunk response");
                }
            }
            (RequestType::FetchTable, RequestTarget::Table { kind, start_index }, AsyncOutcome::Table(table_outcome)) => {
                let info = self.tables.entry(kind).or_insert_with(|| TableInfo::new(kind));
                let applied = info.pending.take().unwrap_or_default();
                info.apply_window(start_index, table_outcome.header, table_outcome.rows, table_outcome.total_rows, applied);
                bus.publish(BusEvent::NewTableData { table_kind: kind, request_id: 0, success: code.is_success(), source_id });
            }
            (RequestType::FetchEventExtData, RequestTarget::Event { event_id }, AsyncOutcome::Indexed(payload)) => {
                if let Some(detail) = self.event_details.get_mut(&event_id) {
                    detail.set_ext_data(parse_ext_data(payload.0));
                    self.maybe_publish_event_ready(event_id, bus);
                }
            }
            (RequestType::FetchEventFlowControl, RequestTarget::Event { event_id }, AsyncOutcome::Indexed(payload)) => {
                if let Some(detail) = self.event_details.get_mut(&event_id) {
                    detail.set_flow_control(parse_flow_control(payload.0));
                    self.maybe_publish_event_ready(event_id, bus);
                }
            }
            (RequestType::FetchEventCallStack, RequestTarget::Event { event_id }, AsyncOutcome::Indexed(payload)) => {
                if let Some(detail) = self.event_details.get_mut(&event_id) {
                    detail.set_call_stack(parse_call_stack(payload.0));
                    self.maybe_publish_event_ready(event_id, bus);
                }
            }
            (RequestType::SaveTrimmedTrace, _, AsyncOutcome::SaveTrimmedTrace) => {
                if !code.is_success() {
                    warn!(?code, "save_trimmed_trace failed");
                }
                bus.publish(BusEvent::SaveTrimmedTraceReady { success: code.is_success(), source_id });
            }
            (RequestType::ExportTable, RequestTarget::Table { kind, .. }, AsyncOutcome::Table(_)) => {
                if !code.is_success() {
                    warn!(?code, ?kind, "table export failed");
                }
                bus.publish(BusEvent::TableExportReady { table_kind: kind, success: code.is_success(), source_id });
            }
            (request_type, _, _) => {
                warn!(?request_type, ?code, "unexpected outcome shape for request");
            }
        }
    }

    /// Rebuilds `topology` and `track_meta` from a successful load (spec
    /// §4.2.1). Nodes whose topology binding resolved to
    /// [`crate::model::topology::NodeKind::Unknown`] are logged but still
    /// inserted — a track with no known binding is still a track.
    fn apply_load_outcome(&mut self, load: LoadOutcome) {
        self.topology = Topology::new();
        self.track_meta.clear();
        self.timeline_min_ts = load.min_timestamp;
        self.timeline_max_ts = load.max_timestamp;
        for node in load.nodes {
            if node.kind == crate::model::topology::NodeKind::Unknown {
                warn!(node_id = node.id, "topology node has unknown binding");
            }
            self.topology.insert(Node {
                id: node.id,
                kind: node.kind,
                name: node.name,
                parent: node.parent,
                children: Vec::new(),
                track_id: node.track_id,
            });
        }
        for track in load.tracks {
            self.track_meta.insert(
                track.id,
                TrackInfo {
                    index: track.index,
                    id: track.id,
                    track_type: track.track_type,
                    name: track.name,
                    min_ts: track.min_ts,
                    max_ts: track.max_ts,
                    num_entries: track.num_entries,
                    min_value: track.min_value,
                    max_value: track.max_value,
                    topology_node: track.topology_node,
                },
            );
        }
    }

    fn maybe_publish_event_ready(&self, event_id: u64, bus: &mut EventBus) {
        if let Some(detail) = self.event_details.get(&event_id) {
            if detail.is_fully_loaded() {
                bus.publish(BusEvent::EventDetailReady { event_id, flow_control: detail.flow_control.clone(), source_id: self.trace_path.clone() });
            }
        }
    }

    /// Cancels and waits out every in-flight request, then frees their
    /// futures. The only place this provider blocks — intended for trace
    /// teardown / tab close (spec §5 "cancellation is not instantaneous").
    pub fn cancel_all(&mut self) {
        for (_, req) in self.requests.drain() {
            self.controller.future_cancel(req.future);
            self.controller.future_wait(req.future, Duration::from_secs(u64::MAX / 2));
            self.controller.future_free(req.future);
        }
    }

    /// Frees all prior state and returns to [`ProviderState::Init`] (spec
    /// §4.2 state diagram: `kReady -- CloseController --> kInit`). Every
    /// outstanding request is cancelled and drained first, so no callback
    /// fires for a trace that has since been closed.
    pub fn close_controller(&mut self) {
        self.cancel_all();
        self.state = ProviderState::Init;
        self.trace_path = None;
        self.topology = Topology::new();
        self.tracks.clear();
        self.graphs.clear();
        self.track_meta.clear();
        self.event_details.clear();
        self.tables.clear();
        self.track_ranges.clear();
        self.graph_ranges.clear();
        self.timeline_min_ts = 0;
        self.timeline_max_ts = 0;
    }
}
