//! The Controller bridge: a thin, typed façade over a C-shaped handle API.
//!
//! Every operation is synchronous and re-entrant safe from the driver thread (spec
//! §4.1, §5). Asynchronous work happens on the implementation's own worker threads;
//! the [`Controller`] trait only ever exposes that work through a [`FutureHandle`]
//! that the caller polls with [`Controller::future_wait`].
//!
//! Authoring a real controller backend (one that actually opens a trace database) is
//! an explicit Non-goal of this crate — see spec §1. [`mock::MockController`] is the
//! one concrete implementation shipped here, playing the same role
//! `storage::MemoryBackend` plays against `storage::StorageBackend` in the sibling
//! causality-tracing tool this crate's architecture is grounded on: a deterministic
//! stand-in the provider and table engine can be driven and tested against.

pub mod mock;

use crate::handle::{Handle, Property, ResultCode, Value};
use crate::model::topology::NodeKind;
use crate::model::track::TrackKind;
use std::time::Duration;

/// A handle representing a pending asynchronous operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FutureHandle(pub Handle);

/// A handle representing a variable-length homogeneous sequence of entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayHandle(pub Handle);

/// Parameters for a table fetch (`table_fetch_async`), spec §4.2.4 / §6.2 `TableArgs`.
///
/// Modeled as a concrete struct rather than a generic property-tag bag: its field set
/// is fully enumerated by spec §6.2, so there is nothing a generic `Arguments` handle
/// would buy here except an extra layer of indirection (see DESIGN.md).
#[derive(Debug, Clone, Default)]
pub struct TableArgs {
    pub table_kind: TableKind,
    pub start_ts: Option<u64>,
    pub end_ts: Option<u64>,
    pub sort_column: Option<u32>,
    pub sort_order: Option<SortOrder>,
    pub filter: Option<String>,
    pub r#where: Option<String>,
    pub group: Option<String>,
    pub group_columns: Vec<String>,
    pub start_index: Option<u64>,
    pub start_count: Option<u64>,
    pub operation_types: Option<u64>,
    pub track_handles: Vec<Handle>,
    pub string_table_filters: Vec<String>,
    pub output_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Which cached table a request targets — one singleton request id per kind
/// (spec §4.2.4: "one per table type").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TableKind {
    #[default]
    Event,
    Sample,
    EventSearch,
    SummaryKernel,
}

/// A single row returned by a table fetch: ordered string cells matching the
/// table's header.
#[derive(Debug, Clone, Default)]
pub struct TableRow(pub Vec<String>);

/// Result of a table fetch: the rows in the requested window plus the backend's
/// total row count (for scrollbar sizing, spec §4.3.1).
#[derive(Debug, Clone, Default)]
pub struct TableFetchOutcome {
    pub header: Vec<String>,
    pub rows: Vec<TableRow>,
    pub total_rows: u64,
}

/// Result of `track_fetch_async` / `graph_fetch_async`: a homogeneous array of
/// either event or sample points, spec §3 "Raw track data".
#[derive(Debug, Clone)]
pub enum TrackFetchOutcome {
    Events(Vec<RawEventPoint>),
    Samples(Vec<RawSamplePoint>),
}

#[derive(Debug, Clone)]
pub struct RawEventPoint {
    pub id: u64,
    pub start_ns: u64,
    pub duration_ns: u64,
    pub level: u32,
    pub name: String,
    pub child_count: u32,
    pub combined_name: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct RawSamplePoint {
    pub start_ns: u64,
    pub value: f64,
}

/// Result of `get_indexed_property_async`: one homogeneous array of typed values.
#[derive(Debug, Clone)]
pub struct IndexedFetchOutcome(pub Vec<Value>);

/// One node of the topology walked during load (spec §4.2.1): nodes,
/// processors, processes, and their instrumented/sampled threads, queues,
/// streams, and counters.
#[derive(Debug, Clone)]
pub struct TopologyNodeSnapshot {
    pub id: u64,
    pub kind: NodeKind,
    pub name: String,
    pub parent: Option<u64>,
    pub track_id: Option<u64>,
}

/// One graph walked during load, generalized to `TrackInfo` by the provider
/// (spec §4.2.1 "walk each graph to build `TrackInfo`").
#[derive(Debug, Clone)]
pub struct TrackSnapshot {
    pub index: u32,
    pub id: u64,
    pub track_type: TrackKind,
    pub name: String,
    pub min_ts: u64,
    pub max_ts: u64,
    pub num_entries: u64,
    pub min_value: f64,
    pub max_value: f64,
    pub topology_node: Option<u64>,
}

/// Everything `load_async` resolves to once its future reports success: the
/// timeline's overall range plus the full topology and track-metadata walk
/// (spec §4.2.1). Carried directly in the outcome rather than re-derived
/// from a sequence of individual property reads, since this port already
/// models every other async outcome (track fetch, table fetch, ...) as
/// structured data rather than a handle the caller must separately walk.
#[derive(Debug, Clone, Default)]
pub struct LoadOutcome {
    pub min_timestamp: u64,
    pub max_timestamp: u64,
    pub nodes: Vec<TopologyNodeSnapshot>,
    pub tracks: Vec<TrackSnapshot>,
}

/// The outcome of an asynchronous operation, read once `future_wait` reports
/// `Success` (or a terminal error).
#[derive(Debug, Clone)]
pub enum AsyncOutcome {
    Load(LoadOutcome),
    Track(TrackFetchOutcome),
    Indexed(IndexedFetchOutcome),
    Table(TableFetchOutcome),
    SaveTrimmedTrace,
}

/// The typed façade the Data Provider drives. See module docs and spec §4.1/§6.1.
pub trait Controller: Send + Sync {
    /// Begin loading a trace. Returns a future the caller polls for completion.
    fn load_async(&self, path: &str) -> (ResultCode, Option<FutureHandle>);

    fn get_uint64(&self, handle: Handle, prop: Property, index: u64) -> Result<u64, ResultCode>;
    fn get_double(&self, handle: Handle, prop: Property, index: u64) -> Result<f64, ResultCode>;
    fn get_string(&self, handle: Handle, prop: Property, index: u64) -> Result<String, ResultCode>;
    fn get_object(&self, handle: Handle, prop: Property, index: u64) -> Result<Handle, ResultCode>;

    fn set_uint64(&self, handle: Handle, prop: Property, index: u64, value: u64) -> ResultCode;
    fn set_double(&self, handle: Handle, prop: Property, index: u64, value: f64) -> ResultCode;
    fn set_string(&self, handle: Handle, prop: Property, index: u64, value: &str) -> ResultCode;
    fn set_object(&self, handle: Handle, prop: Property, index: u64, value: Handle) -> ResultCode;

    fn array_alloc(&self, initial_capacity: u64) -> ArrayHandle;
    fn array_free(&self, array: ArrayHandle);
    fn array_num_entries(&self, array: ArrayHandle) -> u64;
    /// Out-of-range (`index >= num_entries`) always returns `Err(ResultCode::InvalidParameter)`
    /// (spec §3 invariant: "never undefined data").
    fn array_entry(&self, array: ArrayHandle, index: u64) -> Result<Value, ResultCode>;

    fn future_alloc(&self) -> FutureHandle;
    fn future_free(&self, future: FutureHandle);
    /// Non-blocking when `timeout` is zero. Returns `Success` once the operation
    /// completed (successfully or not — the *data-level* outcome is read separately
    /// via [`Controller::take_outcome`]), `Timeout` while still pending.
    fn future_wait(&self, future: FutureHandle, timeout: Duration) -> ResultCode;
    /// Best-effort, non-blocking. Callers must still `future_wait` before freeing.
    fn future_cancel(&self, future: FutureHandle) -> ResultCode;
    /// Consumes and returns the resolved outcome of a future that `future_wait`
    /// reported as finished. Returns `None` if called before completion or twice.
    fn take_outcome(&self, future: FutureHandle) -> Option<(ResultCode, AsyncOutcome)>;

    fn get_indexed_property_async(
        &self,
        host: Handle,
        target: Handle,
        prop: Property,
        index: u64,
        count: u64,
        future: FutureHandle,
    ) -> ResultCode;

    fn track_fetch_async(
        &self,
        track: Handle,
        t_start_ns: u64,
        t_end_ns: u64,
        future: FutureHandle,
    ) -> ResultCode;

    fn graph_fetch_async(
        &self,
        graph: Handle,
        t_start_ns: u64,
        t_end_ns: u64,
        horz_pixels: u32,
        future: FutureHandle,
    ) -> ResultCode;

    fn table_fetch_async(&self, table: Handle, args: TableArgs, future: FutureHandle) -> ResultCode;

    fn save_trimmed_trace(
        &self,
        t_start_ns: u64,
        t_end_ns: u64,
        path: &str,
        future: FutureHandle,
    ) -> ResultCode;
}
