//! Raw per-track data accumulated across one or more chunked fetch responses.
//!
//! Chunk merge semantics follow the upstream profiler's
//! `CreateRawEventData`/`CreateRawSampleData` routines: a response belongs to a
//! "group" (`GroupId`, bumped whenever the requested time window changes);
//! responses from an older group are only dropped when the data already held
//! is *strictly* newer than the incoming response (`existing_time > response_time`),
//! never on a tie — see SPEC_FULL.md §3, §9.
//!
//! Within a group, points are deduplicated by id (events) or by timestamp
//! (samples) using a `HashSet`, replacing the manual "has this id been seen"
//! bookkeeping the C++ implementation does by hand (§9 "Replacing manual
//! memory for chunk dedup").

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupId(pub u8);

/// Whether a [`TrackInfo`]'s points are duration-bearing spans or
/// instantaneous scalar samples (spec §3 "Raw track data").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Events,
    Samples,
}

/// Per-track summary metadata built while walking a timeline's graphs during
/// load (spec §4.2.1): everything the sidebar/track list needs without
/// fetching any points.
#[derive(Debug, Clone)]
pub struct TrackInfo {
    pub index: u32,
    pub id: u64,
    pub track_type: TrackKind,
    pub name: String,
    pub min_ts: u64,
    pub max_ts: u64,
    pub num_entries: u64,
    pub min_value: f64,
    pub max_value: f64,
    /// The topology node (queue/stream/thread/counter) this track is bound
    /// to, if its topology binding resolved to a known kind.
    pub topology_node: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    pub id: u64,
    pub start_ns: u64,
    pub duration_ns: u64,
    pub level: u32,
    pub name: String,
    pub child_count: u32,
    /// Set when several adjacent same-name events were collapsed for display
    /// at the current zoom level.
    pub combined_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceSample {
    pub start_ns: u64,
    pub value: f64,
}

/// Accumulated event-kind track data (spans with a duration and a name).
#[derive(Debug, Default)]
pub struct RawEventTrackData {
    pub track_id: u64,
    group_id: GroupId,
    request_time: u64,
    events: Vec<TraceEvent>,
    seen_ids: HashSet<u64>,
    chunks_received: HashSet<u64>,
    chunks_expected: Option<u64>,
}

/// Accumulated sample-kind track data (instantaneous scalar values, e.g. a
/// counter graph).
#[derive(Debug, Default)]
pub struct RawSampleTrackData {
    pub track_id: u64,
    group_id: GroupId,
    request_time: u64,
    samples: Vec<TraceSample>,
    seen_timestamps: HashSet<u64>,
    chunks_received: HashSet<u64>,
    chunks_expected: Option<u64>,
}

macro_rules! impl_merge {
    ($ty:ty, $point:ty, $points_field:ident, $seen_field:ident, $key:expr) => {
        impl $ty {
            pub fn new(track_id: u64) -> Self {
                Self {
                    track_id,
                    ..Default::default()
                }
            }

            /// Merges one chunk response. Returns `false` if the response was
            /// stale and dropped without being applied.
            pub fn merge_chunk(
                &mut self,
                chunk_index: u64,
                group_id: GroupId,
                request_time: u64,
                points: Vec<$point>,
            ) -> bool {
                if group_id != self.group_id {
                    if self.request_time > request_time {
                        return false;
                    }
                    self.$points_field.clear();
                    self.$seen_field.clear();
                    self.chunks_received.clear();
                    self.group_id = group_id;
                    self.request_time = request_time;
                }
                for point in points {
                    let key = $key(&point);
                    if self.$seen_field.insert(key) {
                        self.$points_field.push(point);
                    }
                }
                self.chunks_received.insert(chunk_index);
                true
            }

            pub fn set_expected_chunks(&mut self, count: u64) {
                self.chunks_expected = Some(count);
            }

            pub fn all_data_ready(&self) -> bool {
                match self.chunks_expected {
                    Some(n) => self.chunks_received.len() as u64 >= n,
                    None => false,
                }
            }

            pub fn points(&self) -> &[$point] {
                &self.$points_field
            }

            pub fn group_id(&self) -> GroupId {
                self.group_id
            }
        }
    };
}

impl_merge!(RawEventTrackData, TraceEvent, events, seen_ids, |e: &TraceEvent| e.id);
impl_merge!(
    RawSampleTrackData,
    TraceSample,
    samples,
    seen_timestamps,
    |s: &TraceSample| s.start_ns
);

#[derive(Debug)]
pub enum RawTrackData {
    Event(RawEventTrackData),
    Sample(RawSampleTrackData),
}

impl RawTrackData {
    pub fn track_id(&self) -> u64 {
        match self {
            RawTrackData::Event(e) => e.track_id,
            RawTrackData::Sample(s) => s.track_id,
        }
    }

    pub fn set_expected_chunks(&mut self, count: u64) {
        match self {
            RawTrackData::Event(e) => e.set_expected_chunks(count),
            RawTrackData::Sample(s) => s.set_expected_chunks(count),
        }
    }

    pub fn all_data_ready(&self) -> bool {
        match self {
            RawTrackData::Event(e) => e.all_data_ready(),
            RawTrackData::Sample(s) => s.all_data_ready(),
        }
    }

    pub fn as_event(&self) -> Option<&RawEventTrackData> {
        match self {
            RawTrackData::Event(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_sample(&self) -> Option<&RawSampleTrackData> {
        match self {
            RawTrackData::Sample(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: u64, start_ns: u64) -> TraceEvent {
        TraceEvent {
            id,
            start_ns,
            duration_ns: 10,
            level: 0,
            name: "e".to_string(),
            child_count: 0,
            combined_name: None,
        }
    }

    #[test]
    fn duplicate_ids_within_a_group_are_not_duplicated() {
        let mut data = RawEventTrackData::new(1);
        data.merge_chunk(0, GroupId(1), 100, vec![event(5, 0), event(5, 0)]);
        assert_eq!(data.points().len(), 1);
    }

    #[test]
    fn stale_group_is_dropped_only_when_existing_is_strictly_newer() {
        let mut data = RawEventTrackData::new(1);
        data.merge_chunk(0, GroupId(1), 100, vec![event(1, 0)]);
        // Existing request_time (100) is strictly newer than 50: dropped.
        assert!(!data.merge_chunk(0, GroupId(2), 50, vec![event(2, 0)]));
        assert_eq!(data.points().len(), 1);
        // A tie (100 == 100) is NOT dropped.
        assert!(data.merge_chunk(0, GroupId(3), 100, vec![event(3, 0)]));
        assert_eq!(data.points().len(), 1);
        assert_eq!(data.points()[0].id, 3);
    }

    #[test]
    fn newer_group_replaces_prior_data() {
        let mut data = RawEventTrackData::new(1);
        data.merge_chunk(0, GroupId(1), 100, vec![event(1, 0)]);
        assert!(data.merge_chunk(0, GroupId(2), 200, vec![event(2, 0)]));
        assert_eq!(data.points().len(), 1);
        assert_eq!(data.points()[0].id, 2);
    }

    #[test]
    fn all_data_ready_tracks_expected_chunk_count() {
        let mut data = RawEventTrackData::new(1);
        data.set_expected_chunks(2);
        assert!(!data.all_data_ready());
        data.merge_chunk(0, GroupId(1), 1, vec![]);
        assert!(!data.all_data_ready());
        data.merge_chunk(1, GroupId(1), 1, vec![]);
        assert!(data.all_data_ready());
    }
}
