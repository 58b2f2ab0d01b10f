//! A typed, synchronous publish/subscribe bus connecting the Data Provider
//! and Table engine to their UI subscribers (spec §4.4).
//!
//! Dispatch is FIFO, per-call (there is no background thread: a publisher
//! drains straight into whichever handlers are subscribed at the moment of
//! the call), and a handler can stop further propagation of the event it is
//! currently handling by returning [`Propagation::Stop`] — mirroring
//! `RocEvent::SetAllowPropagate`/`StopPropagation` in the upstream event
//! types.

use crate::model::event_detail::FlowControlEntry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Closed set of events the core publishes. One variant per `RocEvents`
/// member this port carries forward (UI-only events — minimap drag, sidebar
/// resize — are out of scope; see SPEC_FULL.md Non-goals).
///
/// Every variant carries `source_id`, mirroring `RocEvent::GetSourceId`
/// upstream: commonly the trace file path a [`crate::provider::DataProvider`]
/// is currently bound to, so a subscriber that has since moved on to a
/// different trace can tell a late-arriving event apart from a current one
/// (spec §4.4, §4.2.7). Events with no natural trace binding (client-side
/// navigation, UI chrome) just carry `None`.
#[derive(Debug, Clone)]
pub enum BusEvent {
    NewTrackData { track_id: u64, request_id: u64, success: bool, source_id: Option<String> },
    NewTableData { table_kind: crate::controller::TableKind, request_id: u64, success: bool, source_id: Option<String> },
    TabClosed { tab_id: u64, source_id: Option<String> },
    TabSelected { tab_id: u64, source_id: Option<String> },
    TrackSelectionChanged { track_ids: Vec<u64>, source_id: Option<String> },
    EventSelectionChanged { event_id: u64, is_batch: bool, source_id: Option<String> },
    ScrollToTrack { track_id: u64, source_id: Option<String> },
    RangeChanged { start_ns: u64, end_ns: u64, source_id: Option<String> },
    FontSizeChanged { size_px: u32, source_id: Option<String> },
    TimeFormatChanged { source_id: Option<String> },
    TopologyChanged { source_id: Option<String> },
    StickyNoteEdited { event_id: u64, text: String, source_id: Option<String> },
    Navigation { v_min: f64, v_max: f64, y_position: f64, center: f64, source_id: Option<String> },
    ComputeTableSearch { query: String, source_id: Option<String> },
    EventDetailReady { event_id: u64, flow_control: Vec<FlowControlEntry>, source_id: Option<String> },
    /// Fan-out for the provider's `trace_loaded(path, result_code)` callback
    /// slot (spec §4.2.1, §4.2.7): a load either completed or failed. Unlike
    /// `TopologyChanged`, this fires exactly once per `fetch_trace` call,
    /// success or not, so a subscriber can tell "the load I asked for is
    /// done" apart from any other topology refresh.
    TraceLoaded { success: bool, source_id: Option<String> },
    /// Fan-out for the provider's `save_trace(success)` callback slot (spec
    /// §4.2.7): a trim-save either completed or failed.
    SaveTrimmedTraceReady { success: bool, source_id: Option<String> },
    /// Fan-out for the provider's `export_table(path, success)` callback
    /// slot (spec §4.2.7).
    TableExportReady { table_kind: crate::controller::TableKind, success: bool, source_id: Option<String> },
}

/// Discriminant of [`BusEvent`], used as the subscription key so a handler
/// can subscribe to a kind without constructing a dummy payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    NewTrackData,
    NewTableData,
    TabClosed,
    TabSelected,
    TrackSelectionChanged,
    EventSelectionChanged,
    ScrollToTrack,
    RangeChanged,
    FontSizeChanged,
    TimeFormatChanged,
    TopologyChanged,
    StickyNoteEdited,
    Navigation,
    ComputeTableSearch,
    EventDetailReady,
    TraceLoaded,
    SaveTrimmedTraceReady,
    TableExportReady,
}

impl BusEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            BusEvent::NewTrackData { .. } => EventKind::NewTrackData,
            BusEvent::NewTableData { .. } => EventKind::NewTableData,
            BusEvent::TabClosed { .. } => EventKind::TabClosed,
            BusEvent::TabSelected { .. } => EventKind::TabSelected,
            BusEvent::TrackSelectionChanged { .. } => EventKind::TrackSelectionChanged,
            BusEvent::EventSelectionChanged { .. } => EventKind::EventSelectionChanged,
            BusEvent::ScrollToTrack { .. } => EventKind::ScrollToTrack,
            BusEvent::RangeChanged { .. } => EventKind::RangeChanged,
            BusEvent::FontSizeChanged { .. } => EventKind::FontSizeChanged,
            BusEvent::TimeFormatChanged { .. } => EventKind::TimeFormatChanged,
            BusEvent::TopologyChanged { .. } => EventKind::TopologyChanged,
            BusEvent::StickyNoteEdited { .. } => EventKind::StickyNoteEdited,
            BusEvent::Navigation { .. } => EventKind::Navigation,
            BusEvent::ComputeTableSearch { .. } => EventKind::ComputeTableSearch,
            BusEvent::EventDetailReady { .. } => EventKind::EventDetailReady,
            BusEvent::TraceLoaded { .. } => EventKind::TraceLoaded,
            BusEvent::SaveTrimmedTraceReady { .. } => EventKind::SaveTrimmedTraceReady,
            BusEvent::TableExportReady { .. } => EventKind::TableExportReady,
        }
    }
}

/// What a handler returns to control propagation to later-registered handlers
/// of the same event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Continue,
    Stop,
}

/// An opaque subscription handle; drop it into [`EventBus::unsubscribe`] to
/// remove the handler in O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

type Handler = Box<dyn FnMut(&BusEvent) -> Propagation + Send>;

struct Subscription {
    token: Token,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: HashMap<EventKind, Vec<Subscription>>,
    next_token: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` to every event of `kind`, in registration order.
    pub fn subscribe(&mut self, kind: EventKind, handler: impl FnMut(&BusEvent) -> Propagation + Send + 'static) -> Token {
        let token = Token(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.subscribers.entry(kind).or_default().push(Subscription {
            token,
            handler: Box::new(handler),
        });
        token
    }

    /// Removes a subscription. A stale or already-removed token is a no-op.
    pub fn unsubscribe(&mut self, token: Token) {
        for subs in self.subscribers.values_mut() {
            if let Some(pos) = subs.iter().position(|s| s.token == token) {
                subs.remove(pos);
                return;
            }
        }
    }

    /// Dispatches `event` to every subscriber of its kind, in registration
    /// order, stopping early if a handler returns [`Propagation::Stop`].
    pub fn publish(&mut self, event: BusEvent) {
        let kind = event.kind();
        let Some(subs) = self.subscribers.get_mut(&kind) else {
            return;
        };
        for sub in subs.iter_mut() {
            if (sub.handler)(&event) == Propagation::Stop {
                break;
            }
        }
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.get(&kind).map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn handlers_fire_in_registration_order() {
        let mut bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let a = Arc::clone(&order);
        bus.subscribe(EventKind::TabClosed, move |_| {
            a.lock().unwrap().push(1);
            Propagation::Continue
        });
        let b = Arc::clone(&order);
        bus.subscribe(EventKind::TabClosed, move |_| {
            b.lock().unwrap().push(2);
            Propagation::Continue
        });
        bus.publish(BusEvent::TabClosed { tab_id: 7, source_id: None });
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn stop_propagation_prevents_later_handlers() {
        let mut bus = EventBus::new();
        let fired = Arc::new(Mutex::new(false));
        bus.subscribe(EventKind::TabClosed, |_| Propagation::Stop);
        let f = Arc::clone(&fired);
        bus.subscribe(EventKind::TabClosed, move |_| {
            *f.lock().unwrap() = true;
            Propagation::Continue
        });
        bus.publish(BusEvent::TabClosed { tab_id: 1, source_id: None });
        assert!(!*fired.lock().unwrap());
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let mut bus = EventBus::new();
        let token = bus.subscribe(EventKind::TopologyChanged, |_| Propagation::Continue);
        assert_eq!(bus.subscriber_count(EventKind::TopologyChanged), 1);
        bus.unsubscribe(token);
        assert_eq!(bus.subscriber_count(EventKind::TopologyChanged), 0);
    }

    #[test]
    fn events_with_no_subscribers_are_a_no_op() {
        let mut bus = EventBus::new();
        bus.publish(BusEvent::TimeFormatChanged { source_id: None });
    }
}
