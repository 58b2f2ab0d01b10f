//! End-to-end scenarios against the bundled `MockController`, covering the
//! provider/table-engine contract the way a real ImGui frontend would drive
//! it: load, chunked track fetch, table pagination, sort changes, and
//! teardown-during-load. These mirror the seeds in SPEC_FULL.md §8.

use chronoscope_core::controller::mock::{MockController, SyntheticTrace};
use chronoscope_core::controller::{TableArgs, TableKind};
use chronoscope_core::handle::{Handle, HandleKind};
use chronoscope_core::provider::ProviderState;
use chronoscope_core::table::TableView;
use chronoscope_core::{DataProvider, EventBus};
use std::sync::Arc;
use std::time::Duration;

fn drive(provider: &mut DataProvider, bus: &mut EventBus, ticks: usize) {
    for _ in 0..ticks {
        provider.update(bus);
    }
}

#[test]
fn loading_a_trace_populates_topology_and_becomes_ready() {
    let mut provider = DataProvider::new(Arc::new(MockController::new(SyntheticTrace::default(), Duration::ZERO)));
    let mut bus = EventBus::new();
    assert!(provider.fetch_trace("demo.trace"));
    drive(&mut provider, &mut bus, 5);
    assert_eq!(provider.state(), &ProviderState::Ready);
    assert!(provider.topology().len() > 0);
    assert_eq!(provider.track_infos().count(), 2);
    let (min_ts, max_ts) = provider.timeline_range();
    assert!(max_ts >= min_ts);
}

#[test]
fn single_track_chunked_fetch_is_fully_resident_once_all_chunks_arrive() {
    let mut provider = DataProvider::new(Arc::new(MockController::new(SyntheticTrace::default(), Duration::ZERO)));
    let mut bus = EventBus::new();
    provider.fetch_trace("demo.trace");
    drive(&mut provider, &mut bus, 5);

    let track = Handle::new(1, HandleKind::Track);
    assert!(provider.fetch_track(track, 0, 64_000));
    drive(&mut provider, &mut bus, 50);
    let data = provider.track(1).expect("track data cached");
    assert!(data.all_data_ready());
    assert!(!data.as_event().unwrap().points().is_empty());
}

#[test]
fn table_pagination_scrolls_forward_without_duplicating_rows() {
    let mut provider = DataProvider::new(Arc::new(MockController::new(SyntheticTrace::default(), Duration::ZERO)));
    let mut bus = EventBus::new();
    provider.fetch_trace("demo.trace");
    drive(&mut provider, &mut bus, 5);

    let mut view = TableView::new(TableKind::Event);
    view.visible_rows = 10;
    let table = Handle::new(1, HandleKind::Table);
    let (start, count) = view.request_window();
    assert!(provider.fetch_table(table, TableKind::Event, TableArgs { start_index: Some(start), start_count: Some(count), ..Default::default() }));
    drive(&mut provider, &mut bus, 10);

    let info = provider.table(TableKind::Event).expect("table cached");
    assert_eq!(info.window_start, 0);
    assert!(!info.rows.is_empty());

    view.scroll_to(20);
    assert!(!view.needs_refetch(info), "row 20 sits comfortably inside the cached window");
}

#[test]
fn fetch_trace_rejected_while_loading_leaves_state_unchanged() {
    let mut provider = DataProvider::new(Arc::new(MockController::new(SyntheticTrace::default(), Duration::from_millis(20))));
    assert!(provider.fetch_trace("a.trace"));
    assert_eq!(provider.state(), &ProviderState::Loading);
    assert!(!provider.fetch_trace("b.trace"));
    assert_eq!(provider.state(), &ProviderState::Loading);
}

#[test]
fn cancellation_during_close_leaves_no_stuck_requests() {
    // Reach kReady first — only kReady accepts a table fetch (spec §4.2) —
    // then close immediately after issuing one, before any `update()` tick
    // could have let it settle: spec §8 scenario 5, "while a table request
    // is in flight, CloseController is called".
    let mut provider = DataProvider::new(Arc::new(MockController::new(SyntheticTrace::default(), Duration::ZERO)));
    let mut bus = EventBus::new();
    provider.fetch_trace("demo.trace");
    drive(&mut provider, &mut bus, 5);
    assert_eq!(provider.state(), &ProviderState::Ready);

    let table = Handle::new(1, HandleKind::Table);
    provider.fetch_table(table, TableKind::Event, TableArgs::default());
    provider.close_controller();
    assert_eq!(provider.state(), &ProviderState::Init);
    // No further callback fires for the closed trace: re-driving update()
    // with nothing in flight is a no-op, not a late completion.
    drive(&mut provider, &mut bus, 3);
    assert!(provider.table(TableKind::Event).is_none());
}

#[test]
fn event_detail_fans_out_three_requests_and_merges_on_completion() {
    let mut provider = DataProvider::new(Arc::new(MockController::new(SyntheticTrace::default(), Duration::ZERO)));
    let mut bus = EventBus::new();
    provider.fetch_trace("demo.trace");
    drive(&mut provider, &mut bus, 5);

    let track = Handle::new(1, HandleKind::Track);
    provider.fetch_track(track, 0, 64_000);
    drive(&mut provider, &mut bus, 50);

    let host = Handle::new(1, HandleKind::Controller);
    provider.fetch_event(1_000_000, host, 1);
    drive(&mut provider, &mut bus, 50);

    let detail = provider.event_detail(1_000_000).expect("event detail present");
    assert!(detail.is_fully_loaded());
    assert!(detail.basic_info.is_some());
    assert!(!detail.ext_data.is_empty(), "ext_data must actually be fetched and parsed, not left empty");
    assert!(!detail.flow_control.is_empty(), "flow_control must actually be fetched and parsed, not left empty");
    assert!(!detail.call_stack.is_empty(), "call_stack must actually be fetched and parsed, not left empty");
    assert_eq!(detail.call_stack[0].symbol, "main");
}

#[test]
fn event_detail_fetch_is_a_singleton_per_section_not_per_event() {
    // A second event's detail fetch issued while the first's ext-data/
    // flow-control/call-stack requests are still in flight must not mint its
    // own set of requests — it collides with the still-open singleton slot
    // and waits its turn (spec §4.2.2, confirmed against the upstream
    // `MakeRequestId` per-request-type counter).
    let mut provider = DataProvider::new(Arc::new(MockController::new(SyntheticTrace::default(), Duration::from_millis(20))));
    let mut bus = EventBus::new();
    provider.fetch_trace("demo.trace");
    drive(&mut provider, &mut bus, 5);

    let track = Handle::new(1, HandleKind::Track);
    provider.fetch_track(track, 0, 64_000);
    drive(&mut provider, &mut bus, 50);

    let host = Handle::new(1, HandleKind::Controller);
    provider.fetch_event(1_000_000, host, 1);
    provider.fetch_event(1_000_001, host, 1);
    drive(&mut provider, &mut bus, 50);

    let first = provider.event_detail(1_000_000).expect("first event detail present");
    assert!(first.is_fully_loaded());
    let second_before = provider.event_detail(1_000_001).expect("basic_info is filled in synchronously regardless of the in-flight sections");
    assert!(!second_before.is_fully_loaded(), "second event's detail sections never got a turn while the first was in flight");

    provider.fetch_event(1_000_001, host, 1);
    drive(&mut provider, &mut bus, 50);
    let second = provider.event_detail(1_000_001).expect("second event detail present once the slot freed up");
    assert!(second.is_fully_loaded());
}
