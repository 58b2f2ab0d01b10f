//! The infinite-scroll table engine: server-paginated, sortable, filterable
//! and groupable (spec §4.3). Owns the scroll-driven fetch-window math; the
//! actual fetch is issued through [`crate::provider::DataProvider::fetch_table`].

use crate::bus::BusEvent;
use crate::controller::{SortOrder, TableKind};
use crate::model::table_info::{AppliedQuery, TableInfo};

/// Below this many unseen rows above/below the viewport, prefetch the next
/// window (spec §4.3.1).
pub const FETCH_THRESHOLD_ITEMS: u64 = 10;

const FETCH_PAD_MIN: u64 = 10;
const FETCH_PAD_MAX: u64 = 30;

const FETCH_CHUNK_SIZE_FLOOR: u64 = 1000;

/// How many extra rows to fetch beyond the viewport on each side, clamped to
/// `[10, 30]` and scaled with viewport size (half the visible row count).
pub fn fetch_pad_items(visible_rows: u64) -> u64 {
    (visible_rows / 2).clamp(FETCH_PAD_MIN, FETCH_PAD_MAX)
}

/// Total row span requested per fetch: four viewports plus threshold and pad,
/// floored at 1000 rows so small viewports still get a usefully large window
/// (spec §4.3.1).
pub fn fetch_chunk_size(visible_rows: u64) -> u64 {
    (visible_rows * 4 + FETCH_THRESHOLD_ITEMS + fetch_pad_items(visible_rows)).max(FETCH_CHUNK_SIZE_FLOOR)
}

/// Row offset, relative to the start of the cached window, at which an
/// upward scroll should trigger a prefetch of earlier rows.
pub fn upward_prefetch_offset(visible_rows: u64) -> u64 {
    let pad = fetch_pad_items(visible_rows);
    let chunk = fetch_chunk_size(visible_rows);
    chunk.saturating_sub(pad).saturating_sub(FETCH_THRESHOLD_ITEMS).saturating_sub(visible_rows)
}

/// Row offset at which a downward scroll should trigger a prefetch of later
/// rows.
pub fn downward_prefetch_offset(visible_rows: u64) -> u64 {
    fetch_pad_items(visible_rows) + FETCH_THRESHOLD_ITEMS
}

/// Whether the cached window around `first_visible_row` needs refilling
/// given the viewport size, per spec §4.3.1's threshold rule. `total_rows` is
/// the backend-reported total row count; once the cached window already
/// reaches it, no downward prefetch is issued no matter how close the
/// viewport sits to the cached edge (spec §8: "Downward prefetch when
/// `end_row == total_rows - 1` → no fetch issued").
pub fn needs_refetch(window_start: u64, total_rows_cached: u64, total_rows: u64, first_visible_row: u64, visible_rows: u64) -> bool {
    let rows_above = first_visible_row.saturating_sub(window_start);
    let last_visible = first_visible_row + visible_rows;
    let window_end = window_start + total_rows_cached;
    let rows_below = window_end.saturating_sub(last_visible);
    let needs_upward = rows_above < FETCH_THRESHOLD_ITEMS && window_start > 0;
    let needs_downward = rows_below < FETCH_THRESHOLD_ITEMS && window_end < total_rows;
    needs_upward || needs_downward
}

const ADAPTIVE_T1_NS: f64 = 10_000.0; // 10us
const ADAPTIVE_T2_NS: f64 = 5_000_000.0; // 5ms
const ADAPTIVE_PAD_SHORT: f64 = 9.0;
const ADAPTIVE_PAD_LONG: f64 = 1.0;
const ADAPTIVE_MIN_VISIBLE_NS: u64 = 100_000; // 100us

/// The padding fraction blended between `pad_short` (durations at or below
/// `T1`) and `pad_long` (durations at or above `T2`), per spec §4.3.4.
fn adaptive_pad_fraction(duration_ns: f64) -> f64 {
    if duration_ns < ADAPTIVE_T1_NS {
        ADAPTIVE_PAD_SHORT
    } else if duration_ns < ADAPTIVE_T2_NS {
        let t = (duration_ns - ADAPTIVE_T1_NS) / (ADAPTIVE_T2_NS - ADAPTIVE_T1_NS);
        ADAPTIVE_PAD_SHORT + (ADAPTIVE_PAD_LONG - ADAPTIVE_PAD_SHORT) * t
    } else {
        ADAPTIVE_PAD_LONG
    }
}

/// Computes the auto-zoomed view range `[start, end]` around an item of
/// duration `d` starting at `item_start_ns`, blending generous padding for
/// short items with modest padding for long ones (spec §4.3.4). `d` is
/// clamped to at least 1ns; the returned span is never below
/// `ADAPTIVE_MIN_VISIBLE_NS`.
pub fn adaptive_view_range(item_start_ns: u64, item_duration_ns: u64) -> (u64, u64) {
    let d = item_duration_ns.max(1) as f64;
    let pad = adaptive_pad_fraction(d);
    let span = (d * (1.0 + 2.0 * pad)).max(ADAPTIVE_MIN_VISIBLE_NS as f64);
    let center = item_start_ns as f64 + d / 2.0;
    let half = span / 2.0;
    let start = (center - half).max(0.0) as u64;
    let end = (center + half) as u64;
    (start, end)
}

/// Resolves the view-range/track-navigation targets for a selected table row
/// (spec §4.3.3): the row's "track id or stream id" column, then its
/// `start_ts`/`end_ts` columns. Returns `None` if any named column is
/// missing from the header or the cell doesn't parse as a `u64`.
pub fn resolve_row_navigation(info: &TableInfo, row: u64, track_column: &str, start_column: &str, end_column: &str) -> Option<(u64, u64, u64)> {
    let table_row = info.row_in_window(row)?;
    let col_index = |name: &str| info.header.iter().position(|h| h == name);
    let cell = |idx: usize| table_row.0.get(idx)?.parse::<u64>().ok();
    let track_id = cell(col_index(track_column)?)?;
    let start_ns = cell(col_index(start_column)?)?;
    let end_ns = cell(col_index(end_column)?)?;
    Some((track_id, start_ns, end_ns))
}

/// One table's live view: viewport size plus the query the user has
/// (possibly) edited but not yet applied.
pub struct TableView {
    pub kind: TableKind,
    pub visible_rows: u64,
    pub first_visible_row: u64,
    selected_rows: Vec<u64>,
}

impl TableView {
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            visible_rows: 50,
            first_visible_row: 0,
            selected_rows: Vec::new(),
        }
    }

    pub fn scroll_to(&mut self, first_visible_row: u64) {
        self.first_visible_row = first_visible_row;
    }

    pub fn select_row(&mut self, row: u64, extend: bool) {
        if !extend {
            self.selected_rows.clear();
        }
        if !self.selected_rows.contains(&row) {
            self.selected_rows.push(row);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selected_rows.clear();
    }

    pub fn selected_rows(&self) -> &[u64] {
        &self.selected_rows
    }

    /// Whether `info`'s cached window needs refilling given the current
    /// scroll position.
    pub fn needs_refetch(&self, info: &TableInfo) -> bool {
        needs_refetch(info.window_start, info.rows.len() as u64, info.total_rows, self.first_visible_row, self.visible_rows)
    }

    /// Builds the request window (`start_index`, `start_count`) for the next
    /// fetch, centered so the current viewport sits comfortably inside it.
    pub fn request_window(&self) -> (u64, u64) {
        let pad = fetch_pad_items(self.visible_rows);
        let start = self.first_visible_row.saturating_sub(pad);
        (start, fetch_chunk_size(self.visible_rows))
    }

    /// Resolves the most-recently-selected row's track and time-range
    /// columns, computes the adaptive view range around it, and returns the
    /// pair of bus events the widget should publish: "scroll to track" then
    /// "set view range" (spec §4.3.3).
    pub fn navigate_to_selected_row(&self, info: &TableInfo, track_column: &str, start_column: &str, end_column: &str) -> Option<[BusEvent; 2]> {
        let row = *self.selected_rows.last()?;
        let (track_id, start_ns, end_ns) = resolve_row_navigation(info, row, track_column, start_column, end_column)?;
        let duration_ns = end_ns.saturating_sub(start_ns);
        let (view_start, view_end) = adaptive_view_range(start_ns, duration_ns);
        Some([
            BusEvent::ScrollToTrack { track_id, source_id: None },
            BusEvent::RangeChanged { start_ns: view_start, end_ns: view_end, source_id: None },
        ])
    }

    /// Builds the `TableArgs` for an export-to-file request: the same
    /// applied query, paging cleared (both `start_index`/`start_count` left
    /// `None`, i.e. the spec's `INVALID_UINT64` sentinel) so the backend
    /// materialises every row, with `output_path` set so it writes a CSV
    /// instead of returning a window (spec §4.3.3).
    pub fn export_args(&self, applied: &AppliedQuery, output_path: impl Into<String>) -> crate::controller::TableArgs {
        crate::controller::TableArgs {
            table_kind: self.kind,
            sort_column: applied.sort_column,
            sort_order: applied.sort_order,
            filter: applied.filter.clone(),
            group: applied.group.clone(),
            start_index: None,
            start_count: None,
            output_path: Some(output_path.into()),
            ..Default::default()
        }
    }

    /// Renders the selected rows as CSV (header row included), using the
    /// table's per-column formatting cache.
    pub fn copy_selection_csv(&self, info: &mut TableInfo) -> String {
        let mut out = String::new();
        out.push_str(&info.header.join(","));
        out.push('\n');
        let mut rows: Vec<u64> = self.selected_rows.clone();
        rows.sort_unstable();
        for row in rows {
            if let Some(table_row) = info.row_in_window(row) {
                let cells: Vec<String> = table_row.0.clone();
                out.push_str(&cells.join(","));
                out.push('\n');
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableQueryEdit {
    pub sort_column: Option<u32>,
    pub sort_order: Option<SortOrder>,
    pub filter: Option<String>,
    pub group: Option<String>,
}

impl TableQueryEdit {
    pub fn into_applied(self) -> AppliedQuery {
        AppliedQuery {
            sort_column: self.sort_column,
            sort_order: self.sort_order,
            filter: self.filter,
            group: self.group,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_pad_items_is_clamped() {
        assert_eq!(fetch_pad_items(4), FETCH_PAD_MIN);
        assert_eq!(fetch_pad_items(1000), FETCH_PAD_MAX);
        assert_eq!(fetch_pad_items(40), 20);
    }

    #[test]
    fn fetch_chunk_size_has_a_floor() {
        assert_eq!(fetch_chunk_size(1), FETCH_CHUNK_SIZE_FLOOR);
        assert!(fetch_chunk_size(1000) > FETCH_CHUNK_SIZE_FLOOR);
    }

    #[test]
    fn adaptive_view_range_widens_monotonically_with_duration() {
        let (s1, e1) = adaptive_view_range(0, 1);
        let (s2, e2) = adaptive_view_range(0, 1_000_000);
        let (s3, e3) = adaptive_view_range(0, 10_000_000);
        assert!(e1 - s1 <= e2 - s2);
        assert!(e2 - s2 <= e3 - s3);
        // Floored at the minimum visible span even for a near-zero-duration item.
        assert!(e1 - s1 >= ADAPTIVE_MIN_VISIBLE_NS);
    }

    #[test]
    fn adaptive_view_range_is_centered_on_the_item() {
        let (start, end) = adaptive_view_range(1_000_000, 10_000_000);
        let center = start + (end - start) / 2;
        assert!(center.abs_diff(1_000_000 + 5_000_000) <= 1);
    }

    #[test]
    fn resolve_row_navigation_reads_named_columns() {
        let mut info = TableInfo::new(TableKind::Event);
        info.apply_window(
            0,
            vec!["track_id".into(), "start_ts".into(), "end_ts".into()],
            vec![crate::controller::TableRow(vec!["7".into(), "1000".into(), "1500".into()])],
            1,
            AppliedQuery::default(),
        );
        let resolved = resolve_row_navigation(&info, 0, "track_id", "start_ts", "end_ts");
        assert_eq!(resolved, Some((7, 1000, 1500)));
        assert_eq!(resolve_row_navigation(&info, 0, "missing_column", "start_ts", "end_ts"), None);
    }

    #[test]
    fn needs_refetch_triggers_near_either_edge() {
        // window covers [0, 100) of 1000 total rows, viewport [95, 105) -> near the bottom edge.
        assert!(needs_refetch(0, 100, 1000, 95, 10));
        // viewport comfortably inside the window.
        assert!(!needs_refetch(0, 1000, 1000, 500, 10));
    }

    #[test]
    fn needs_refetch_stops_once_cached_window_reaches_the_backend_total() {
        // window covers the full 100-row table; viewport sits at the very end.
        assert!(!needs_refetch(0, 100, 100, 90, 10));
        // still true for the upward edge even when the table is fully cached.
        assert!(needs_refetch(50, 50, 100, 52, 10));
    }

    #[test]
    fn navigate_to_selected_row_publishes_scroll_then_range_events() {
        let mut info = TableInfo::new(TableKind::Event);
        info.apply_window(
            0,
            vec!["track_id".into(), "start_ts".into(), "end_ts".into()],
            vec![crate::controller::TableRow(vec!["7".into(), "1000".into(), "2000".into()])],
            1,
            AppliedQuery::default(),
        );
        let mut view = TableView::new(TableKind::Event);
        view.select_row(0, false);
        let events = view.navigate_to_selected_row(&info, "track_id", "start_ts", "end_ts").expect("row resolves");
        match &events[0] {
            BusEvent::ScrollToTrack { track_id, .. } => assert_eq!(*track_id, 7),
            other => panic!("expected ScrollToTrack, got {other:?}"),
        }
        match &events[1] {
            BusEvent::RangeChanged { start_ns, end_ns, .. } => assert!(start_ns < end_ns),
            other => panic!("expected RangeChanged, got {other:?}"),
        }
    }

    #[test]
    fn no_selection_means_no_navigation() {
        let info = TableInfo::new(TableKind::Event);
        let view = TableView::new(TableKind::Event);
        assert!(view.navigate_to_selected_row(&info, "track_id", "start_ts", "end_ts").is_none());
    }

    #[test]
    fn copy_selection_csv_includes_header_and_selected_rows_only() {
        let mut info = TableInfo::new(TableKind::Event);
        info.apply_window(
            0,
            vec!["id".into(), "name".into()],
            vec![
                crate::controller::TableRow(vec!["1".into(), "a".into()]),
                crate::controller::TableRow(vec!["2".into(), "b".into()]),
            ],
            2,
            AppliedQuery::default(),
        );
        let mut view = TableView::new(TableKind::Event);
        view.select_row(1, false);
        let csv = view.copy_selection_csv(&mut info);
        assert_eq!(csv, "id,name\n2,b\n");
    }
}
