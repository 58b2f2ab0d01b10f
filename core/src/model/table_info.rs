//! Per-`TableKind` state owned by the [`crate::table::TableEngine`]: the last
//! window of rows fetched from the controller, the currently-applied
//! sort/filter/group parameters, and a bounded per-cell formatting cache.

use crate::controller::{SortOrder, TableKind, TableRow};
use lru::LruCache;
use std::num::NonZeroUsize;

const FORMAT_CACHE_CAPACITY: usize = 4096;

#[derive(Debug, Clone, Default)]
pub struct AppliedQuery {
    pub sort_column: Option<u32>,
    pub sort_order: Option<SortOrder>,
    pub filter: Option<String>,
    pub group: Option<String>,
}

pub struct TableInfo {
    pub kind: TableKind,
    pub header: Vec<String>,
    pub window_start: u64,
    pub rows: Vec<TableRow>,
    pub total_rows: u64,
    /// The query parameters the currently-cached `rows` were fetched with.
    pub applied: AppliedQuery,
    /// A query edited by the user but not yet re-fetched — applied once the
    /// in-flight request (if any) settles, per spec §4.3.3 "applied vs pending".
    pub pending: Option<AppliedQuery>,
    format_cache: LruCache<(u64, u32), String>,
}

impl TableInfo {
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            header: Vec::new(),
            window_start: 0,
            rows: Vec::new(),
            total_rows: 0,
            applied: AppliedQuery::default(),
            pending: None,
            format_cache: LruCache::new(NonZeroUsize::new(FORMAT_CACHE_CAPACITY).unwrap()),
        }
    }

    /// Installs a freshly-fetched window, invalidating the formatting cache
    /// only when the applied query actually changed underneath it (a plain
    /// scroll keeps previously-formatted cells valid).
    pub fn apply_window(&mut self, window_start: u64, header: Vec<String>, rows: Vec<TableRow>, total_rows: u64, query: AppliedQuery) {
        let query_changed = !applied_queries_equal(&self.applied, &query);
        self.window_start = window_start;
        self.header = header;
        self.rows = rows;
        self.total_rows = total_rows;
        self.applied = query;
        if query_changed {
            self.format_cache.clear();
        }
    }

    pub fn row_in_window(&self, absolute_row: u64) -> Option<&TableRow> {
        let offset = absolute_row.checked_sub(self.window_start)?;
        self.rows.get(offset as usize)
    }

    /// Returns the cached formatted value for `(row, col)`, computing and
    /// caching it via `format` on a miss.
    pub fn formatted_cell(&mut self, row: u64, col: u32, raw: &str, format: impl FnOnce(&str) -> String) -> String {
        if let Some(cached) = self.format_cache.get(&(row, col)) {
            return cached.clone();
        }
        let formatted = format(raw);
        self.format_cache.put((row, col), formatted.clone());
        formatted
    }

    /// Groupable columns exclude the empty-named column, any `_`-prefixed
    /// internal column, and the event-id column (spec §4.3.2 "groupable
    /// column discovery").
    pub fn groupable_columns<'a>(&'a self, id_column_name: &str) -> Vec<&'a str> {
        self.header
            .iter()
            .map(String::as_str)
            .filter(|name| !name.is_empty() && !name.starts_with('_') && *name != id_column_name)
            .collect()
    }
}

fn applied_queries_equal(a: &AppliedQuery, b: &AppliedQuery) -> bool {
    a.sort_column == b.sort_column && a.sort_order == b.sort_order && a.filter == b.filter && a.group == b.group
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_cache_hits_avoid_recomputation() {
        let mut info = TableInfo::new(TableKind::Event);
        info.apply_window(0, vec!["a".into()], vec![], 0, AppliedQuery::default());
        let mut calls = 0;
        let _ = info.formatted_cell(0, 0, "raw", |raw| {
            calls += 1;
            raw.to_uppercase()
        });
        let result = info.formatted_cell(0, 0, "raw", |raw| {
            calls += 1;
            raw.to_uppercase()
        });
        assert_eq!(result, "RAW");
        assert_eq!(calls, 1);
    }

    #[test]
    fn query_change_invalidates_format_cache() {
        let mut info = TableInfo::new(TableKind::Event);
        info.apply_window(0, vec![], vec![], 0, AppliedQuery::default());
        info.formatted_cell(0, 0, "raw", |raw| raw.to_uppercase());
        let changed = AppliedQuery {
            filter: Some("x".to_string()),
            ..Default::default()
        };
        info.apply_window(0, vec![], vec![], 0, changed);
        let mut calls = 0;
        info.formatted_cell(0, 0, "raw", |raw| {
            calls += 1;
            raw.to_uppercase()
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn groupable_columns_excludes_internal_and_id_columns() {
        let mut info = TableInfo::new(TableKind::Event);
        info.header = vec!["id".to_string(), "name".to_string(), "_internal".to_string(), "".to_string()];
        assert_eq!(info.groupable_columns("id"), vec!["name"]);
    }
}
