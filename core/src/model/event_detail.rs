//! Resolved detail for a single event, fetched lazily and incrementally once a
//! row is selected in the UI (spec §4.2.5 `FetchEvent`).
//!
//! `basic_info` is populated synchronously from whatever track data is
//! already cached; `ext_data`, `flow_control` and `call_stack` each arrive
//! from their own asynchronous fetch and are tracked independently so the UI
//! can render what's ready without waiting on the slowest of the three.

#[derive(Debug, Clone)]
pub struct BasicInfo {
    pub event_id: u64,
    pub track_id: u64,
    pub name: String,
    pub start_ns: u64,
    pub duration_ns: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowDirection {
    Producer,
    Consumer,
}

#[derive(Debug, Clone)]
pub struct FlowControlEntry {
    pub direction: FlowDirection,
    pub target_track_id: u64,
    pub target_event_id: u64,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct CallStackFrame {
    pub depth: u32,
    pub symbol: String,
    pub source_location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventDetail {
    pub event_id: u64,
    pub basic_info: Option<BasicInfo>,
    pub ext_data: Vec<(String, String)>,
    pub flow_control: Vec<FlowControlEntry>,
    pub call_stack: Vec<CallStackFrame>,
    ext_data_ready: bool,
    flow_control_ready: bool,
    call_stack_ready: bool,
}

impl EventDetail {
    pub fn new(event_id: u64) -> Self {
        Self {
            event_id,
            ..Default::default()
        }
    }

    pub fn set_ext_data(&mut self, rows: Vec<(String, String)>) {
        self.ext_data = rows;
        self.ext_data_ready = true;
    }

    pub fn set_flow_control(&mut self, entries: Vec<FlowControlEntry>) {
        self.flow_control = entries;
        self.flow_control_ready = true;
    }

    pub fn set_call_stack(&mut self, frames: Vec<CallStackFrame>) {
        self.call_stack = frames;
        self.call_stack_ready = true;
    }

    /// `true` once basic info plus all three lazily-fetched sections have
    /// arrived — the point at which the provider stops polling for this event.
    pub fn is_fully_loaded(&self) -> bool {
        self.basic_info.is_some() && self.ext_data_ready && self.flow_control_ready && self.call_stack_ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_fully_loaded_until_all_three_sections_arrive() {
        let mut detail = EventDetail::new(1);
        assert!(!detail.is_fully_loaded());
        detail.basic_info = Some(BasicInfo {
            event_id: 1,
            track_id: 1,
            name: "k".to_string(),
            start_ns: 0,
            duration_ns: 10,
        });
        assert!(!detail.is_fully_loaded());
        detail.set_ext_data(vec![]);
        detail.set_flow_control(vec![]);
        assert!(!detail.is_fully_loaded());
        detail.set_call_stack(vec![]);
        assert!(detail.is_fully_loaded());
    }
}
