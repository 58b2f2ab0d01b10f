use serde::{Deserialize, Serialize};

/// Closed enumeration of handle kinds a [`crate::controller::Controller`] can allocate.
///
/// Mirrors the handle taxonomy of the upstream profiler's C-shaped handle API: every
/// domain object the UI touches (timeline, track, event, table, ...) is one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    Controller,
    Timeline,
    Graph,
    Track,
    Event,
    Sample,
    Table,
    Future,
    Array,
    Arguments,
    Node,
    Processor,
    Process,
    InstrumentedThread,
    SampledThread,
    Queue,
    Stream,
    Counter,
    Callstack,
    FlowControl,
    ExtData,
    Roofline,
    Workload,
    Kernel,
    MetricsContainer,
}

/// An opaque reference to a controller-owned object.
///
/// Valid from allocation until its matching free. The id is only meaningful in the
/// context of the [`crate::controller::Controller`] that allocated it; the generation
/// is local bookkeeping a `Controller` implementation may use to catch use-after-free,
/// it carries no meaning across implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub id: u64,
    pub kind: HandleKind,
}

impl Handle {
    pub fn new(id: u64, kind: HandleKind) -> Self {
        Self { id, kind }
    }
}

/// A 32-bit enumeration tag identifying one property on a handle type.
///
/// Each handle type exposes a contiguous range of legal tags (see [`property_range`]);
/// a tag outside that range must resolve to [`ResultCode::InvalidProperty`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Property(pub u32);

/// Returns the legal, contiguous property-tag range `[first, last]` for a handle kind.
///
/// Call-sites use this for the range check the source expresses as
/// `property ∈ [first, last]`; in this port that check is a `debug_assert!` — a tag
/// outside the range is still reported as `ResultCode::InvalidProperty` in release
/// builds, since "invalid-property" is a caller mistake that must surface at the call
/// site rather than be silently tolerated (see spec §4.1, §7).
pub fn property_range(kind: HandleKind) -> (u32, u32) {
    match kind {
        HandleKind::Node => (0, 999),
        HandleKind::Processor => (1000, 1999),
        HandleKind::Process => (2000, 2999),
        HandleKind::InstrumentedThread | HandleKind::SampledThread => (3000, 3999),
        HandleKind::Queue => (4000, 4999),
        HandleKind::Stream => (5000, 5999),
        HandleKind::Counter => (6000, 6999),
        HandleKind::Timeline => (7000, 7999),
        HandleKind::Graph => (8000, 8999),
        HandleKind::Track => (9000, 9999),
        HandleKind::Event => (10000, 10999),
        HandleKind::Sample => (11000, 11999),
        HandleKind::Table => (12000, 12999),
        HandleKind::Array => (13000, 13999),
        HandleKind::Arguments => (14000, 14999),
        HandleKind::Future => (15000, 15999),
        HandleKind::Callstack => (16000, 16999),
        HandleKind::FlowControl => (17000, 17999),
        HandleKind::ExtData => (18000, 18999),
        HandleKind::Roofline => (19000, 19999),
        HandleKind::Workload => (20000, 20999),
        HandleKind::Kernel => (21000, 21999),
        HandleKind::MetricsContainer => (22000, 22999),
        HandleKind::Controller => (23000, 23999),
    }
}

/// Checks whether `prop` is a legal property for `kind`, asserting in debug builds.
pub fn check_property(kind: HandleKind, prop: Property) -> ResultCode {
    let (first, last) = property_range(kind);
    if prop.0 < first || prop.0 > last {
        debug_assert!(
            false,
            "property {} out of range [{first}, {last}] for {kind:?}",
            prop.0
        );
        ResultCode::InvalidProperty
    } else {
        ResultCode::Success
    }
}

/// Closed set of result codes a controller operation or future can resolve to.
///
/// `Success` and `Timeout` are non-exceptional (spec §6.4); every other variant
/// surfaces as an error in the relevant Data Provider callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultCode {
    Success,
    UnknownError,
    Timeout,
    NotLoaded,
    AllocFailure,
    InvalidParameter,
    DbAccessFailed,
    InvalidProperty,
    NotSupported,
    ResourceBusy,
    DbAbort,
}

impl ResultCode {
    /// `true` for the two non-exceptional codes (spec §6.4).
    pub fn is_non_exceptional(self) -> bool {
        matches!(self, ResultCode::Success | ResultCode::Timeout)
    }

    pub fn is_success(self) -> bool {
        matches!(self, ResultCode::Success)
    }
}

/// Typed primitive carried by a property read/write, an array entry, or an
/// [`crate::controller::Arguments`] value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    UInt64(u64),
    Double(f64),
    String(String),
    Object(Handle),
}

impl Value {
    pub fn as_uint64(&self) -> Option<u64> {
        match self {
            Value::UInt64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<Handle> {
        match self {
            Value::Object(h) => Some(*h),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_ranges_are_disjoint_and_ordered() {
        let kinds = [
            HandleKind::Node,
            HandleKind::Processor,
            HandleKind::Process,
            HandleKind::Track,
            HandleKind::Event,
            HandleKind::Sample,
            HandleKind::Table,
        ];
        let mut ranges: Vec<(u32, u32)> = kinds.iter().map(|k| property_range(*k)).collect();
        ranges.sort();
        for pair in ranges.windows(2) {
            assert!(pair[0].1 < pair[1].0, "ranges must not overlap: {pair:?}");
        }
    }

    #[test]
    fn check_property_in_range_is_success() {
        let (first, _) = property_range(HandleKind::Track);
        assert_eq!(
            check_property(HandleKind::Track, Property(first)),
            ResultCode::Success
        );
    }

    #[test]
    fn result_code_non_exceptional_set() {
        assert!(ResultCode::Success.is_non_exceptional());
        assert!(ResultCode::Timeout.is_non_exceptional());
        assert!(!ResultCode::DbAccessFailed.is_non_exceptional());
        assert!(!ResultCode::InvalidProperty.is_non_exceptional());
    }
}
