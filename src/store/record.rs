//! The fixed-size event record.

/// Sentinel parent id meaning "root of the tree".
pub const PARENT_ROOT: i32 = -1;

/// One slot in the columnar store.
///
/// All times are integer microseconds; accessors divide by 1000 to surface
/// milliseconds. An `end_time` of 0 marks an instance event. `next_sibling`
/// and `args_id` use 0 as "none".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventRecord {
    /// Dense id, equal to the record's position after rebuild.
    pub id: u32,

    /// Registered event type id.
    pub type_id: u16,

    /// Type flags, cached here so the rescope pass and filters avoid a
    /// table lookup per record.
    pub flags: u16,

    /// Parent record id, or [`PARENT_ROOT`].
    pub parent: i32,

    /// Nesting depth at this record.
    pub depth: u16,

    /// Deepest descendant depth under this record.
    pub max_descendant_depth: u16,

    /// Start time in microseconds.
    pub time: u32,

    /// End time in microseconds; 0 for instance events.
    pub end_time: u32,

    /// Next sibling record id; 0 for none.
    pub next_sibling: u32,

    /// Argument payload id in the side table; 0 for none.
    pub args_id: u32,

    /// Free-form consumer slot, untouched by rebuilds.
    pub tag: u32,

    /// Accumulated tracing-overhead time under this scope, microseconds.
    pub system_time: u32,

    /// Accumulated child-scope time under this scope, microseconds.
    pub child_time: u32,
}

impl EventRecord {
    /// A freshly inserted, unscoped record.
    pub fn new(id: u32, type_id: u16, flags: u16, time: u32, args_id: u32) -> Self {
        Self {
            id,
            type_id,
            flags,
            parent: PARENT_ROOT,
            time,
            args_id,
            ..Default::default()
        }
    }

    /// Whether this record is a scope (has an end time).
    pub fn is_scope(&self) -> bool {
        self.end_time != 0
    }
}
