use std::fmt;

/// Stable identifier of a record in the external record store.
pub type RecordId = u64;

/// A distance value, always >= 0.
pub type Distance = f64;

/// Index of a field within a record's layout.
pub type FieldIndex = usize;

/// Ordered list of field indices taking part in a distance computation.
pub type FieldSet = Vec<FieldIndex>;

/// The closed set of record kinds the engine links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKind {
    Birth,
    Death,
    Marriage,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Birth => "Birth",
            RecordKind::Death => "Death",
            RecordKind::Marriage => "Marriage",
        };
        f.write_str(name)
    }
}

/// Relationship types carried by graph edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeType {
    Sibling,
    Id,
    /// Marker left behind when an edge is removed, so that the removal stays
    /// auditable and the pair is not reported as open again.
    Deleted,
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeType::Sibling => "SIBLING",
            EdgeType::Id => "ID",
            EdgeType::Deleted => "DELETED",
        };
        f.write_str(name)
    }
}
