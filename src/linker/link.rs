use std::fmt;

use crate::utils::types::{Distance, EdgeType, RecordId, RecordKind};

/// A candidate relationship produced by a linkage run. `record1` always
/// comes from the first set handed to the linker and `record2` from the second.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub record1: RecordId,
    pub kind1: RecordKind,
    pub role1: String,
    pub record2: RecordId,
    pub kind2: RecordKind,
    pub role2: String,
    pub link_type: EdgeType,
    pub distance: Distance,
    /// Compared fields populated on both records.
    pub fields_populated: usize,
    pub provenance: String,
}

impl Link {
    /// The pair with the smaller id first, for order-insensitive comparison.
    pub fn unordered(&self) -> (RecordId, RecordId) {
        if self.record1 <= self.record2 {
            (self.record1, self.record2)
        } else {
            (self.record2, self.record1)
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) -{}- {}({}) [{}]",
            self.record1, self.role1, self.link_type, self.record2, self.role2, self.provenance
        )
    }
}
