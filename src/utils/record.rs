//! Fielded records, their per-kind layouts and the cross-kind field mapping.
use std::collections::HashMap;

use crate::utils::errors::{LinkageError, LinkageResult};
use crate::utils::types::{Distance, FieldIndex, FieldSet, RecordId, RecordKind};

/// Field layout of birth records.
pub mod birth {
    pub const STANDARDISED_ID: usize = 0;
    pub const FORENAME: usize = 1;
    pub const SURNAME: usize = 2;
    pub const BIRTH_DAY: usize = 3;
    pub const BIRTH_MONTH: usize = 4;
    pub const BIRTH_YEAR: usize = 5;
    pub const BIRTH_ADDRESS: usize = 6;
    pub const FATHER_FORENAME: usize = 7;
    pub const FATHER_SURNAME: usize = 8;
    pub const MOTHER_FORENAME: usize = 9;
    pub const MOTHER_MAIDEN_SURNAME: usize = 10;
    pub const PARENTS_PLACE_OF_MARRIAGE: usize = 11;
    pub const PARENTS_DAY_OF_MARRIAGE: usize = 12;
    pub const PARENTS_MONTH_OF_MARRIAGE: usize = 13;
    pub const PARENTS_YEAR_OF_MARRIAGE: usize = 14;
    pub const FIELD_COUNT: usize = 15;
}

/// Field layout of death records. `DATE_OF_BIRTH` is `dd/mm/yyyy`.
pub mod death {
    pub const STANDARDISED_ID: usize = 0;
    pub const FORENAME: usize = 1;
    pub const SURNAME: usize = 2;
    pub const DATE_OF_BIRTH: usize = 3;
    pub const DEATH_YEAR: usize = 4;
    pub const AGE_AT_DEATH: usize = 5;
    pub const PLACE_OF_DEATH: usize = 6;
    pub const FATHER_FORENAME: usize = 7;
    pub const FATHER_SURNAME: usize = 8;
    pub const MOTHER_FORENAME: usize = 9;
    pub const MOTHER_MAIDEN_SURNAME: usize = 10;
    pub const FIELD_COUNT: usize = 11;
}

/// Field layout of marriage records.
pub mod marriage {
    pub const STANDARDISED_ID: usize = 0;
    pub const GROOM_FORENAME: usize = 1;
    pub const GROOM_SURNAME: usize = 2;
    pub const BRIDE_FORENAME: usize = 3;
    pub const BRIDE_SURNAME: usize = 4;
    pub const PLACE_OF_MARRIAGE: usize = 5;
    pub const MARRIAGE_DAY: usize = 6;
    pub const MARRIAGE_MONTH: usize = 7;
    pub const MARRIAGE_YEAR: usize = 8;
    pub const FIELD_COUNT: usize = 9;
}

/// Returns true for the sentinel values historical data uses for "unknown".
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed == "--"
        || trimmed == "----"
        || trimmed == "--/--/----"
        || trimmed.contains("missing")
}

impl RecordKind {
    pub fn field_count(&self) -> usize {
        match self {
            RecordKind::Birth => birth::FIELD_COUNT,
            RecordKind::Death => death::FIELD_COUNT,
            RecordKind::Marriage => marriage::FIELD_COUNT,
        }
    }

    /// Index of the standardised id field, excluded from distance computations.
    pub fn id_field(&self) -> FieldIndex {
        match self {
            RecordKind::Birth => birth::STANDARDISED_ID,
            RecordKind::Death => death::STANDARDISED_ID,
            RecordKind::Marriage => marriage::STANDARDISED_ID,
        }
    }

    /// The four fields naming a family's parents, in the order
    /// father forename, mother forename, father surname, mother maiden surname.
    /// For a marriage the couple are the parents.
    pub fn identity_fields(&self) -> [FieldIndex; 4] {
        match self {
            RecordKind::Birth => [
                birth::FATHER_FORENAME,
                birth::MOTHER_FORENAME,
                birth::FATHER_SURNAME,
                birth::MOTHER_MAIDEN_SURNAME,
            ],
            RecordKind::Death => [
                death::FATHER_FORENAME,
                death::MOTHER_FORENAME,
                death::FATHER_SURNAME,
                death::MOTHER_MAIDEN_SURNAME,
            ],
            RecordKind::Marriage => [
                marriage::GROOM_FORENAME,
                marriage::BRIDE_FORENAME,
                marriage::GROOM_SURNAME,
                marriage::BRIDE_SURNAME,
            ],
        }
    }

    /// Day, month and year of the parents' marriage, where the layout records it.
    pub fn marriage_date_fields(&self) -> Option<[FieldIndex; 3]> {
        match self {
            RecordKind::Birth => Some([
                birth::PARENTS_DAY_OF_MARRIAGE,
                birth::PARENTS_MONTH_OF_MARRIAGE,
                birth::PARENTS_YEAR_OF_MARRIAGE,
            ]),
            RecordKind::Marriage => Some([
                marriage::MARRIAGE_DAY,
                marriage::MARRIAGE_MONTH,
                marriage::MARRIAGE_YEAR,
            ]),
            RecordKind::Death => None,
        }
    }
}

/// A fielded historical record. The engine reads fields by index and never
/// interprets them beyond the layouts above.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    kind: RecordKind,
    fields: Vec<String>,
}

impl Record {
    pub fn new(id: RecordId, kind: RecordKind, fields: Vec<String>) -> Self {
        Self { id, kind, fields }
    }

    /// A record of the given kind with every field set to the missing marker.
    pub fn blank(id: RecordId, kind: RecordKind) -> Self {
        let mut fields = vec!["----".to_string(); kind.field_count()];
        fields[kind.id_field()] = id.to_string();
        Self { id, kind, fields }
    }

    pub fn with_field(mut self, index: FieldIndex, value: impl Into<String>) -> Self {
        self.set_field(index, value);
        self
    }

    pub fn set_field(&mut self, index: FieldIndex, value: impl Into<String>) {
        if index >= self.fields.len() {
            self.fields.resize(index + 1, "----".to_string());
        }
        self.fields[index] = value.into();
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Raw field value, `None` when the index lies outside the layout.
    pub fn field(&self, index: FieldIndex) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Field value, `None` when absent or a missing marker.
    pub fn present(&self, index: FieldIndex) -> Option<&str> {
        self.field(index).filter(|v| !is_missing(v))
    }

    /// Like [`Record::field`] but an out-of-range index is an evaluation error.
    pub fn try_field(&self, index: FieldIndex) -> LinkageResult<&str> {
        self.field(index).ok_or_else(|| {
            LinkageError::MetricEvaluation(format!(
                "field {index} out of range for {} record {} ({} fields)",
                self.kind,
                self.id,
                self.fields.len()
            ))
        })
    }

    /// Number of the given fields holding a real value.
    pub fn populated_count(&self, fields: &[FieldIndex]) -> usize {
        fields.iter().filter(|&&f| self.present(f).is_some()).count()
    }
}

/// Positional pairing of two equal-length field sets, used to project a
/// record of one kind into the layout of another before comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    from_kind: RecordKind,
    to_kind: RecordKind,
    from_fields: FieldSet,
    to_fields: FieldSet,
}

impl FieldMapping {
    pub fn new(
        from_kind: RecordKind,
        from_fields: FieldSet,
        to_kind: RecordKind,
        to_fields: FieldSet,
    ) -> LinkageResult<Self> {
        if from_fields.len() != to_fields.len() {
            return Err(LinkageError::FieldSetMismatch {
                left: from_fields.len(),
                right: to_fields.len(),
            });
        }
        Ok(Self { from_kind, to_kind, from_fields, to_fields })
    }

    /// Mapping of a kind onto itself over the same fields.
    pub fn identity(kind: RecordKind, fields: FieldSet) -> Self {
        Self {
            from_kind: kind,
            to_kind: kind,
            from_fields: fields.clone(),
            to_fields: fields,
        }
    }

    pub fn reversed(&self) -> Self {
        Self {
            from_kind: self.to_kind,
            to_kind: self.from_kind,
            from_fields: self.to_fields.clone(),
            to_fields: self.from_fields.clone(),
        }
    }

    pub fn from_kind(&self) -> RecordKind {
        self.from_kind
    }

    pub fn to_kind(&self) -> RecordKind {
        self.to_kind
    }

    pub fn from_fields(&self) -> &[FieldIndex] {
        &self.from_fields
    }

    pub fn to_fields(&self) -> &[FieldIndex] {
        &self.to_fields
    }

    pub fn is_identity(&self) -> bool {
        self.from_kind == self.to_kind && self.from_fields == self.to_fields
    }

    /// Re-lays `record` into the target kind. Unmapped target fields are
    /// missing; the id is preserved.
    pub fn project(&self, record: &Record) -> Record {
        if self.is_identity() {
            return record.clone();
        }
        let mut projected = Record::blank(record.id(), self.to_kind);
        for (&from, &to) in self.from_fields.iter().zip(&self.to_fields) {
            if let Some(value) = record.field(from) {
                projected.set_field(to, value);
            }
        }
        projected
    }
}

/// A candidate pair in the caller's (record1, record2) orientation.
#[derive(Debug, Clone, Copy)]
pub struct RecordPair<'a> {
    pub record1: &'a Record,
    pub record2: &'a Record,
    pub distance: Distance,
}

/// Lookup of fresh records at resolution time.
pub trait RecordStore {
    fn fetch(&self, id: RecordId) -> LinkageResult<Record>;
}

impl RecordStore for HashMap<RecordId, Record> {
    fn fetch(&self, id: RecordId) -> LinkageResult<Record> {
        self.get(&id).cloned().ok_or(LinkageError::RecordNotFound(id))
    }
}

/// Indexes a slice of records by id.
pub fn records_by_id<'a>(records: impl IntoIterator<Item = &'a Record>) -> HashMap<RecordId, Record> {
    records.into_iter().map(|r| (r.id(), r.clone())).collect()
}
