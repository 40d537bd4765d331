use std::collections::BTreeMap;

/// The latest value of each field, keyed by field name
pub type BatchFields = BTreeMap<String, f64>;

/// The values received since the last flush.
///
/// Only the latest value of a field is kept: a new value for a field
/// replaces the previous one in the same batch.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchAccumulator {
    fields: BatchFields,
}

impl BatchAccumulator {
    pub fn new() -> Self {
        BatchAccumulator::default()
    }

    /// Store the value of a field, replacing any previous value of this field.
    ///
    /// The value is stored as is, even if not finite.
    pub fn append(&mut self, field: &str, value: f64) {
        match self.fields.get_mut(field) {
            Some(previous) => *previous = value,
            None => {
                self.fields.insert(field.to_string(), value);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of distinct fields with a value
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn snapshot(&self) -> BatchFields {
        self.fields.clone()
    }

    pub fn reset(&mut self) {
        self.fields.clear();
    }
}
