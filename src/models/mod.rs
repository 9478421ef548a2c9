mod field_record;

pub use field_record::{FieldKey, FieldRecord, FIELD_COUNT, UNKNOWN};
