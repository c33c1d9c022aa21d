//! Schema inference: column semantic types, identifier sanitization and row normalization.

pub mod column;
pub mod identifier;
pub mod record;

pub use column::detect_column_type;
pub use column::ColumnTypes;
pub use column::SemanticType;
pub use identifier::generate_table_name;
pub use identifier::generate_table_name_at;
pub use identifier::sanitize_identifier;
pub use identifier::unique_column_names;
pub use record::normalize_rows;
pub use record::Record;
