//! Dashboard suggestions derived from a sheet's inferred schema.

pub mod roster;
pub mod widget;

pub use roster::detect_user_import;
pub use roster::detect_user_import_keyed;
pub use roster::UserColumns;
pub use roster::UserImport;
pub use widget::suggest_widgets;
pub use widget::WidgetConfig;
pub use widget::WidgetSuggestion;
