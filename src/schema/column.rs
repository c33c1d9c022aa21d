use crate::spreadsheet::CellValue;
use serde::ser::SerializeMap;
use serde::Serialize;
use serde::Serializer;
use std::fmt::Display;

/// Semantic type inferred for a whole column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Boolean,
    Integer,
    Number,
    Date,
    String,
}

impl SemanticType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Boolean => "boolean",
            SemanticType::Integer => "integer",
            SemanticType::Number => "number",
            SemanticType::Date => "date",
            SemanticType::String => "string",
        }
    }

    /// Integer or number.
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, SemanticType::Integer | SemanticType::Number)
    }

    #[inline]
    pub fn is_date(&self) -> bool {
        matches!(self, SemanticType::Date)
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, SemanticType::String)
    }
}

impl Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a column by the native kinds of its non-null values.
///
/// Booleans are checked before numbers; a numeric column is `integer` only when every
/// value is whole. Text is never parsed, so `"2024-01-01"` stays a string.
pub fn detect_column_type<'a, I>(values: I) -> SemanticType
where
    I: IntoIterator<Item = &'a CellValue>,
{
    let values: Vec<&CellValue> = values.into_iter().filter(|value| !value.is_null()).collect();
    if values.is_empty() {
        SemanticType::String
    } else if values.iter().all(|value| matches!(value, CellValue::Boolean(_))) {
        SemanticType::Boolean
    } else if values.iter().all(|value| matches!(value, CellValue::Integer(_) | CellValue::Float(_))) {
        let is_whole = values.iter().all(|value| match value {
            CellValue::Float(number) => number.is_finite() && number.fract() == 0.0,
            _ => true,
        });
        if is_whole {
            SemanticType::Integer
        } else {
            SemanticType::Number
        }
    } else if values.iter().all(|value| matches!(value, CellValue::DateTime(_))) {
        SemanticType::Date
    } else {
        SemanticType::String
    }
}

/// Ordered mapping from sanitized column name to semantic type.
/// Iteration and serialization follow column order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnTypes(Vec<(String, SemanticType)>);

impl ColumnTypes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a column, replacing the type in place when the name is already present.
    pub fn insert(&mut self, name: &str, kind: SemanticType) {
        match self.0.iter_mut().find(|(existing, _)| existing == name) {
            Some(entry) => entry.1 = kind,
            None => self.0.push((name.to_owned(), kind)),
        }
    }

    pub fn get(&self, name: &str) -> Option<SemanticType> {
        self.0.iter().find(|(existing, _)| existing == name).map(|(_, kind)| *kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SemanticType)> + '_ {
        self.0.iter().map(|(name, kind)| (name.as_str(), *kind))
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|(name, _)| name.to_owned()).collect()
    }

    /// First column, in mapping order, whose type satisfies `predicate`.
    pub fn first_where<P>(&self, predicate: P) -> Option<&str>
    where
        P: Fn(SemanticType) -> bool,
    {
        self.iter().find(|(_, kind)| predicate(*kind)).map(|(name, _)| name)
    }
}

impl<S: Into<String>> FromIterator<(S, SemanticType)> for ColumnTypes {
    fn from_iter<T: IntoIterator<Item = (S, SemanticType)>>(iter: T) -> Self {
        let mut types = ColumnTypes::new();
        for (name, kind) in iter {
            types.insert(&name.into(), kind);
        }
        types
    }
}

impl Serialize for ColumnTypes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, kind) in &self.0 {
            map.serialize_entry(name, kind)?;
        }
        map.end()
    }
}
