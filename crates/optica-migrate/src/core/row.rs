//! Source rows and the typed accessors transformers build documents from.

use std::collections::HashMap;

use mongodb::bson::Bson;

use crate::error::{MigrateError, Result};

use super::value::Value;

static NULL: Value = Value::Null;

/// One row of a relational table.
///
/// Tagged with its source table and, when the table has a single integer
/// primary key, that key. Immutable once read.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRow {
    table: String,
    primary_key: Option<i64>,
    fields: HashMap<String, Value>,
}

impl SourceRow {
    /// Create an empty row for `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: None,
            fields: HashMap::new(),
        }
    }

    /// Create a row from already-converted fields.
    pub fn from_fields(
        table: impl Into<String>,
        primary_key: Option<i64>,
        fields: HashMap<String, Value>,
    ) -> Self {
        Self {
            table: table.into(),
            primary_key,
            fields,
        }
    }

    /// Builder: set a column value.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    /// Builder: tag the natural primary key.
    #[must_use]
    pub fn with_primary_key(mut self, key: i64) -> Self {
        self.primary_key = Some(key);
        self
    }

    /// Source table name.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Natural primary key, if the reader could determine one.
    pub fn primary_key(&self) -> Option<i64> {
        self.primary_key
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Raw column value. Absent columns read as NULL.
    pub fn value(&self, column: &str) -> &Value {
        self.fields.get(column).unwrap_or(&NULL)
    }

    /// Relational key of this row: the tagged primary key, else `column`.
    pub fn key(&self, column: &str) -> Result<i64> {
        match self.primary_key {
            Some(key) => Ok(key),
            None => self.require_int(column),
        }
    }

    /// Integer column that must be present.
    pub fn require_int(&self, column: &str) -> Result<i64> {
        self.value(column).as_i64().ok_or_else(|| {
            MigrateError::invalid_row(
                &self.table,
                format!("column {} is null or not an integer", column),
            )
        })
    }

    /// Integer column that may be NULL.
    pub fn opt_int(&self, column: &str) -> Option<i64> {
        self.value(column).as_i64()
    }

    // ===== BSON field builders =====

    /// Copy a column as-is (NULL when absent).
    pub fn bson(&self, column: &str) -> Bson {
        self.value(column).to_bson()
    }

    /// Text column with NULL mapped to the empty string.
    pub fn text_or_empty(&self, column: &str) -> Bson {
        match self.value(column) {
            Value::Null => Bson::String(String::new()),
            other => other.to_bson(),
        }
    }

    /// 0/1 flag column as a true boolean (NULL stays NULL).
    pub fn flag(&self, column: &str) -> Bson {
        self.value(column)
            .as_flag()
            .map(Bson::Boolean)
            .unwrap_or(Bson::Null)
    }

    /// Monetary or measurement column as a double (NULL stays NULL).
    pub fn number(&self, column: &str) -> Bson {
        self.value(column)
            .as_f64()
            .map(Bson::Double)
            .unwrap_or(Bson::Null)
    }

    /// Date or datetime column as a full timestamp.
    pub fn timestamp(&self, column: &str) -> Bson {
        self.value(column)
            .as_timestamp()
            .map(super::value::timestamp_to_bson)
            .unwrap_or(Bson::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn cliente() -> SourceRow {
        SourceRow::new("Cliente")
            .with("id_cliente", 7)
            .with("nombre", "Ana")
            .with("activo", 1)
            .with("observaciones", Value::Null)
            .with(
                "fecha_nacimiento",
                NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
            )
    }

    #[test]
    fn test_key_prefers_tagged_primary_key() {
        let row = cliente();
        assert_eq!(row.key("id_cliente").unwrap(), 7);
        let tagged = cliente().with_primary_key(99);
        assert_eq!(tagged.key("id_cliente").unwrap(), 99);
    }

    #[test]
    fn test_missing_key_is_invalid_row() {
        let row = SourceRow::new("Cliente").with("nombre", "Ana");
        let err = row.key("id_cliente").unwrap_err();
        assert!(matches!(err, MigrateError::InvalidRow { .. }));
        assert!(err.is_row_level());
    }

    #[test]
    fn test_field_builders() {
        let row = cliente();
        assert_eq!(row.flag("activo"), Bson::Boolean(true));
        assert_eq!(row.text_or_empty("observaciones"), Bson::String(String::new()));
        assert_eq!(row.bson("no_such_column"), Bson::Null);
        assert!(matches!(row.timestamp("fecha_nacimiento"), Bson::DateTime(_)));
        assert_eq!(row.number("nombre"), Bson::Null);
    }
}
