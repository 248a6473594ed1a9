use std::collections::{BTreeMap, BTreeSet};

use crate::error::LoadError;

/// SQL data type of a destination column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    BigInt,
    DoublePrecision,
    Text,
    Timestamp,
}

impl SqlType {
    /// Returns the Postgres type name
    pub fn to_postgres(&self) -> &'static str {
        match self {
            SqlType::BigInt => "BIGINT",
            SqlType::DoublePrecision => "DOUBLE PRECISION",
            SqlType::Text => "TEXT",
            SqlType::Timestamp => "TIMESTAMP",
        }
    }

    /// Parse a declared type name (case-insensitive)
    ///
    /// Accepts dataframe-style names (`Int64`, `float64`, `string`) as well as
    /// the SQL names they map to.
    pub fn parse(name: &str) -> Result<Self, LoadError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "int64" | "int" | "integer" | "bigint" => Ok(SqlType::BigInt),
            "float64" | "float" | "double" | "double precision" => Ok(SqlType::DoublePrecision),
            "string" | "str" | "text" => Ok(SqlType::Text),
            "timestamp" | "datetime" | "datetime64" => Ok(SqlType::Timestamp),
            other => Err(LoadError::InvalidTyping(format!(
                "unsupported type '{}'. Supported types: Int64, float64, string, timestamp",
                other
            ))),
        }
    }
}

/// A column in a schema
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
}

/// Ordered column list describing a batch or a destination table
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub columns: Vec<Column>,
}

impl Schema {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Declared typing for the source file: a column -> type mapping plus the
/// columns that are parsed as timestamps rather than kept as text.
#[derive(Debug, Clone)]
pub struct ColumnTyping {
    dtypes: BTreeMap<String, SqlType>,
    parse_dates: BTreeSet<String>,
}

impl ColumnTyping {
    pub fn new(
        dtypes: impl IntoIterator<Item = (String, SqlType)>,
        parse_dates: impl IntoIterator<Item = String>,
    ) -> Result<Self, LoadError> {
        let dtypes: BTreeMap<String, SqlType> = dtypes.into_iter().collect();
        let parse_dates: BTreeSet<String> = parse_dates.into_iter().collect();

        if let Some(both) = parse_dates.iter().find(|c| dtypes.contains_key(*c)) {
            return Err(LoadError::InvalidTyping(format!(
                "column '{}' is both typed and listed as a timestamp",
                both
            )));
        }

        Ok(Self {
            dtypes,
            parse_dates,
        })
    }

    /// Typing of the NYC yellow taxi trip files
    pub fn yellow_taxi() -> Self {
        use SqlType::*;
        let dtypes = [
            ("VendorID", BigInt),
            ("passenger_count", BigInt),
            ("trip_distance", DoublePrecision),
            ("RatecodeID", BigInt),
            ("store_and_fwd_flag", Text),
            ("PULocationID", BigInt),
            ("DOLocationID", BigInt),
            ("payment_type", BigInt),
            ("fare_amount", DoublePrecision),
            ("extra", DoublePrecision),
            ("mta_tax", DoublePrecision),
            ("tip_amount", DoublePrecision),
            ("tolls_amount", DoublePrecision),
            ("improvement_surcharge", DoublePrecision),
            ("total_amount", DoublePrecision),
            ("congestion_surcharge", DoublePrecision),
        ];
        let parse_dates = ["tpep_pickup_datetime", "tpep_dropoff_datetime"];

        Self {
            dtypes: dtypes
                .into_iter()
                .map(|(name, ty)| (name.to_string(), ty))
                .collect(),
            parse_dates: parse_dates.into_iter().map(String::from).collect(),
        }
    }

    pub fn column_count(&self) -> usize {
        self.dtypes.len() + self.parse_dates.len()
    }

    fn type_of(&self, column: &str) -> Option<SqlType> {
        if self.parse_dates.contains(column) {
            Some(SqlType::Timestamp)
        } else {
            self.dtypes.get(column).copied()
        }
    }

    /// Build the batch schema for a source header.
    ///
    /// The header must name exactly the declared columns; order follows the
    /// header.
    pub fn resolve(&self, header: &[String]) -> Result<Schema, LoadError> {
        let mut columns = Vec::with_capacity(header.len());
        let mut unexpected = Vec::new();
        let mut seen = BTreeSet::new();

        for name in header {
            match self.type_of(name) {
                Some(sql_type) if seen.insert(name.as_str()) => columns.push(Column {
                    name: name.clone(),
                    sql_type,
                }),
                _ => unexpected.push(name.as_str()),
            }
        }

        let missing: Vec<&str> = self
            .dtypes
            .keys()
            .chain(self.parse_dates.iter())
            .map(String::as_str)
            .filter(|name| !seen.contains(name))
            .collect();

        if !unexpected.is_empty() || !missing.is_empty() {
            return Err(LoadError::SchemaMismatch {
                unexpected: unexpected.join(", "),
                missing: missing.join(", "),
            });
        }

        Ok(Schema { columns })
    }
}

/// Quote an identifier for use in SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Generate the DDL that drops any existing table of the same name
pub fn generate_drop_ddl(table_spec: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", table_spec)
}

/// Generate DDL statement for creating a table
///
/// Every column is nullable. An optional leading index column holds the
/// source row position.
pub fn generate_create_ddl(table_spec: &str, schema: &Schema, index_column: Option<&str>) -> String {
    let mut ddl = format!("CREATE TABLE {} (\n", table_spec);

    let column_defs: Vec<String> = index_column
        .map(|name| format!("  {} {}", quote_ident(name), SqlType::BigInt.to_postgres()))
        .into_iter()
        .chain(schema.columns.iter().map(|col| {
            format!("  {} {}", quote_ident(&col.name), col.sql_type.to_postgres())
        }))
        .collect();

    ddl.push_str(&column_defs.join(",\n"));
    ddl.push_str("\n)");

    ddl
}
