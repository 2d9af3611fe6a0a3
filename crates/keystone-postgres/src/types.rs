//! Type mapping between keyword arguments and PostgreSQL.
//!
//! Query parameters travel as [`SqlValue`]s bound positionally (`$1`, `$2`,
//! ...); result rows come back as ordered [`Row`]s of the same values.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use sqlx::encode::{Encode, IsNull};
use sqlx::error::BoxDynError;
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgRow, PgTypeInfo, PgTypeKind, PgValueFormat};
use sqlx::{Arguments, Column, Postgres, Row as SqlxRow, Type, TypeInfo, ValueRef};
use uuid::Uuid;

use keystone_common::{KeywordError, Result};

/// A single SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value
    Null,
    /// Boolean (BOOLEAN)
    Bool(bool),
    /// Any integer column (SMALLINT, INTEGER, BIGINT)
    Int(i64),
    /// Any floating point column (REAL, DOUBLE PRECISION)
    Float(f64),
    /// Character data (TEXT, VARCHAR, CHAR, NAME)
    Text(String),
    /// Binary data (BYTEA)
    Bytes(Vec<u8>),
    /// JSON/JSONB, also used for arrays read back from the database
    Json(JsonValue),
    /// UUID (UUID)
    Uuid(Uuid),
    /// Timestamp; TIMESTAMPTZ values are normalized to UTC
    Timestamp(NaiveDateTime),
    /// Date (DATE)
    Date(NaiveDate),
    /// Decimal/Numeric (NUMERIC, DECIMAL)
    Decimal(Decimal),
}

impl SqlValue {
    /// Returns the PostgreSQL type name for this value.
    pub fn pg_type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Bool(_) => "BOOLEAN",
            SqlValue::Int(_) => "BIGINT",
            SqlValue::Float(_) => "DOUBLE PRECISION",
            SqlValue::Text(_) => "TEXT",
            SqlValue::Bytes(_) => "BYTEA",
            SqlValue::Json(_) => "JSONB",
            SqlValue::Uuid(_) => "UUID",
            SqlValue::Timestamp(_) => "TIMESTAMP",
            SqlValue::Date(_) => "DATE",
            SqlValue::Decimal(_) => "NUMERIC",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Bind this value as the next positional parameter.
    ///
    /// NULL is sent without a declared type, so the server infers it from
    /// the surrounding expression (`SET created_on = $1` types it as DATE).
    /// A bare `SELECT $1` with a NULL therefore needs an explicit cast.
    pub fn bind_to_arguments(&self, arguments: &mut PgArguments) -> Result<()> {
        self.bind(arguments, false)
    }

    /// Bind for a placeholder that carries an explicit cast (`$1::date`).
    ///
    /// NULL is sent as TEXT, which casts to every column type.
    pub fn bind_for_cast(&self, arguments: &mut PgArguments) -> Result<()> {
        self.bind(arguments, true)
    }

    fn bind(&self, arguments: &mut PgArguments, null_as_text: bool) -> Result<()> {
        let bound = match self {
            SqlValue::Null if null_as_text => arguments.add(Option::<String>::None),
            SqlValue::Null => arguments.add(UntypedNull),
            SqlValue::Bool(v) => arguments.add(*v),
            SqlValue::Int(v) => arguments.add(*v),
            SqlValue::Float(v) => arguments.add(*v),
            SqlValue::Text(v) => arguments.add(v.as_str()),
            SqlValue::Bytes(v) => arguments.add(v.as_slice()),
            SqlValue::Json(v) => arguments.add(v.clone()),
            SqlValue::Uuid(v) => arguments.add(*v),
            SqlValue::Timestamp(v) => arguments.add(*v),
            SqlValue::Date(v) => arguments.add(*v),
            SqlValue::Decimal(v) => arguments.add(*v),
        };

        bound.map_err(|e| {
            KeywordError::QueryError(format!("Failed to bind {}: {}", self.pg_type_name(), e))
        })
    }

    /// JSON rendering used when rows are reported back to the runner.
    pub fn to_json(&self) -> JsonValue {
        match self {
            SqlValue::Null => JsonValue::Null,
            SqlValue::Bool(v) => JsonValue::Bool(*v),
            SqlValue::Int(v) => JsonValue::Number((*v).into()),
            SqlValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            SqlValue::Text(v) => JsonValue::String(v.clone()),
            SqlValue::Bytes(v) => {
                // Encode bytes as hex string
                let hex_string = v.iter().map(|b| format!("{:02x}", b)).collect::<String>();
                JsonValue::String(hex_string)
            }
            SqlValue::Json(v) => v.clone(),
            SqlValue::Uuid(v) => JsonValue::String(v.to_string()),
            SqlValue::Timestamp(v) => JsonValue::String(v.to_string()),
            SqlValue::Date(v) => JsonValue::String(v.to_string()),
            SqlValue::Decimal(v) => JsonValue::String(v.to_string()),
        }
    }
}

/// NULL parameter with the unspecified type OID (0).
struct UntypedNull;

impl Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl Encode<'_, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> std::result::Result<IsNull, BoxDynError> {
        Ok(IsNull::Yes)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<JsonValue> for SqlValue {
    fn from(v: JsonValue) -> Self {
        SqlValue::Json(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Uuid(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One result row: column names mapped to values, in select-list order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SqlValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column, replacing an earlier value with the same name.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((column, value)),
        }
    }

    /// Builder-style [`Row::insert`]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column names in order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Render as a JSON object.
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.columns
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, SqlValue);
    type IntoIter = std::vec::IntoIter<(String, SqlValue)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

/// Column metadata from `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// SQL type as reported by the catalog (e.g., "character varying")
    pub data_type: String,
    /// Underlying type name (e.g., "varchar", "int4", "_text")
    pub udt_name: String,
    pub is_nullable: bool,
    /// 1-based position in the table
    pub ordinal_position: i32,
    pub default_value: Option<String>,
}

/// Outcome of a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Rows produced by a read (or by `RETURNING`)
    Rows(Vec<Row>),
    /// Number of rows a write affected
    Affected(u64),
}

impl QueryResult {
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            QueryResult::Rows(rows) => Some(rows),
            QueryResult::Affected(_) => None,
        }
    }

    pub fn into_rows(self) -> Option<Vec<Row>> {
        match self {
            QueryResult::Rows(rows) => Some(rows),
            QueryResult::Affected(_) => None,
        }
    }

    /// Rows affected by a write, or rows returned by a read
    pub fn affected(&self) -> u64 {
        match self {
            QueryResult::Rows(rows) => rows.len() as u64,
            QueryResult::Affected(n) => *n,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            QueryResult::Rows(rows) => JsonValue::Array(rows.iter().map(Row::to_json).collect()),
            QueryResult::Affected(n) => serde_json::json!({ "affected": n }),
        }
    }
}

fn extract_failure(type_name: &str, column: &str, err: impl std::fmt::Display) -> KeywordError {
    KeywordError::QueryError(format!(
        "Failed to extract {} from column '{}': {}",
        type_name, column, err
    ))
}

fn extract<T>(row: &PgRow, idx: usize, column: &str, type_name: &str) -> Result<Option<T>>
where
    T: for<'r> sqlx::Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<Option<T>, _>(idx)
        .map_err(|e| extract_failure(type_name, column, e))
}

/// Read array columns as JSON arrays.
fn extract_array<T>(row: &PgRow, idx: usize, column: &str) -> Result<SqlValue>
where
    T: for<'r> sqlx::Decode<'r, Postgres>
        + Type<Postgres>
        + sqlx::postgres::PgHasArrayType
        + serde::Serialize,
{
    match row.try_get::<Option<Vec<T>>, _>(idx) {
        Ok(Some(values)) => serde_json::to_value(values)
            .map(SqlValue::Json)
            .map_err(|e| extract_failure("ARRAY", column, e)),
        Ok(None) => Ok(SqlValue::Null),
        Err(e) => Err(extract_failure("ARRAY", column, e)),
    }
}

/// Decode a column whose type has no dedicated mapping.
///
/// Enums decode to their label, INTERVAL and INET/CIDR to their PostgreSQL
/// text form. Anything else is read raw: text when it is printable UTF-8,
/// bytes otherwise.
fn extract_other(
    row: &PgRow,
    idx: usize,
    column: &str,
    type_info: &PgTypeInfo,
) -> Result<Option<SqlValue>> {
    let type_name = type_info.name();

    if matches!(type_info.kind(), PgTypeKind::Enum(_)) {
        // The wire form of an enum value is its label
        return row
            .try_get_unchecked::<Option<String>, _>(idx)
            .map(|v| v.map(SqlValue::Text))
            .map_err(|e| extract_failure(type_name, column, e));
    }

    if type_name == "INTERVAL" {
        return Ok(extract::<PgInterval>(row, idx, column, "INTERVAL")?
            .map(|v| SqlValue::Text(format_interval(&v))));
    }

    let value = row
        .try_get_raw(idx)
        .map_err(|e| extract_failure(type_name, column, e))?;
    if value.is_null() {
        return Ok(None);
    }
    let format = value.format();
    let bytes = value
        .as_bytes()
        .map_err(|e| extract_failure(type_name, column, e))?;

    if matches!(type_name, "INET" | "CIDR") && format == PgValueFormat::Binary {
        if let Some(text) = format_inet(bytes) {
            return Ok(Some(SqlValue::Text(text)));
        }
    }

    tracing::debug!(
        column,
        type_name,
        "No mapping for PostgreSQL type, reading raw value"
    );
    let printable = std::str::from_utf8(bytes).ok().filter(|text| {
        format == PgValueFormat::Text
            || !text.chars().any(|c| c.is_control() && !c.is_whitespace())
    });
    Ok(Some(match printable {
        Some(text) => SqlValue::Text(text.to_string()),
        None => SqlValue::Bytes(bytes.to_vec()),
    }))
}

/// Render an interval the way PostgreSQL prints it (`1 year 2 mons 3 days 04:05:06`).
pub fn format_interval(interval: &PgInterval) -> String {
    fn unit(n: i64, singular: &str, plural: &str) -> String {
        format!("{} {}", n, if n == 1 { singular } else { plural })
    }

    let mut parts = Vec::new();
    let years = i64::from(interval.months / 12);
    let months = i64::from(interval.months % 12);
    if years != 0 {
        parts.push(unit(years, "year", "years"));
    }
    if months != 0 {
        parts.push(unit(months, "mon", "mons"));
    }
    if interval.days != 0 {
        parts.push(unit(i64::from(interval.days), "day", "days"));
    }

    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let abs = micros.unsigned_abs();
        let mut time = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            abs / 3_600_000_000,
            (abs / 60_000_000) % 60,
            (abs / 1_000_000) % 60
        );
        let fraction = abs % 1_000_000;
        if fraction != 0 {
            let digits = format!("{:06}", fraction);
            time.push('.');
            time.push_str(digits.trim_end_matches('0'));
        }
        parts.push(time);
    }

    parts.join(" ")
}

/// Render the binary INET/CIDR form: family, prefix bits, cidr flag, length, address.
pub fn format_inet(bytes: &[u8]) -> Option<String> {
    const PGSQL_AF_INET: u8 = 2;
    const PGSQL_AF_INET6: u8 = 3;

    let (&family, rest) = bytes.split_first()?;
    let (&bits, rest) = rest.split_first()?;
    let (&is_cidr, rest) = rest.split_first()?;
    let (&len, addr) = rest.split_first()?;
    if addr.len() != usize::from(len) {
        return None;
    }

    let (text, max_bits) = match family {
        PGSQL_AF_INET => {
            let octets: [u8; 4] = addr.try_into().ok()?;
            (std::net::Ipv4Addr::from(octets).to_string(), 32)
        }
        PGSQL_AF_INET6 => {
            let octets: [u8; 16] = addr.try_into().ok()?;
            (std::net::Ipv6Addr::from(octets).to_string(), 128)
        }
        _ => return None,
    };

    if bits == max_bits && is_cidr == 0 {
        Some(text)
    } else {
        Some(format!("{}/{}", text, bits))
    }
}

/// Convert a driver row into a [`Row`], choosing the value type from the column type.
pub fn row_to_values(row: &PgRow) -> Result<Row> {
    let mut values = Row::new();

    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let type_name = column.type_info().name();

        let value = match type_name {
            "BOOL" => extract::<bool>(row, idx, name, "BOOL")?.map(SqlValue::Bool),
            "INT2" => extract::<i16>(row, idx, name, "SMALLINT")?.map(|v| SqlValue::Int(v.into())),
            "INT4" => extract::<i32>(row, idx, name, "INT")?.map(|v| SqlValue::Int(v.into())),
            "INT8" => extract::<i64>(row, idx, name, "BIGINT")?.map(SqlValue::Int),
            "FLOAT4" => extract::<f32>(row, idx, name, "REAL")?.map(|v| SqlValue::Float(v.into())),
            "FLOAT8" => extract::<f64>(row, idx, name, "DOUBLE")?.map(SqlValue::Float),
            "NUMERIC" => extract::<Decimal>(row, idx, name, "NUMERIC")?.map(SqlValue::Decimal),
            "VARCHAR" | "TEXT" | "CHAR" | "BPCHAR" | "NAME" => {
                extract::<String>(row, idx, name, "STRING")?.map(SqlValue::Text)
            }
            "BYTEA" => extract::<Vec<u8>>(row, idx, name, "BYTEA")?.map(SqlValue::Bytes),
            "UUID" => extract::<Uuid>(row, idx, name, "UUID")?.map(SqlValue::Uuid),
            "DATE" => extract::<NaiveDate>(row, idx, name, "DATE")?.map(SqlValue::Date),
            "TIME" => extract::<NaiveTime>(row, idx, name, "TIME")?
                .map(|v| SqlValue::Text(v.to_string())),
            "TIMESTAMP" => {
                extract::<NaiveDateTime>(row, idx, name, "TIMESTAMP")?.map(SqlValue::Timestamp)
            }
            "TIMESTAMPTZ" => extract::<DateTime<Utc>>(row, idx, name, "TIMESTAMPTZ")?
                .map(|v| SqlValue::Timestamp(v.naive_utc())),
            "JSON" | "JSONB" => extract::<JsonValue>(row, idx, name, "JSON")?.map(SqlValue::Json),
            "_BOOL" => Some(extract_array::<bool>(row, idx, name)?),
            "_INT2" => Some(extract_array::<i16>(row, idx, name)?),
            "_INT4" => Some(extract_array::<i32>(row, idx, name)?),
            "_INT8" => Some(extract_array::<i64>(row, idx, name)?),
            "_FLOAT4" => Some(extract_array::<f32>(row, idx, name)?),
            "_FLOAT8" => Some(extract_array::<f64>(row, idx, name)?),
            "_TEXT" | "_VARCHAR" => Some(extract_array::<String>(row, idx, name)?),
            "_UUID" => Some(extract_array::<Uuid>(row, idx, name)?),

            _ => extract_other(row, idx, name, column.type_info())?,
        };

        values.insert(name, value.unwrap_or(SqlValue::Null));
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_type_names() {
        assert_eq!(SqlValue::Null.pg_type_name(), "NULL");
        assert_eq!(SqlValue::Int(1).pg_type_name(), "BIGINT");
        assert_eq!(SqlValue::Text("x".into()).pg_type_name(), "TEXT");
        assert_eq!(SqlValue::Json(JsonValue::Null).pg_type_name(), "JSONB");
    }

    #[test]
    fn test_bind_to_arguments() {
        let mut args = PgArguments::default();

        let values = [
            SqlValue::Null,
            SqlValue::Bool(true),
            SqlValue::Int(42),
            SqlValue::Float(1.5),
            SqlValue::Text("test".to_string()),
            SqlValue::Bytes(vec![1, 2, 3]),
            SqlValue::Json(json!({"a": 1})),
            SqlValue::Uuid(Uuid::nil()),
            SqlValue::Date(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()),
            SqlValue::Decimal(Decimal::from_str("12.50").unwrap()),
        ];
        for value in &values {
            assert!(value.bind_to_arguments(&mut args).is_ok(), "{:?}", value);
        }
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(SqlValue::from(7i32), SqlValue::Int(7));
        assert_eq!(SqlValue::from("a"), SqlValue::Text("a".to_string()));
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(true)), SqlValue::Bool(true));
    }

    #[test]
    fn test_to_json() {
        assert_eq!(SqlValue::Null.to_json(), json!(null));
        assert_eq!(SqlValue::Int(42).to_json(), json!(42));
        assert_eq!(SqlValue::Bytes(vec![0xff, 0x00, 0xab]).to_json(), json!("ff00ab"));
        assert_eq!(SqlValue::Float(f64::NAN).to_json(), json!(null));
        assert_eq!(
            SqlValue::Decimal(Decimal::from_str("9.99").unwrap()).to_json(),
            json!("9.99")
        );
    }

    #[test]
    fn test_row_keeps_column_order() {
        let row: Row = vec![("zeta", SqlValue::Int(1)), ("alpha", SqlValue::Int(2))]
            .into_iter()
            .collect();
        assert_eq!(row.column_names().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert_eq!(row.get("alpha"), Some(&SqlValue::Int(2)));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn test_row_insert_replaces() {
        let row = Row::new().with("id", 1i64).with("name", "a").with("id", 2i64);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("id"), Some(&SqlValue::Int(2)));
        assert_eq!(row.to_json(), json!({"id": 2, "name": "a"}));
    }

    #[test]
    fn test_query_result_helpers() {
        let rows = QueryResult::Rows(vec![Row::new().with("n", 1i64), Row::new().with("n", 2i64)]);
        assert_eq!(rows.affected(), 2);
        assert_eq!(rows.rows().map(|r| r.len()), Some(2));
        assert_eq!(rows.to_json(), json!([{"n": 1}, {"n": 2}]));

        let written = QueryResult::Affected(3);
        assert!(written.rows().is_none());
        assert_eq!(written.affected(), 3);
    }

    #[test]
    fn test_null_binds_for_plain_and_cast_placeholders() {
        let mut args = PgArguments::default();
        assert!(SqlValue::Null.bind_to_arguments(&mut args).is_ok());
        assert!(SqlValue::Null.bind_for_cast(&mut args).is_ok());
        assert!(SqlValue::Int(1).bind_for_cast(&mut args).is_ok());
    }

    #[test]
    fn test_format_interval() {
        let day = PgInterval { months: 0, days: 1, microseconds: 0 };
        assert_eq!(format_interval(&day), "1 day");

        let mixed = PgInterval {
            months: 14,
            days: 3,
            microseconds: 4 * 3_600_000_000 + 5 * 60_000_000 + 6_500_000,
        };
        assert_eq!(format_interval(&mixed), "1 year 2 mons 3 days 04:05:06.5");

        let negative = PgInterval { months: 0, days: 0, microseconds: -90_000_000 };
        assert_eq!(format_interval(&negative), "-00:01:30");

        let zero = PgInterval { months: 0, days: 0, microseconds: 0 };
        assert_eq!(format_interval(&zero), "00:00:00");
    }

    #[test]
    fn test_format_inet() {
        assert_eq!(format_inet(&[2, 32, 0, 4, 10, 0, 0, 1]).as_deref(), Some("10.0.0.1"));
        assert_eq!(
            format_inet(&[2, 24, 1, 4, 192, 168, 1, 0]).as_deref(),
            Some("192.168.1.0/24")
        );

        let mut v6 = vec![3, 128, 0, 16];
        v6.extend_from_slice(&[0; 15]);
        v6.push(1);
        assert_eq!(format_inet(&v6).as_deref(), Some("::1"));

        // Truncated or unknown family
        assert!(format_inet(&[2, 32, 0, 4, 10, 0]).is_none());
        assert!(format_inet(&[9, 32, 0, 4, 10, 0, 0, 1]).is_none());
    }
}
