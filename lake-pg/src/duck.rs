//! `LakeEngine` over an embedded DuckDB database.
//!
//! This is the engine the gateway ships with: the rewriter emits DuckDB
//! dialect and the catalog bootstrap issues DuckDB DDL (macros, secrets,
//! lakehouse attachment), all of which execute here. The connection is
//! synchronous, so every call hops onto the blocking pool.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::DateTime;
use duckdb::arrow::array::{
    Array, ArrayRef, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Float32Array,
    Float64Array, Int16Array, Int32Array, Int64Array, LargeListArray, LargeStringArray, ListArray,
    RecordBatch, StringArray, StringViewArray, TimestampMicrosecondArray,
    TimestampMillisecondArray, TimestampNanosecondArray, TimestampSecondArray,
};
use duckdb::arrow::datatypes::{DataType, TimeUnit};
use duckdb::arrow::temporal_conversions::as_date;
use duckdb::arrow::util::display::array_value_to_string;
use duckdb::types::Value as DuckValue;
use duckdb::Connection;
use rust_decimal::Decimal;

use crate::encoder::text_value;
use crate::engine::{EngineError, EngineResult, LakeEngine, PreparedQuery, QueryResult};
use crate::value::{EngineColumn, EngineValue};

pub struct DuckDbEngine {
    connection: Arc<Mutex<Connection>>,
}

impl DuckDbEngine {
    pub fn open_in_memory() -> EngineResult<Self> {
        let connection = Connection::open_in_memory()
            .map_err(|e| EngineError::Connection(e.to_string()))?;
        Ok(DuckDbEngine {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    async fn with_connection<T, F>(&self, f: F) -> EngineResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, duckdb::Error> + Send + 'static,
    {
        run_blocking(self.connection.clone(), f).await
    }
}

async fn run_blocking<T, F>(connection: Arc<Mutex<Connection>>, f: F) -> EngineResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, duckdb::Error> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let conn = connection.lock().unwrap_or_else(PoisonError::into_inner);
        f(&conn).map_err(engine_error)
    })
    .await
    .map_err(|e| EngineError::Connection(e.to_string()))?
}

fn engine_error(e: duckdb::Error) -> EngineError {
    EngineError::Sql(e.to_string())
}

#[async_trait]
impl LakeEngine for DuckDbEngine {
    async fn query(&self, sql: &str) -> EngineResult<QueryResult> {
        let sql = sql.to_string();
        self.with_connection(move |conn| run_query(conn, &sql, Vec::new()))
            .await
    }

    async fn execute(&self, sql: &str) -> EngineResult<u64> {
        let sql = sql.to_string();
        self.with_connection(move |conn| conn.execute_batch(&sql).map(|_| 0))
            .await
    }

    async fn execute_transaction(&self, statements: &[String]) -> EngineResult<()> {
        let statements = statements.to_vec();
        self.with_connection(move |conn| {
            conn.execute_batch("BEGIN")?;
            for sql in &statements {
                if let Err(e) = conn.execute_batch(sql) {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(e);
                }
            }
            conn.execute_batch("COMMIT")
        })
        .await
    }

    async fn prepare(&self, sql: &str) -> EngineResult<Arc<dyn PreparedQuery>> {
        let owned = sql.to_string();
        let columns = self
            .with_connection(move |conn| {
                // syntax check at Parse time
                conn.prepare(&owned)?;
                // DESCRIBE reports the genuine engine type text without
                // executing the query; non-SELECT statements have no
                // description.
                Ok(describe_columns(conn, &owned))
            })
            .await?;

        Ok(Arc::new(DuckDbPrepared {
            connection: self.connection.clone(),
            sql: sql.to_string(),
            columns,
        }))
    }
}

fn describe_columns(conn: &Connection, sql: &str) -> Vec<EngineColumn> {
    let describe = format!("DESCRIBE {sql}");
    let Ok(result) = run_query(conn, &describe, Vec::new()) else {
        return Vec::new();
    };
    result
        .rows
        .iter()
        .filter_map(|row| match (row.first(), row.get(1)) {
            (Some(EngineValue::Text(name)), Some(EngineValue::Text(type_text))) => {
                Some(EngineColumn::new(name.clone(), type_text.clone()))
            }
            _ => None,
        })
        .collect()
}

struct DuckDbPrepared {
    connection: Arc<Mutex<Connection>>,
    sql: String,
    columns: Vec<EngineColumn>,
}

#[async_trait]
impl PreparedQuery for DuckDbPrepared {
    fn columns(&self) -> &[EngineColumn] {
        &self.columns
    }

    async fn query(&self, params: &[EngineValue]) -> EngineResult<QueryResult> {
        let sql = self.sql.clone();
        let params: Vec<DuckValue> = params.iter().map(duck_value).collect();
        run_blocking(self.connection.clone(), move |conn| {
            run_query(conn, &sql, params)
        })
        .await
    }
}

fn duck_value(value: &EngineValue) -> DuckValue {
    match value {
        EngineValue::Null => DuckValue::Null,
        EngineValue::Bool(b) => DuckValue::Boolean(*b),
        EngineValue::Int16(v) => DuckValue::Int(i32::from(*v)),
        EngineValue::Int32(v) => DuckValue::Int(*v),
        EngineValue::Int64(v) => DuckValue::BigInt(*v),
        EngineValue::Float32(v) => DuckValue::Double(f64::from(*v)),
        EngineValue::Float64(v) => DuckValue::Double(*v),
        EngineValue::Text(s) => DuckValue::Text(s.clone()),
        EngineValue::Bytes(b) => DuckValue::Blob(b.clone()),
        other => DuckValue::Text(text_value(other).unwrap_or_default()),
    }
}

fn run_query(
    conn: &Connection,
    sql: &str,
    params: Vec<DuckValue>,
) -> Result<QueryResult, duckdb::Error> {
    let mut stmt = conn.prepare(sql)?;
    let batches: Vec<RecordBatch> = stmt
        .query_arrow(duckdb::params_from_iter(params))?
        .collect();

    let columns = match batches.first() {
        Some(batch) => batch
            .schema()
            .fields()
            .iter()
            .map(|field| EngineColumn::new(field.name(), engine_type_name(field.data_type())))
            .collect(),
        None => (0..stmt.column_count())
            .map(|idx| {
                let name = stmt.column_name(idx)?.to_string();
                Ok(EngineColumn::new(
                    name,
                    engine_type_name(&stmt.column_type(idx)),
                ))
            })
            .collect::<Result<Vec<_>, duckdb::Error>>()?,
    };

    let mut rows = Vec::new();
    for batch in &batches {
        for row in 0..batch.num_rows() {
            let mut values = Vec::with_capacity(batch.num_columns());
            for col in 0..batch.num_columns() {
                values.push(scalar_from_array(batch.column(col), row));
            }
            rows.push(values);
        }
    }

    Ok(QueryResult::new(columns, rows))
}

fn engine_type_name(data_type: &DataType) -> String {
    match data_type {
        DataType::Boolean => "BOOLEAN".to_string(),
        DataType::Int8 => "TINYINT".to_string(),
        DataType::Int16 => "SMALLINT".to_string(),
        DataType::Int32 => "INTEGER".to_string(),
        DataType::Int64 => "BIGINT".to_string(),
        DataType::UInt8 => "UTINYINT".to_string(),
        DataType::UInt16 => "USMALLINT".to_string(),
        DataType::UInt32 => "UINTEGER".to_string(),
        DataType::UInt64 => "UBIGINT".to_string(),
        DataType::Float16 | DataType::Float32 => "FLOAT".to_string(),
        DataType::Float64 => "DOUBLE".to_string(),
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => "VARCHAR".to_string(),
        DataType::Binary | DataType::LargeBinary | DataType::BinaryView => "BLOB".to_string(),
        DataType::Date32 | DataType::Date64 => "DATE".to_string(),
        DataType::Time32(_) | DataType::Time64(_) => "TIME".to_string(),
        DataType::Timestamp(_, Some(_)) => "TIMESTAMP WITH TIME ZONE".to_string(),
        DataType::Timestamp(_, None) => "TIMESTAMP".to_string(),
        DataType::Interval(_) | DataType::Duration(_) => "INTERVAL".to_string(),
        DataType::Decimal128(p, s) | DataType::Decimal256(p, s) => format!("DECIMAL({p},{s})"),
        DataType::List(field) | DataType::LargeList(field) => {
            format!("{}[]", engine_type_name(field.data_type()))
        }
        DataType::Struct(_) => "STRUCT()".to_string(),
        _ => "VARCHAR".to_string(),
    }
}

fn scalar_from_array(array: &ArrayRef, row: usize) -> EngineValue {
    if array.is_null(row) {
        return EngineValue::Null;
    }

    match array.data_type() {
        DataType::Boolean => downcast::<BooleanArray>(array)
            .map(|a| EngineValue::Bool(a.value(row)))
            .unwrap_or(EngineValue::Null),
        DataType::Int16 => downcast::<Int16Array>(array)
            .map(|a| EngineValue::Int16(a.value(row)))
            .unwrap_or(EngineValue::Null),
        DataType::Int32 => downcast::<Int32Array>(array)
            .map(|a| EngineValue::Int32(a.value(row)))
            .unwrap_or(EngineValue::Null),
        DataType::Int64 => downcast::<Int64Array>(array)
            .map(|a| EngineValue::Int64(a.value(row)))
            .unwrap_or(EngineValue::Null),
        DataType::Float32 => downcast::<Float32Array>(array)
            .map(|a| EngineValue::Float32(a.value(row)))
            .unwrap_or(EngineValue::Null),
        DataType::Float64 => downcast::<Float64Array>(array)
            .map(|a| EngineValue::Float64(a.value(row)))
            .unwrap_or(EngineValue::Null),
        DataType::Utf8 => downcast::<StringArray>(array)
            .map(|a| EngineValue::Text(a.value(row).to_string()))
            .unwrap_or(EngineValue::Null),
        DataType::LargeUtf8 => downcast::<LargeStringArray>(array)
            .map(|a| EngineValue::Text(a.value(row).to_string()))
            .unwrap_or(EngineValue::Null),
        DataType::Utf8View => downcast::<StringViewArray>(array)
            .map(|a| EngineValue::Text(a.value(row).to_string()))
            .unwrap_or(EngineValue::Null),
        DataType::Binary => downcast::<BinaryArray>(array)
            .map(|a| EngineValue::Bytes(a.value(row).to_vec()))
            .unwrap_or(EngineValue::Null),
        DataType::Date32 => downcast::<Date32Array>(array)
            .and_then(|a| as_date::<duckdb::arrow::datatypes::Date32Type>(a.value(row) as i64))
            .map(EngineValue::Date)
            .unwrap_or(EngineValue::Null),
        DataType::Timestamp(unit, tz) => timestamp_value(array, row, unit, tz.is_some()),
        DataType::Decimal128(_, scale) => downcast::<Decimal128Array>(array)
            .and_then(|a| Decimal::try_from_i128_with_scale(a.value(row), *scale as u32).ok())
            .map(EngineValue::Decimal)
            .unwrap_or_else(|| display_fallback(array, row)),
        DataType::List(_) => downcast::<ListArray>(array)
            .map(|a| list_value(&a.value(row)))
            .unwrap_or(EngineValue::Null),
        DataType::LargeList(_) => downcast::<LargeListArray>(array)
            .map(|a| list_value(&a.value(row)))
            .unwrap_or(EngineValue::Null),
        _ => display_fallback(array, row),
    }
}

fn downcast<T: 'static>(array: &ArrayRef) -> Option<&T> {
    array.as_any().downcast_ref::<T>()
}

fn list_value(inner: &ArrayRef) -> EngineValue {
    let items = (0..inner.len())
        .map(|i| scalar_from_array(inner, i))
        .collect();
    EngineValue::List(items)
}

fn timestamp_value(array: &ArrayRef, row: usize, unit: &TimeUnit, with_tz: bool) -> EngineValue {
    let micros = match unit {
        TimeUnit::Second => downcast::<TimestampSecondArray>(array)
            .map(|a| a.value(row).saturating_mul(1_000_000)),
        TimeUnit::Millisecond => downcast::<TimestampMillisecondArray>(array)
            .map(|a| a.value(row).saturating_mul(1_000)),
        TimeUnit::Microsecond => downcast::<TimestampMicrosecondArray>(array).map(|a| a.value(row)),
        TimeUnit::Nanosecond => {
            downcast::<TimestampNanosecondArray>(array).map(|a| a.value(row) / 1_000)
        }
    };

    match micros.and_then(DateTime::from_timestamp_micros) {
        Some(ts) if with_tz => EngineValue::TimestampTz(ts),
        Some(ts) => EngineValue::Timestamp(ts.naive_utc()),
        None => EngineValue::Null,
    }
}

fn display_fallback(array: &ArrayRef, row: usize) -> EngineValue {
    array_value_to_string(array, row)
        .map(EngineValue::Text)
        .unwrap_or(EngineValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_query_reports_engine_type_names() {
        let engine = DuckDbEngine::open_in_memory().unwrap();
        let result = engine
            .query("SELECT 1::BIGINT AS big, 'x' AS s, true AS flag")
            .await
            .unwrap();
        assert_eq!(result.columns[0].type_text, "BIGINT");
        assert_eq!(result.columns[1].type_text, "VARCHAR");
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0][0], EngineValue::Int64(1));
        assert_eq!(result.rows[0][2], EngineValue::Bool(true));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_execute_and_query_round_trip() {
        let engine = DuckDbEngine::open_in_memory().unwrap();
        engine
            .execute("CREATE TABLE items (id BIGINT, name VARCHAR)")
            .await
            .unwrap();
        engine
            .execute("INSERT INTO items VALUES (1, 'a'), (2, 'b')")
            .await
            .unwrap();

        let result = engine
            .query("SELECT count(*) AS count FROM items")
            .await
            .unwrap();
        assert_eq!(result.rows[0][0], EngineValue::Int64(2));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_prepare_describes_and_binds_parameters() {
        let engine = DuckDbEngine::open_in_memory().unwrap();
        engine
            .execute("CREATE TABLE users (id BIGINT, name VARCHAR)")
            .await
            .unwrap();
        engine
            .execute("INSERT INTO users VALUES (1, 'ada'), (2, 'bob')")
            .await
            .unwrap();

        let described = engine.prepare("SELECT id, name FROM users").await.unwrap();
        assert_eq!(described.columns().len(), 2);
        assert_eq!(described.columns()[0].name, "id");
        assert_eq!(described.columns()[0].type_text, "BIGINT");
        assert_eq!(described.columns()[1].type_text, "VARCHAR");

        let prepared = engine
            .prepare("SELECT name FROM users WHERE id = $1")
            .await
            .unwrap();
        let result = prepared.query(&[EngineValue::Int64(2)]).await.unwrap();
        assert_eq!(result.rows, vec![vec![EngineValue::Text("bob".to_string())]]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sql_errors_surface_with_engine_message() {
        let engine = DuckDbEngine::open_in_memory().unwrap();
        let err = engine.query("SELECT * FROM missing_table").await.unwrap_err();
        assert!(err.to_string().contains("missing_table"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_transaction_rolls_back_on_error() {
        let engine = DuckDbEngine::open_in_memory().unwrap();
        engine
            .execute("CREATE TABLE t (id BIGINT)")
            .await
            .unwrap();
        let batch = vec![
            "INSERT INTO t VALUES (1)".to_string(),
            "INSERT INTO nowhere VALUES (1)".to_string(),
        ];
        assert!(engine.execute_transaction(&batch).await.is_err());
        let result = engine.query("SELECT count(*) FROM t").await.unwrap();
        assert_eq!(result.rows[0][0], EngineValue::Int64(0));
    }
}
