use postgres_types::Type;

use crate::value::EngineColumn;

/// BIGINT columns with these names hold object identifiers and must be
/// reported as `oid` so catalog-aware clients can join on them.
const OID_COLUMN_NAMES: &[&str] = &[
    "oid",
    "tableoid",
    "relnamespace",
    "relowner",
    "relfilenode",
    "did",
    "objoid",
    "classoid",
];

/// Map an engine column to the Postgres type reported in RowDescription.
///
/// Accepts both the engine's spellings (`BIGINT`, `VARCHAR`, `STRUCT(...)`)
/// and Postgres spellings (`int8`, `varchar`), case-insensitively.
pub fn column_pg_type(column: &EngineColumn) -> Type {
    let upper = column.type_text.trim().to_ascii_uppercase();

    if let Some(base) = upper.strip_suffix("[]") {
        return array_pg_type(base);
    }
    if upper.starts_with("STRUCT(") || upper.starts_with("MAP(") || upper.starts_with("UNION(") {
        return Type::JSON;
    }
    if upper == "BIGINT" || upper == "INT8" || upper == "LONG" {
        if OID_COLUMN_NAMES.contains(&column.name.to_ascii_lowercase().as_str()) {
            return Type::OID;
        }
        return Type::INT8;
    }

    scalar_pg_type(&upper)
}

pub fn column_pg_oid(column: &EngineColumn) -> u32 {
    column_pg_type(column).oid()
}

/// OID used when synthesizing `pg_attribute.atttypid` for a lakehouse
/// column; same mapping as `column_pg_type` minus the name allow-list.
pub fn engine_type_pg_oid(type_text: &str) -> u32 {
    let upper = type_text.trim().to_ascii_uppercase();
    if let Some(base) = upper.strip_suffix("[]") {
        return array_pg_type(base).oid();
    }
    if upper.starts_with("STRUCT(") || upper.starts_with("MAP(") || upper.starts_with("UNION(") {
        return Type::JSON.oid();
    }
    scalar_pg_type(&upper).oid()
}

fn scalar_pg_type(upper: &str) -> Type {
    match upper {
        "BOOLEAN" | "BOOL" | "LOGICAL" => Type::BOOL,
        "TINYINT" | "SMALLINT" | "INT2" | "SHORT" | "INT1" => Type::INT2,
        "INTEGER" | "INT" | "INT4" | "SIGNED" | "USMALLINT" | "UTINYINT" => Type::INT4,
        "BIGINT" | "INT8" | "LONG" | "UINTEGER" => Type::INT8,
        "HUGEINT" | "UHUGEINT" | "UBIGINT" => Type::NUMERIC,
        "FLOAT" | "FLOAT4" | "REAL" => Type::FLOAT4,
        "DOUBLE" | "FLOAT8" | "DOUBLE PRECISION" => Type::FLOAT8,
        "VARCHAR" | "CHARACTER VARYING" | "STRING" => Type::VARCHAR,
        "TEXT" | "CHAR" | "BPCHAR" | "NAME" => Type::TEXT,
        "DATE" => Type::DATE,
        "TIME" => Type::TIME,
        "TIMETZ" | "TIME WITH TIME ZONE" => Type::TIMETZ,
        "TIMESTAMP" | "DATETIME" | "TIMESTAMP_S" | "TIMESTAMP_MS" | "TIMESTAMP_NS" => {
            Type::TIMESTAMP
        }
        "TIMESTAMPTZ" | "TIMESTAMP WITH TIME ZONE" => Type::TIMESTAMPTZ,
        "INTERVAL" => Type::INTERVAL,
        "JSON" => Type::JSON,
        "JSONB" => Type::JSONB,
        "UUID" => Type::UUID,
        "BLOB" | "BYTEA" | "BINARY" | "VARBINARY" => Type::BYTEA,
        "OID" => Type::OID,
        other => {
            if other.starts_with("DECIMAL") || other.starts_with("NUMERIC") {
                Type::NUMERIC
            } else if other.starts_with("VARCHAR") {
                Type::VARCHAR
            } else if other.starts_with("TIMESTAMP WITH") {
                Type::TIMESTAMPTZ
            } else if other.starts_with("TIMESTAMP") {
                Type::TIMESTAMP
            } else if other.starts_with("CHAR") {
                Type::TEXT
            } else {
                Type::TEXT
            }
        }
    }
}

fn array_pg_type(base_upper: &str) -> Type {
    match scalar_pg_type(base_upper).name() {
        "bool" => Type::BOOL_ARRAY,
        "int2" => Type::INT2_ARRAY,
        "int4" => Type::INT4_ARRAY,
        "int8" => Type::INT8_ARRAY,
        "float4" => Type::FLOAT4_ARRAY,
        "float8" => Type::FLOAT8_ARRAY,
        "numeric" => Type::NUMERIC_ARRAY,
        "varchar" => Type::VARCHAR_ARRAY,
        "date" => Type::DATE_ARRAY,
        "time" => Type::TIME_ARRAY,
        "timestamp" => Type::TIMESTAMP_ARRAY,
        "timestamptz" => Type::TIMESTAMPTZ_ARRAY,
        "interval" => Type::INTERVAL_ARRAY,
        "uuid" => Type::UUID_ARRAY,
        "json" => Type::JSON_ARRAY,
        "bytea" => Type::BYTEA_ARRAY,
        _ => Type::TEXT_ARRAY,
    }
}

/// The engine acknowledges SET-like statements with a single boolean
/// `Success` column; such results carry no row description on the wire.
pub fn is_statement_ack(columns: &[EngineColumn]) -> bool {
    columns.len() == 1
        && columns[0].name == "Success"
        && column_pg_type(&columns[0]) == Type::BOOL
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str, type_text: &str) -> EngineColumn {
        EngineColumn::new(name, type_text)
    }

    #[test]
    fn test_scalar_mappings() {
        assert_eq!(column_pg_oid(&col("flag", "BOOLEAN")), 16);
        assert_eq!(column_pg_oid(&col("n", "SMALLINT")), 21);
        assert_eq!(column_pg_oid(&col("n", "INTEGER")), 23);
        assert_eq!(column_pg_oid(&col("n", "BIGINT")), 20);
        assert_eq!(column_pg_oid(&col("n", "FLOAT")), 700);
        assert_eq!(column_pg_oid(&col("n", "DOUBLE")), 701);
        assert_eq!(column_pg_oid(&col("n", "DECIMAL(18,3)")), 1700);
        assert_eq!(column_pg_oid(&col("s", "VARCHAR")), 1043);
        assert_eq!(column_pg_oid(&col("s", "text")), 25);
        assert_eq!(column_pg_oid(&col("d", "DATE")), 1082);
        assert_eq!(column_pg_oid(&col("t", "TIMESTAMP")), 1114);
        assert_eq!(column_pg_oid(&col("t", "TIMESTAMP WITH TIME ZONE")), 1184);
        assert_eq!(column_pg_oid(&col("t", "TIME")), 1083);
        assert_eq!(column_pg_oid(&col("t", "TIMETZ")), 1266);
        assert_eq!(column_pg_oid(&col("i", "INTERVAL")), 1186);
        assert_eq!(column_pg_oid(&col("j", "JSON")), 114);
        assert_eq!(column_pg_oid(&col("j", "jsonb")), 3802);
        assert_eq!(column_pg_oid(&col("u", "UUID")), 2950);
        assert_eq!(column_pg_oid(&col("b", "BLOB")), 17);
    }

    #[test]
    fn test_struct_and_arrays() {
        assert_eq!(column_pg_oid(&col("s", "STRUCT(a INTEGER, b VARCHAR)")), 114);
        assert_eq!(column_pg_oid(&col("a", "VARCHAR[]")), 1015);
        assert_eq!(column_pg_oid(&col("a", "INTEGER[]")), 1007);
        assert_eq!(column_pg_oid(&col("a", "BIGINT[]")), 1016);
    }

    #[test]
    fn test_oid_column_allow_list() {
        assert_eq!(column_pg_oid(&col("oid", "BIGINT")), 26);
        assert_eq!(column_pg_oid(&col("relnamespace", "BIGINT")), 26);
        assert_eq!(column_pg_oid(&col("objoid", "BIGINT")), 26);
        // only BIGINT columns are promoted
        assert_eq!(column_pg_oid(&col("oid", "INTEGER")), 23);
        assert_eq!(column_pg_oid(&col("user_id", "BIGINT")), 20);
    }

    #[test]
    fn test_statement_ack() {
        assert!(is_statement_ack(&[col("Success", "BOOLEAN")]));
        assert!(!is_statement_ack(&[col("success", "BOOLEAN")]));
        assert!(!is_statement_ack(&[col("Success", "VARCHAR")]));
        assert!(!is_statement_ack(&[
            col("Success", "BOOLEAN"),
            col("count", "BIGINT")
        ]));
    }
}
