use std::sync::Arc;

use pgwire::{
    api::results::{DataRowEncoder, FieldFormat, FieldInfo, QueryResponse},
    error::PgWireResult,
    messages::data::DataRow,
};

use crate::datatypes::column_pg_type;
use crate::encoder::encode_value;
use crate::engine::QueryResult;
use crate::value::{EngineColumn, EngineValue};

/// Build the RowDescription field list for a set of engine columns.
///
/// Results are always sent in text format; binary is only accepted for
/// parameters.
pub fn fields_from_columns(columns: &[EngineColumn]) -> Vec<FieldInfo> {
    columns
        .iter()
        .map(|col| {
            FieldInfo::new(
                col.name.clone(),
                None,
                None,
                column_pg_type(col),
                FieldFormat::Text,
            )
        })
        .collect()
}

pub struct RowEncoder {
    rows: std::vec::IntoIter<Vec<EngineValue>>,
    fields: Arc<Vec<FieldInfo>>,
}

impl RowEncoder {
    pub fn new(result: QueryResult) -> Self {
        let fields = Arc::new(fields_from_columns(&result.columns));
        Self {
            rows: result.rows.into_iter(),
            fields,
        }
    }

    pub fn fields(&self) -> Arc<Vec<FieldInfo>> {
        self.fields.clone()
    }

    pub fn next_row(&mut self) -> Option<PgWireResult<DataRow>> {
        let row = self.rows.next()?;
        let mut encoder = DataRowEncoder::new(self.fields.clone());
        for value in &row {
            if let Err(e) = encode_value(&mut encoder, value) {
                return Some(Err(e));
            }
        }
        Some(encoder.finish())
    }
}

/// Turn a materialized engine result into a pgwire query response.
pub fn encode_query_result(result: QueryResult) -> PgWireResult<QueryResponse> {
    let mut encoder = RowEncoder::new(result);
    let fields = encoder.fields();

    let mut rows = Vec::new();
    while let Some(row) = encoder.next_row() {
        rows.push(row);
    }

    let row_stream = futures::stream::iter(rows);
    Ok(QueryResponse::new(fields, Box::pin(row_stream)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_carry_text_format_and_mapped_types() {
        let fields = fields_from_columns(&[
            EngineColumn::new("id", "BIGINT"),
            EngineColumn::new("name", "VARCHAR"),
        ]);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name(), "id");
        assert_eq!(fields[0].datatype().oid(), 20);
        assert_eq!(fields[1].datatype().oid(), 1043);
        assert_eq!(*fields[0].format(), FieldFormat::Text);
    }

    #[test]
    fn test_row_encoder_streams_all_rows() {
        let result = QueryResult::new(
            vec![EngineColumn::new("count", "BIGINT")],
            vec![vec![EngineValue::Int64(2)], vec![EngineValue::Int64(3)]],
        );
        let mut encoder = RowEncoder::new(result);
        let mut n = 0;
        while let Some(row) = encoder.next_row() {
            row.expect("row encodes");
            n += 1;
        }
        assert_eq!(n, 2);
    }
}
