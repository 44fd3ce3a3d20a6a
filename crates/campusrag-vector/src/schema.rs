use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Arrow schema of one collection table. The collection identity is the
/// table name, so it is not repeated per row.
pub fn build_passage_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("doc_id", DataType::Utf8, false),
		Field::new("section", DataType::Utf8, true),
		Field::new("content", DataType::Utf8, false),
		Field::new("ordinal", DataType::Int64, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
