use std::sync::Arc;

use arrow_array::{ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};

/// Create a nullable-`Int64` schema with the given column names.
pub fn int64_schema(names: &[&str]) -> SchemaRef {
    let fields: Vec<_> = names
        .iter()
        .map(|name| Field::new(*name, DataType::Int64, true))
        .collect();
    Arc::new(Schema::new(fields))
}

/// Create a record batch of `Int64` columns from `(name, values)` pairs.
pub fn int64_batch(columns: &[(&str, Vec<i64>)]) -> RecordBatch {
    let schema = int64_schema(&columns.iter().map(|(name, _)| *name).collect::<Vec<_>>());
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .map(|(_, values)| Arc::new(Int64Array::from(values.clone())) as ArrayRef)
        .collect();
    RecordBatch::try_new(schema, arrays).unwrap()
}

/// Create a single-column `Utf8` record batch.
pub fn string_batch(name: &str, values: Vec<&str>) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new(name, DataType::Utf8, true)]));
    let array: ArrayRef = Arc::new(StringArray::from(values));
    RecordBatch::try_new(schema, vec![array]).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int64_batch_shape() {
        let batch = int64_batch(&[("a", vec![1, 2, 3]), ("b", vec![4, 5, 6])]);
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 2);
        assert_eq!(batch.schema().field(0).name(), "a");
    }
}
