//! Arrow schema for the ordered opinion read-back, and its decoder.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array, StringArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;

use crate::CoreError;
use crate::agreement::OpinionRow;
use crate::opinion::OpinionType;

/// Columns of the opinion/concurrence read-back, in query order.
pub fn opinion_rows_schema() -> Schema {
    Schema::new(vec![
        Field::new("docket_number", DataType::Utf8, false),
        Field::new("opinion_id", DataType::Int64, false),
        Field::new("type_id", DataType::Int32, false),
        Field::new("effective_type_id", DataType::Int32, true),
        Field::new("authoring_justice", DataType::Utf8, false),
        Field::new("concurring_justice", DataType::Utf8, true),
    ])
}

/// Look up a column by name and cast it to `to`. Integer widths and
/// `Utf8`/`LargeUtf8` differ between producers.
fn column_as(batch: &RecordBatch, name: &str, to: &DataType) -> Result<ArrayRef, CoreError> {
    let col = batch
        .column_by_name(name)
        .ok_or_else(|| CoreError::Other(format!("missing column {name}")))?;
    Ok(cast(col, to)?)
}

fn strings<'a>(col: &'a ArrayRef, name: &str) -> Result<&'a StringArray, CoreError> {
    col.as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| CoreError::Other(format!("column {name} is not utf8")))
}

fn ints<'a>(col: &'a ArrayRef, name: &str) -> Result<&'a Int64Array, CoreError> {
    col.as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| CoreError::Other(format!("column {name} is not int64")))
}

fn required<T>(value: Option<T>, name: &str, row: usize) -> Result<T, CoreError> {
    value.ok_or_else(|| CoreError::Other(format!("null {name} in row {row}")))
}

/// Decode one batch of the read-back into rows, preserving order.
pub fn rows_from_batch(batch: &RecordBatch) -> Result<Vec<OpinionRow>, CoreError> {
    let docket = column_as(batch, "docket_number", &DataType::Utf8)?;
    let id = column_as(batch, "opinion_id", &DataType::Int64)?;
    let type_id = column_as(batch, "type_id", &DataType::Int64)?;
    let effective = column_as(batch, "effective_type_id", &DataType::Int64)?;
    let author = column_as(batch, "authoring_justice", &DataType::Utf8)?;
    let concurring = column_as(batch, "concurring_justice", &DataType::Utf8)?;

    let docket = strings(&docket, "docket_number")?;
    let id = ints(&id, "opinion_id")?;
    let type_id = ints(&type_id, "type_id")?;
    let effective = ints(&effective, "effective_type_id")?;
    let author = strings(&author, "authoring_justice")?;
    let concurring = strings(&concurring, "concurring_justice")?;

    let value = |a: &StringArray, i: usize| (!a.is_null(i)).then(|| a.value(i).to_string());
    let int = |a: &Int64Array, i: usize| (!a.is_null(i)).then(|| a.value(i));

    (0..batch.num_rows())
        .map(|i| {
            Ok(OpinionRow {
                docket_number: required(value(docket, i), "docket_number", i)?,
                opinion_id: required(int(id, i), "opinion_id", i)?,
                kind: OpinionType::from_code(required(int(type_id, i), "type_id", i)?)?,
                effective_type: int(effective, i).map(OpinionType::from_code).transpose()?,
                author: required(value(author, i), "authoring_justice", i)?,
                concurring: value(concurring, i),
            })
        })
        .collect()
}

/// Encode rows as a batch matching [`opinion_rows_schema`].
pub fn batch_from_rows(rows: &[OpinionRow]) -> Result<RecordBatch, CoreError> {
    use arrow::array::Int32Array;

    let columns: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.docket_number.as_str()),
        )),
        Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.opinion_id))),
        Arc::new(Int32Array::from_iter_values(rows.iter().map(|r| r.kind.code()))),
        Arc::new(Int32Array::from_iter(
            rows.iter().map(|r| r.effective_type.map(OpinionType::code)),
        )),
        Arc::new(StringArray::from_iter_values(
            rows.iter().map(|r| r.author.as_str()),
        )),
        Arc::new(StringArray::from_iter(
            rows.iter().map(|r| r.concurring.as_deref()),
        )),
    ];
    Ok(RecordBatch::try_new(
        Arc::new(opinion_rows_schema()),
        columns,
    )?)
}
