//! Parquet encoding powered by Serde + Arrow + Parquet.
//!
//! [`ParquetEncoder<T>`] turns a translated batch into one in-memory Parquet file:
//! 1. Infers Arrow fields from `T` with `SchemaLike::from_type` (once per encoder).
//!    Strings map to `Utf8`, sequences to `List` and bytes to `Binary`; fields
//!    registered with [`ParquetEncoder::date_column`] become `Date64`.
//! 2. Converts the records into a `RecordBatch` with `to_record_batch`.
//! 3. Flattens nested struct columns depth-first into top-level columns, in field
//!    declaration order (skip this with [`ParquetEncoder::nested`]). Children of a
//!    nullable struct become nullable and are null wherever the struct was.
//! 4. Writes the batch with `parquet::arrow::ArrowWriter` into a byte buffer.
//!
//! An empty batch still produces a complete zero-row file carrying the schema.
//!
//! [`decode_parquet`] and [`read_parquet_bytes`] read such a blob back with the
//! standard Arrow reader.

use crate::incremental::Encoder;
use anyhow::{Context, Result, bail};
use arrow::array::{Array, ArrayRef, AsArray, make_array};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{DataType, FieldRef, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_arrow::schema::{SchemaLike, TracingOptions};
use serde_arrow::{from_record_batch, to_record_batch};
use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

/// Encodes batches of `T` as Parquet files.
///
/// `T` must be `Serialize` (to encode rows) and `Deserialize` (serde_arrow traces
/// the schema through the deserializer, so it works with zero rows).
pub struct ParquetEncoder<T> {
    fields: OnceLock<Vec<FieldRef>>,
    options: TracingOptions,
    flatten: bool,
    props: WriterProperties,
    _t: PhantomData<fn(&T)>,
}

impl<T> ParquetEncoder<T>
where
    T: Serialize + DeserializeOwned,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            fields: OnceLock::new(),
            options: TracingOptions::default()
                .strings_as_large_utf8(false)
                .sequence_as_large_list(false)
                .bytes_as_large_binary(false),
            flatten: true,
            props: WriterProperties::builder().build(),
            _t: PhantomData,
        }
    }

    /// Keep nested structs as Arrow struct columns instead of flattening them.
    #[must_use]
    pub fn nested(mut self) -> Self {
        self.flatten = false;
        self
    }

    /// Store the field at `path` as an Arrow `Date64` column.
    ///
    /// `path` is dot-separated from the top-level record, e.g. `"shipped_on"` or
    /// `"order.placed"`. The field must serialize as an `i64` of milliseconds
    /// since the epoch (for a chrono `DateTime<Utc>`, use
    /// `#[serde(with = "chrono::serde::ts_milliseconds")]`) or be a `String`
    /// holding a `YYYY-MM-DD` date. Set `nullable` for `Option` fields.
    ///
    /// Types that only deserialize from a well-formed string, such as chrono's
    /// `NaiveDate`, cannot be used directly: the schema is traced from the type
    /// without any sample values.
    ///
    /// # Errors
    ///
    /// Returns an error if the override cannot be registered. A `path` that does
    /// not exist in `T` is reported by the first [`serialize`](Encoder::serialize).
    pub fn date_column(mut self, path: &str, nullable: bool) -> Result<Self> {
        let name = path.rsplit('.').next().unwrap_or(path);
        self.options = self
            .options
            .overwrite(
                path,
                serde_json::json!({ "name": name, "data_type": "Date64", "nullable": nullable }),
            )
            .with_context(|| format!("register Date64 column `{path}`"))?;
        self.fields = OnceLock::new();
        Ok(self)
    }

    #[must_use]
    pub fn with_properties(mut self, props: WriterProperties) -> Self {
        self.props = props;
        self
    }

    /// Arrow fields inferred from `T`, before flattening.
    ///
    /// # Errors
    ///
    /// Returns an error if `T` has a shape serde_arrow cannot map to Arrow.
    pub fn fields(&self) -> Result<&[FieldRef]> {
        if let Some(fields) = self.fields.get() {
            return Ok(fields);
        }
        let derived = Vec::<FieldRef>::from_type::<T>(self.options.clone())
            .with_context(|| format!("infer Arrow schema from type {}", std::any::type_name::<T>()))?;
        Ok(self.fields.get_or_init(|| derived))
    }

    fn to_batch(&self, records: &[T]) -> Result<RecordBatch> {
        let fields = self.fields()?;
        let batch = to_record_batch(fields, &records).context("convert rows to RecordBatch")?;
        if self.flatten { flatten(&batch) } else { Ok(batch) }
    }
}

impl<T> Default for ParquetEncoder<T>
where
    T: Serialize + DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Encoder<T> for ParquetEncoder<T>
where
    T: Serialize + DeserializeOwned,
{
    fn serialize(&self, records: &[T]) -> Result<Vec<u8>> {
        let batch = self.to_batch(records)?;

        let mut buf = Vec::new();
        let mut writer = ArrowWriter::try_new(&mut buf, batch.schema(), Some(self.props.clone()))
            .context("create ArrowWriter")?;
        // A zero-row batch is fine; the footer still records the schema.
        writer.write(&batch).context("write batch to parquet")?;
        writer.close().context("close ArrowWriter")?;
        Ok(buf)
    }
}

/// Replace struct columns with their children, depth-first, in declaration order.
fn flatten(batch: &RecordBatch) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = Vec::with_capacity(schema.fields().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns());
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        push_flat(field, column, None, false, &mut fields, &mut columns)?;
    }

    let mut seen = HashSet::new();
    for f in &fields {
        if !seen.insert(f.name().as_str()) {
            bail!(
                "flattened column `{}` appears more than once; use ParquetEncoder::nested() for this type",
                f.name()
            );
        }
    }

    let options = RecordBatchOptions::new().with_row_count(Some(batch.num_rows()));
    RecordBatch::try_new_with_options(Arc::new(Schema::new(fields)), columns, &options)
        .context("build flattened RecordBatch")
}

/// `parent_nulls` is the union of the validity of every enclosing struct.
fn push_flat(
    field: &FieldRef,
    column: &ArrayRef,
    parent_nulls: Option<&NullBuffer>,
    parent_nullable: bool,
    fields: &mut Vec<FieldRef>,
    columns: &mut Vec<ArrayRef>,
) -> Result<()> {
    if let DataType::Struct(_) = field.data_type() {
        let nullable = parent_nullable || field.is_nullable();
        let strukt = column.as_struct();
        let nulls = NullBuffer::union(parent_nulls, strukt.nulls());
        for (child, child_col) in strukt.fields().iter().zip(strukt.columns()) {
            push_flat(child, child_col, nulls.as_ref(), nullable, fields, columns)?;
        }
        return Ok(());
    }
    if parent_nullable && !field.is_nullable() {
        fields.push(Arc::new(field.as_ref().clone().with_nullable(true)));
    } else {
        fields.push(Arc::clone(field));
    }
    columns.push(match parent_nulls {
        Some(nulls) => mask_nulls(column, nulls)
            .with_context(|| format!("apply parent nulls to column `{}`", field.name()))?,
        None => Arc::clone(column),
    });
    Ok(())
}

/// Null out every slot of `column` where `nulls` marks the row as null.
fn mask_nulls(column: &ArrayRef, nulls: &NullBuffer) -> Result<ArrayRef> {
    let data = column.to_data();
    let merged = NullBuffer::union(Some(nulls), data.nulls());
    let data = data.into_builder().nulls(merged).build()?;
    Ok(make_array(data))
}

/// Read every record batch out of an in-memory Parquet file.
///
/// # Errors
///
/// Returns an error if `data` is not a readable Parquet file.
pub fn read_parquet_bytes(data: &[u8]) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes::Bytes::copy_from_slice(data))
        .context("open ParquetRecordBatchReader")?;
    let schema = Arc::clone(builder.schema());
    let reader = builder
        .with_batch_size(64 * 1024)
        .build()
        .context("build ParquetRecordBatchReader")?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch.context("read next batch")?);
    }
    Ok((schema, batches))
}

/// Decode an in-memory Parquet file into typed rows.
///
/// The file's columns must match `T`'s shape: use this for flat types, or for
/// files written by a [`ParquetEncoder::nested`] encoder.
///
/// # Errors
///
/// Returns an error if the file cannot be read or rows cannot be converted to `T`.
pub fn decode_parquet<T: DeserializeOwned>(data: &[u8]) -> Result<Vec<T>> {
    let (_, batches) = read_parquet_bytes(data)?;
    let mut out: Vec<T> = Vec::new();
    for batch in &batches {
        let mut rows: Vec<T> =
            from_record_batch(batch).context("deserialize RecordBatch rows to T")?;
        out.append(&mut rows);
    }
    Ok(out)
}
