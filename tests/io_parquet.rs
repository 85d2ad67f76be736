#![cfg(feature = "io-parquet")]

use anyhow::Result;
use arrow::array::{Array, AsArray};
use arrow::datatypes::{DataType, Date64Type, UInt32Type};
use chrono::{DateTime, TimeZone, Utc};
use ironflow::io::parquet::{ParquetEncoder, decode_parquet, read_parquet_bytes};
use ironflow::io::{InMemoryStateStore, SliceCollector};
use ironflow::incremental::infallible;
use ironflow::testing::RecordingEmitter;
use ironflow::{Encoder, IncrementalPipeline, StateStore};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Row {
    id: u32,
    name: String,
    score: Option<f64>,
    tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Address {
    city: String,
    zip: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Customer {
    id: u64,
    address: Address,
    active: bool,
}

fn rows() -> Vec<Row> {
    vec![
        Row {
            id: 1,
            name: "a".into(),
            score: Some(1.5),
            tags: vec!["x".into()],
        },
        Row {
            id: 2,
            name: "b".into(),
            score: None,
            tags: vec!["y".into(), "z".into()],
        },
    ]
}

fn column_names(data: &[u8]) -> Result<Vec<String>> {
    let (schema, _) = read_parquet_bytes(data)?;
    Ok(schema.fields().iter().map(|f| f.name().clone()).collect())
}

#[test]
fn parquet_roundtrip_typed() -> Result<()> {
    let data = rows();
    let bytes = ParquetEncoder::<Row>::new().serialize(&data)?;

    let back: Vec<Row> = decode_parquet(&bytes)?;
    assert_eq!(back, data);
    Ok(())
}

#[test]
fn empty_batch_is_valid_zero_row_file() -> Result<()> {
    let bytes = ParquetEncoder::<Row>::new().serialize(&[])?;
    assert!(!bytes.is_empty());

    let (schema, batches) = read_parquet_bytes(&bytes)?;
    let rows: usize = batches.iter().map(|b| b.num_rows()).sum();
    assert_eq!(rows, 0);
    let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
    assert_eq!(names, vec!["id", "name", "score", "tags"]);

    assert!(decode_parquet::<Row>(&bytes)?.is_empty());
    Ok(())
}

#[test]
fn nested_structs_are_flattened_in_declaration_order() -> Result<()> {
    let customers = vec![
        Customer {
            id: 7,
            address: Address {
                city: "Oslo".into(),
                zip: 150,
            },
            active: true,
        },
        Customer {
            id: 8,
            address: Address {
                city: "Bergen".into(),
                zip: 5003,
            },
            active: false,
        },
    ];

    let flat = ParquetEncoder::<Customer>::new().serialize(&customers)?;
    assert_eq!(column_names(&flat)?, vec!["id", "city", "zip", "active"]);
    let (_, batches) = read_parquet_bytes(&flat)?;
    assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);

    let nested = ParquetEncoder::<Customer>::new().nested().serialize(&customers)?;
    assert_eq!(column_names(&nested)?, vec!["id", "address", "active"]);
    assert_eq!(decode_parquet::<Customer>(&nested)?, customers);
    Ok(())
}

#[test]
fn empty_nested_batch_keeps_flattened_schema() -> Result<()> {
    let bytes = ParquetEncoder::<Customer>::new().serialize(&[])?;
    assert_eq!(column_names(&bytes)?, vec!["id", "city", "zip", "active"]);
    Ok(())
}

#[test]
fn encoder_is_reused_across_batches() -> Result<()> {
    let encoder = ParquetEncoder::<Row>::new();
    let all = rows();
    let first = encoder.serialize(&all[..1])?;
    let second = encoder.serialize(&all[1..])?;
    assert_eq!(encoder.fields()?.len(), 4);
    assert_eq!(decode_parquet::<Row>(&first)?, all[..1].to_vec());
    assert_eq!(decode_parquet::<Row>(&second)?, all[1..].to_vec());
    Ok(())
}

#[test]
fn incremental_run_emits_parquet() -> Result<()> {
    let store = InMemoryStateStore::new();
    store.set("rows", "0")?;
    let emitter = RecordingEmitter::new();

    let pipeline = IncrementalPipeline::new(
        store.clone(),
        SliceCollector::new(vec![1u32, 2, 3], 2),
        infallible(|id: u32| Row {
            id,
            name: format!("row-{id}"),
            score: None,
            tags: vec![],
        }),
        ParquetEncoder::new(),
        emitter.clone(),
    );
    pipeline.execute("rows")?;
    pipeline.execute("rows")?;

    let payloads = emitter.payloads();
    assert_eq!(payloads.len(), 2);
    let ids: Vec<u32> = payloads
        .iter()
        .map(|p| decode_parquet::<Row>(p))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(store.get("rows")?, "3");
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Contact {
    id: u64,
    address: Option<Address>,
}

#[test]
fn missing_optional_struct_flattens_to_nulls() -> Result<()> {
    let contacts = vec![
        Contact {
            id: 1,
            address: None,
        },
        Contact {
            id: 2,
            address: Some(Address {
                city: "Oslo".into(),
                zip: 150,
            }),
        },
    ];

    let bytes = ParquetEncoder::<Contact>::new().serialize(&contacts)?;
    let (schema, batches) = read_parquet_bytes(&bytes)?;
    let shape: Vec<(&str, bool)> = schema
        .fields()
        .iter()
        .map(|f| (f.name().as_str(), f.is_nullable()))
        .collect();
    assert_eq!(shape, vec![("id", false), ("city", true), ("zip", true)]);

    let batch = &batches[0];
    let city = batch.column_by_name("city").expect("city column");
    let zip = batch.column_by_name("zip").expect("zip column");
    assert_eq!(city.null_count(), 1);
    assert_eq!(zip.null_count(), 1);
    assert!(city.is_null(0) && zip.is_null(0));
    assert_eq!(city.as_string::<i32>().value(1), "Oslo");
    assert_eq!(zip.as_primitive::<UInt32Type>().value(1), 150);
    Ok(())
}

#[test]
fn column_types_use_plain_utf8_and_list() -> Result<()> {
    let bytes = ParquetEncoder::<Row>::new().serialize(&rows())?;
    let (schema, _) = read_parquet_bytes(&bytes)?;
    let types: Vec<DataType> = schema.fields().iter().map(|f| f.data_type().clone()).collect();

    assert_eq!(types[0], DataType::UInt32);
    assert_eq!(types[1], DataType::Utf8);
    assert_eq!(types[2], DataType::Float64);
    match &types[3] {
        DataType::List(item) => assert_eq!(item.data_type(), &DataType::Utf8),
        other => panic!("expected List<Utf8>, got {other:?}"),
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Shipment {
    id: u32,
    shipped_on: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    scanned_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    delivered_at: Option<DateTime<Utc>>,
}

#[test]
fn date_columns_are_stored_as_date64() -> Result<()> {
    let at = |d, h| Utc.with_ymd_and_hms(2024, 3, d, h, 30, 0).unwrap();
    let shipments = vec![
        Shipment {
            id: 1,
            shipped_on: "2024-03-01".into(),
            scanned_at: at(1, 8),
            delivered_at: Some(at(4, 12)),
        },
        Shipment {
            id: 2,
            shipped_on: "2024-03-02".into(),
            scanned_at: at(2, 9),
            delivered_at: None,
        },
    ];

    let encoder = ParquetEncoder::<Shipment>::new()
        .date_column("shipped_on", false)?
        .date_column("scanned_at", false)?
        .date_column("delivered_at", true)?;
    let bytes = encoder.serialize(&shipments)?;

    let (schema, batches) = read_parquet_bytes(&bytes)?;
    for name in ["shipped_on", "scanned_at", "delivered_at"] {
        let field = schema.field_with_name(name)?;
        assert_eq!(field.data_type(), &DataType::Date64, "column {name}");
    }
    assert!(schema.field_with_name("delivered_at")?.is_nullable());

    let batch = &batches[0];
    let shipped = batch.column_by_name("shipped_on").expect("shipped_on column");
    let midnight = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    assert_eq!(shipped.as_primitive::<Date64Type>().value(0), midnight.timestamp_millis());
    let scanned = batch.column_by_name("scanned_at").expect("scanned_at column");
    assert_eq!(scanned.as_primitive::<Date64Type>().value(1), shipments[1].scanned_at.timestamp_millis());
    assert!(batch.column_by_name("delivered_at").expect("delivered_at column").is_null(1));

    assert_eq!(decode_parquet::<Shipment>(&bytes)?, shipments);
    Ok(())
}

#[test]
fn unknown_date_column_is_reported() -> Result<()> {
    let encoder = ParquetEncoder::<Row>::new().date_column("created", false)?;
    assert!(encoder.serialize(&rows()).is_err());
    Ok(())
}
