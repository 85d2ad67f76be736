//! JSON Lines (JSONL) encoding.
//!
//! - [`JsonlEncoder`] serializes a batch to one JSON document per line, each
//!   followed by `\n`. An empty batch encodes to zero bytes, which is a valid
//!   (empty) JSONL file.
//! - [`decode_jsonl`] parses such a blob back, skipping blank lines.

use crate::incremental::Encoder;
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::marker::PhantomData;

/// Encodes each record as a single line of JSON.
pub struct JsonlEncoder<T> {
    _t: PhantomData<fn(&T)>,
}

impl<T: Serialize> JsonlEncoder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self { _t: PhantomData }
    }
}

impl<T: Serialize> Default for JsonlEncoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize> Encoder<T> for JsonlEncoder<T> {
    fn serialize(&self, records: &[T]) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(records.len() * 64);
        for (i, item) in records.iter().enumerate() {
            serde_json::to_writer(&mut buf, item)
                .with_context(|| format!("serialize record #{i} as JSON"))?;
            buf.write_all(b"\n")?;
        }
        Ok(buf)
    }
}

/// Parse a JSONL blob into typed records. Whitespace-only lines are skipped.
///
/// # Errors
///
/// Returns an error if the blob is not UTF-8 or a line fails to parse into `T`.
pub fn decode_jsonl<T: DeserializeOwned>(data: &[u8]) -> Result<Vec<T>> {
    let text = std::str::from_utf8(data).context("JSONL payload is not valid UTF-8")?;
    let mut out = Vec::new();
    for (i, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let v: T = serde_json::from_str(line)
            .with_context(|| format!("parse JSONL line {}: {}", i + 1, line))?;
        out.push(v);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: u32,
        name: String,
    }

    #[test]
    fn one_line_per_record() -> Result<()> {
        let rows = vec![
            Row { id: 1, name: "a".into() },
            Row { id: 2, name: "b".into() },
        ];
        let bytes = JsonlEncoder::new().serialize(&rows)?;
        assert_eq!(
            std::str::from_utf8(&bytes)?,
            "{\"id\":1,\"name\":\"a\"}\n{\"id\":2,\"name\":\"b\"}\n"
        );
        assert_eq!(decode_jsonl::<Row>(&bytes)?, rows);
        Ok(())
    }

    #[test]
    fn empty_batch_is_empty_payload() -> Result<()> {
        let bytes = JsonlEncoder::<Row>::new().serialize(&[])?;
        assert!(bytes.is_empty());
        assert!(decode_jsonl::<Row>(&bytes)?.is_empty());
        Ok(())
    }

    #[test]
    fn blank_lines_are_skipped() -> Result<()> {
        let rows: Vec<u32> = decode_jsonl(b"1\n\n  \n2\n")?;
        assert_eq!(rows, vec![1, 2]);
        Ok(())
    }
}
