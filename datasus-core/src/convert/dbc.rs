//! DBC decompression.
//!
//! A DBC file is a DBF whose record area was compressed with PKWARE DCL
//! "implode":
//!
//! ```text
//! [0 .. header_len)            DBF header, stored verbatim
//! [header_len .. header_len+4) CRC32 (ignored)
//! [header_len+4 ..)            imploded record data
//! ```
//!
//! `header_len` is the little-endian u16 at offset 8, as in any DBF header.

use super::ConvertError;
use std::fs;
use std::path::Path;

const HEADER_LEN_OFFSET: usize = 8;
const CRC_LEN: usize = 4;

/// Decompress DBC bytes into DBF bytes.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, ConvertError> {
    if data.len() < HEADER_LEN_OFFSET + 2 {
        return Err(ConvertError::Decompress(format!(
            "file too short for a DBC header ({} bytes)",
            data.len()
        )));
    }
    let header_len =
        u16::from_le_bytes([data[HEADER_LEN_OFFSET], data[HEADER_LEN_OFFSET + 1]]) as usize;
    let body_start = header_len + CRC_LEN;
    if header_len < HEADER_LEN_OFFSET + 2 || data.len() < body_start {
        return Err(ConvertError::Decompress(format!(
            "header length {header_len} inconsistent with file size {}",
            data.len()
        )));
    }

    let records = explode::explode(&data[body_start..])
        .map_err(|e| ConvertError::Decompress(format!("{e:?}")))?;

    let mut out = Vec::with_capacity(header_len + records.len());
    out.extend_from_slice(&data[..header_len]);
    out.extend_from_slice(&records);
    Ok(out)
}

/// Decompress the DBC at `raw` into a DBF at `structured`.
pub fn decompress_file(raw: &Path, structured: &Path) -> Result<(), ConvertError> {
    let data = fs::read(raw).map_err(|e| ConvertError::io(raw, e))?;
    let dbf = decompress(&data)?;
    fs::write(structured, dbf).map_err(|e| ConvertError::io(structured, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Reference implode stream for "AIAIAIAIAIAIA".
    const IMPLODED: [u8; 8] = [0x00, 0x04, 0x82, 0x24, 0x25, 0x8f, 0x80, 0x7f];

    fn dbc_bytes(header_len: u16) -> Vec<u8> {
        let mut header = vec![0u8; header_len as usize];
        header[0] = 0x03;
        header[8..10].copy_from_slice(&header_len.to_le_bytes());
        let mut data = header;
        data.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        data.extend_from_slice(&IMPLODED);
        data
    }

    #[test]
    fn keeps_header_and_explodes_body() {
        let out = decompress(&dbc_bytes(32)).unwrap();
        assert_eq!(out.len(), 32 + 13);
        assert_eq!(out[0], 0x03);
        assert_eq!(&out[8..10], &32u16.to_le_bytes());
        assert_eq!(&out[32..], b"AIAIAIAIAIAIA");
    }

    #[test]
    fn rejects_truncated_file() {
        assert!(matches!(
            decompress(&[0x03, 0, 0]),
            Err(ConvertError::Decompress(_))
        ));
    }

    #[test]
    fn rejects_header_longer_than_file() {
        let mut data = dbc_bytes(32);
        data[8..10].copy_from_slice(&500u16.to_le_bytes());
        assert!(matches!(decompress(&data), Err(ConvertError::Decompress(_))));
    }

    #[test]
    fn rejects_corrupt_body() {
        let mut data = dbc_bytes(32);
        data.truncate(36);
        data.extend_from_slice(&[0x07, 0xff, 0xff]);
        assert!(decompress(&data).is_err());
    }

    #[test]
    fn file_roundtrip() {
        let dir = TempDir::new().unwrap();
        let raw = dir.path().join("SPGO2504.dbc");
        let out = dir.path().join("SPGO2504.dbf");
        fs::write(&raw, dbc_bytes(32)).unwrap();

        decompress_file(&raw, &out).unwrap();
        let dbf = fs::read(&out).unwrap();
        assert_eq!(&dbf[32..], b"AIAIAIAIAIAIA");
    }

    #[test]
    fn missing_input_reports_path() {
        let dir = TempDir::new().unwrap();
        let err = decompress_file(&dir.path().join("nope.dbc"), &dir.path().join("x.dbf"))
            .unwrap_err();
        assert!(err.to_string().contains("nope.dbc"));
    }
}
