//! PDF object assembly on `lopdf`.
//!
//! Objects are numbered up front (`reserve`) so they can reference each
//! other before their bodies exist; `finish` fills in the trailer and lets
//! `lopdf` write the body, cross reference table and trailer.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};

use crate::domain::export::CompressionOptions;

use super::super::RenderError;

#[derive(Debug)]
pub(super) struct PdfWriter {
    document: lopdf::Document,
}

impl PdfWriter {
    pub(super) fn new() -> Self {
        Self {
            document: lopdf::Document::with_version("1.7"),
        }
    }

    pub(super) fn reserve(&mut self) -> ObjectId {
        self.document.new_object_id()
    }

    pub(super) fn set(&mut self, id: ObjectId, object: impl Into<Object>) {
        self.document.objects.insert(id, object.into());
    }

    pub(super) fn add(&mut self, object: impl Into<Object>) -> ObjectId {
        self.document.add_object(object.into())
    }

    /// Encodes a content stream, deflating it at the configured level when
    /// compression is on.
    pub(super) fn add_content(
        &mut self,
        operations: Vec<Operation>,
        compression: &CompressionOptions,
    ) -> Result<ObjectId, RenderError> {
        let data = Content { operations }
            .encode()
            .map_err(|e| RenderError::Serialization(format!("content stream: {}", e)))?;

        // lopdf's own `compress` always deflates at its fixed level.
        let stream = if compression.enabled {
            Stream::new(dictionary! { "Filter" => "FlateDecode" }, deflate(&data, compression.level)?)
        } else {
            Stream::new(Dictionary::new(), data)
        };
        Ok(self.add(stream))
    }

    /// Serializes the whole file.
    ///
    /// Fails if any reserved object never received a body.
    pub(super) fn finish(mut self, root: ObjectId, info: ObjectId, file_id: Vec<u8>) -> Result<Vec<u8>, RenderError> {
        if let Some(missing) = (1..=self.document.max_id).find(|n| !self.document.objects.contains_key(&(*n, 0))) {
            return Err(RenderError::Stream(format!(
                "object {} was reserved but never written",
                missing
            )));
        }

        let id = Object::String(file_id, StringFormat::Hexadecimal);
        self.document.trailer.set("Root", Object::Reference(root));
        self.document.trailer.set("Info", Object::Reference(info));
        self.document.trailer.set("ID", Object::Array(vec![id.clone(), id]));

        let mut out = Vec::new();
        self.document
            .save_to(&mut out)
            .map_err(|e| RenderError::Serialization(format!("pdf write failed: {}", e)))?;
        Ok(out)
    }
}

fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>, RenderError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(u32::from(level.min(9))));
    encoder
        .write_all(data)
        .map_err(|e| RenderError::Stream(format!("deflate failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| RenderError::Stream(format!("deflate failed: {}", e)))
}

// ════════════════════════════════════════════════════════════════════════════
// String encoding
// ════════════════════════════════════════════════════════════════════════════

/// Maps text to WinAnsiEncoding bytes for the standard 14 fonts.
///
/// Characters with no WinAnsi code point become `?`; control characters
/// other than tab are dropped and tabs become spaces.
pub(super) fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .filter_map(|c| match c {
            '\t' => Some(b' '),
            c if c.is_control() => None,
            ' '..='~' => Some(c as u8),
            '\u{00A0}'..='\u{00FF}' => Some(c as u32 as u8),
            '€' => Some(0x80),
            '…' => Some(0x85),
            '‘' => Some(0x91),
            '’' => Some(0x92),
            '“' => Some(0x93),
            '”' => Some(0x94),
            '•' => Some(0x95),
            '–' => Some(0x96),
            '—' => Some(0x97),
            _ => Some(b'?'),
        })
        .collect()
}

/// Text string for dictionaries (titles, outline entries): UTF-16BE with a
/// byte order mark, so any Unicode survives.
pub(super) fn text_string(text: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(bytes: &[u8]) -> lopdf::Document {
        lopdf::Document::load_mem(bytes).unwrap()
    }

    #[test]
    fn win_ansi_maps_typographic_characters() {
        assert_eq!(win_ansi("A–B"), vec![b'A', 0x96, b'B']);
        assert_eq!(win_ansi("é"), vec![0xE9]);
        assert_eq!(win_ansi("漢"), vec![b'?']);
        assert_eq!(win_ansi("a\tb\u{7}"), b"a b".to_vec());
    }

    #[test]
    fn text_string_is_utf16_with_bom() {
        match text_string("Hi") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, b'H', 0x00, b'i']);
            }
            other => panic!("unexpected object {:?}", other),
        }
    }

    #[test]
    fn finish_writes_a_loadable_file() {
        let mut writer = PdfWriter::new();
        let root = writer.add(dictionary! { "Type" => "Catalog" });
        let info = writer.add(Dictionary::new());
        let bytes = writer.finish(root, info, vec![0xAB; 16]).unwrap();

        assert!(bytes.starts_with(b"%PDF-1.7"));
        assert!(String::from_utf8_lossy(&bytes).trim_end().ends_with("%%EOF"));
        let pdf = load(&bytes);
        assert_eq!(pdf.trailer.get(b"Root").unwrap().as_reference().unwrap(), root);
    }

    #[test]
    fn unwritten_reservation_is_an_error() {
        let mut writer = PdfWriter::new();
        let root = writer.reserve();
        let info = writer.add(Dictionary::new());
        assert!(writer.finish(root, info, vec![0; 16]).is_err());
    }

    #[test]
    fn compressed_content_round_trips() {
        let operations = vec![Operation::new("BT", vec![]), Operation::new("ET", vec![])];
        let plain = Content {
            operations: operations.clone(),
        }
        .encode()
        .unwrap();

        let mut writer = PdfWriter::new();
        let options = CompressionOptions { enabled: true, level: 9 };
        let id = writer.add_content(operations, &options).unwrap();
        let info = writer.add(Dictionary::new());
        let bytes = writer.finish(id, info, vec![0; 16]).unwrap();

        let pdf = load(&bytes);
        let stream = pdf.get_object(id).unwrap().as_stream().unwrap();
        assert_eq!(stream.dict.get(b"Filter").unwrap().as_name().unwrap(), b"FlateDecode");
        assert_eq!(stream.decompressed_content().unwrap(), plain);
    }
}
