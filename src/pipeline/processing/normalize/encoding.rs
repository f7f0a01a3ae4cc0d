use std::borrow::Cow;

use crate::error::{DedupError, Result};
use crate::metrics;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// A candidate text encoding for raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// Strict UTF-8; a leading BOM is dropped.
    Utf8,
    /// ISO-8859-1: every byte is the code point of the same value, so this never fails.
    Latin1,
    /// Any other WHATWG encoding, decoded without replacement characters.
    Whatwg(&'static encoding_rs::Encoding),
}

impl TextEncoding {
    /// Resolves a config label such as `utf-8`, `latin-1` or `cp1252`.
    pub fn from_label(label: &str) -> Result<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "utf-8" | "utf8" => Ok(TextEncoding::Utf8),
            // WHATWG folds these into windows-1252; keep the byte-for-byte meaning
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1" => Ok(TextEncoding::Latin1),
            "cp1252" => Ok(TextEncoding::Whatwg(encoding_rs::WINDOWS_1252)),
            _ => encoding_rs::Encoding::for_label(normalized.as_bytes())
                .map(TextEncoding::Whatwg)
                .ok_or_else(|| DedupError::Config(format!("Unknown encoding label: {}", label))),
        }
    }

    pub fn decode<'a>(&self, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
        match self {
            TextEncoding::Utf8 => {
                let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
                std::str::from_utf8(bytes).ok().map(Cow::Borrowed)
            }
            TextEncoding::Latin1 => Some(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())),
            TextEncoding::Whatwg(encoding) => {
                encoding.decode_without_bom_handling_and_without_replacement(bytes)
            }
        }
    }
}

/// Decodes `bytes` with the first candidate that succeeds.
///
/// Returns the text together with the label of the encoding that worked.
pub fn decode_first<'a>(bytes: &'a [u8], labels: &[String]) -> Result<(Cow<'a, str>, String)> {
    let candidates = labels
        .iter()
        .map(|label| TextEncoding::from_label(label).map(|enc| (label, enc)))
        .collect::<Result<Vec<_>>>()?;

    for (label, encoding) in candidates {
        match encoding.decode(bytes) {
            Some(text) => {
                tracing::debug!(encoding = %label, "Decoded input");
                return Ok((text, label.clone()));
            }
            None => {
                tracing::debug!(encoding = %label, "Candidate encoding rejected input");
                metrics::normalize::encoding_rejected(label);
            }
        }
    }

    Err(DedupError::Encoding {
        tried: labels.to_vec(),
    })
}
