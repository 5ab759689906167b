//! Text encoding for the wire.
//!
//! Lines are decoded with the primary encoding first; anything it rejects is
//! decoded with the fallback. Outbound lines go the same way.

use crate::error::{Error, Result};
use encoding_rs::Encoding;
use tracing::warn;

pub const TERMINATOR: &str = "\r\n";

#[derive(Debug, Clone, Copy)]
pub struct LineCodec {
    primary: &'static Encoding,
    fallback: &'static Encoding,
}

impl LineCodec {
    /// Build a codec from two encoding labels, e.g. `"utf-8"` and `"latin1"`.
    pub fn new(primary: &str, fallback: &str) -> Result<Self> {
        Ok(Self {
            primary: lookup(primary)?,
            fallback: lookup(fallback)?,
        })
    }

    pub fn decode(&self, raw: &[u8]) -> Result<String> {
        if let Some(text) = self.primary.decode_without_bom_handling_and_without_replacement(raw) {
            return Ok(text.into_owned());
        }
        warn!(
            primary = self.primary.name(),
            fallback = self.fallback.name(),
            "Line is not valid in primary encoding, using fallback"
        );
        self.fallback
            .decode_without_bom_handling_and_without_replacement(raw)
            .map(|text| text.into_owned())
            .ok_or(Error::Encoding {
                direction: "decode",
                encoding: self.fallback.name(),
            })
    }

    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let (bytes, _, unmappable) = self.primary.encode(text);
        if !unmappable {
            return Ok(bytes.into_owned());
        }
        let (bytes, _, unmappable) = self.fallback.encode(text);
        if unmappable {
            return Err(Error::Encoding {
                direction: "encode",
                encoding: self.fallback.name(),
            });
        }
        Ok(bytes.into_owned())
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self {
            primary: encoding_rs::UTF_8,
            fallback: encoding_rs::WINDOWS_1252,
        }
    }
}

fn lookup(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.as_bytes()).ok_or_else(|| Error::UnknownEncoding(label.to_string()))
}

/// Escape embedded CR/LF so one `send` can never turn into two lines.
pub fn escape_line(text: &str) -> String {
    text.replace('\r', "\\r").replace('\n', "\\n")
}
