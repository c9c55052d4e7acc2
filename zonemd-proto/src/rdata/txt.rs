//! `TXT` RDATA definition.

use std::fmt::Display;
use std::io::Write;

use crate::error::EncodeError;

use super::{encode_string_into, RdataTrait};

/// A record containing text strings. [\[RFC 1035\]](https://www.rfc-editor.org/rfc/rfc1035)
///
/// `TXT` records are used to hold descriptive text. The semantics of the text depends on the
/// domain where it is found.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct TXT {
    /// One or more strings.
    pub text: Vec<String>,
}

impl RdataTrait for TXT {
    fn encode_rdata_into(&self, buf: &mut impl Write) -> Result<u16, EncodeError> {
        let mut bytes_written = 0;
        for string in &self.text {
            bytes_written += encode_string_into(string, buf)?;
        }
        Ok(bytes_written)
    }
}

impl Display for TXT {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let texts: Vec<_> = self
            .text
            .iter()
            .map(|text| {
                // we need to escape any eventual quotes in the string if we want to print the
                // strings quoted
                let text = text.replace('"', "\\\"");
                format!("\"{}\"", text)
            })
            .collect();
        let texts = texts.join(" ");
        write!(f, "{}", texts)
    }
}
