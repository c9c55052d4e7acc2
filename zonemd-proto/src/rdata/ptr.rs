//! `PTR` RDATA definition.

use std::fmt::Display;
use std::io::Write;

use crate::error::EncodeError;
use crate::name::Name;

use super::RdataTrait;

/// A record pointing to some location in the domain name space, most commonly
/// used for reverse lookups. [\[RFC 1035\]](https://www.rfc-editor.org/rfc/rfc1035)
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct PTR {
    /// The name this record points to.
    pub name: Name,
}

impl RdataTrait for PTR {
    fn encode_rdata_into(&self, buf: &mut impl Write) -> Result<u16, EncodeError> {
        self.name.encode_into(buf)
    }

    fn canonicalize(&mut self) {
        self.name.canonicalize();
    }
}

impl Display for PTR {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
