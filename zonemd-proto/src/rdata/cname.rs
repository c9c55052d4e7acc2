//! `CNAME` RDATA definition.

use std::fmt::Display;
use std::io::Write;

use crate::error::EncodeError;
use crate::name::Name;

use super::RdataTrait;

/// A record aliasing one name to another, the canonical name.
/// [\[RFC 1035\]](https://www.rfc-editor.org/rfc/rfc1035)
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct CNAME {
    /// The canonical name for the record's owner.
    pub name: Name,
}

impl RdataTrait for CNAME {
    fn encode_rdata_into(&self, buf: &mut impl Write) -> Result<u16, EncodeError> {
        self.name.encode_into(buf)
    }

    fn canonicalize(&mut self) {
        self.name.canonicalize();
    }
}

impl Display for CNAME {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
