//! `NS` RDATA definition.

use std::fmt::Display;
use std::io::Write;

use crate::error::EncodeError;
use crate::name::Name;

use super::RdataTrait;

/// A record containing the name of an authoritative name server.
/// [\[RFC 1035\]](https://www.rfc-editor.org/rfc/rfc1035)
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct NS {
    /// A domain name which specifies a host which should be authoritative for the specified class
    /// and domain.
    pub name: Name,
}

impl RdataTrait for NS {
    fn encode_rdata_into(&self, buf: &mut impl Write) -> Result<u16, EncodeError> {
        self.name.encode_into(buf)
    }

    fn canonicalize(&mut self) {
        self.name.canonicalize();
    }
}

impl Display for NS {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
