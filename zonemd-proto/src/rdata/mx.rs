//! `MX` RDATA definition.

use std::fmt::Display;
use std::io::Write;

use byteorder::{NetworkEndian, WriteBytesExt};

use crate::error::EncodeError;
use crate::name::Name;

use super::RdataTrait;

/// A record specifying a mail exchange host for the owner domain.
/// [\[RFC 1035\]](https://www.rfc-editor.org/rfc/rfc1035)
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct MX {
    /// The preference given to this record among others at the same owner.
    /// Lower values are preferred.
    pub preference: u16,
    /// A host willing to act as a mail exchange for the owner name.
    pub exchange: Name,
}

impl RdataTrait for MX {
    fn encode_rdata_into(&self, buf: &mut impl Write) -> Result<u16, EncodeError> {
        buf.write_u16::<NetworkEndian>(self.preference)?;
        let bytes_written = self.exchange.encode_into(buf)?;
        Ok(bytes_written + 2)
    }

    fn canonicalize(&mut self) {
        self.exchange.canonicalize();
    }
}

impl Display for MX {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.preference, self.exchange)
    }
}
