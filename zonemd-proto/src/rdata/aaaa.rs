//! `AAAA` RDATA definition.

use std::fmt::Display;
use std::io::Write;
use std::net::Ipv6Addr;

use crate::error::EncodeError;

use super::RdataTrait;

/// A record containing an IPv6 host address.
/// [\[RFC 3596\]](https://www.rfc-editor.org/rfc/rfc3596)
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct AAAA {
    /// The host's address.
    pub address: Ipv6Addr,
}

impl RdataTrait for AAAA {
    fn encode_rdata_into(&self, buf: &mut impl Write) -> Result<u16, EncodeError> {
        buf.write_all(&self.address.octets())?;
        // an IPv6 address has 16 bytes
        Ok(16)
    }
}

impl Display for AAAA {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}
