//! `A` RDATA definition.

use std::fmt::Display;
use std::io::Write;
use std::net::Ipv4Addr;

use crate::error::EncodeError;

use super::RdataTrait;

/// A record containing an IPv4 host address. [\[RFC 1035\]](https://www.rfc-editor.org/rfc/rfc1035)
///
/// Hosts that have multiple Internet addresses will have multiple `A` records.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub struct A {
    /// The host's address.
    pub address: Ipv4Addr,
}

impl RdataTrait for A {
    fn encode_rdata_into(&self, buf: &mut impl Write) -> Result<u16, EncodeError> {
        buf.write_all(&self.address.octets())?;
        // an IPv4 address has 4 bytes
        Ok(4)
    }
}

impl Display for A {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.address)
    }
}
