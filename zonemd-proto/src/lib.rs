//! `zonemd-proto` provides the DNS data types needed to compute and verify
//! message digests over zone contents, together with the means to encode them
//! to the uncompressed wire format, read and write zone master files, and sign
//! record sets.
//!
//! It is used as the backend for `zonemd`, a tool that computes, embeds, and
//! verifies ZONEMD records, but you can use this library on its own as well.
//!
//! # Basic usage example
//! ```rust
//! use zonemd_proto::{rdata, Class, Name, Record};
//!
//! let owner = Name::from_ascii("example.com").unwrap();
//! let rr = Record::new(
//!     owner,
//!     Class::IN,
//!     3600,
//!     rdata::NS {
//!         name: Name::from_ascii("ns.example.com").unwrap(),
//!     }
//!     .into(),
//! )
//! .unwrap();
//! let _wire = rr.wire().unwrap();
//! ```

use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::io::Write;

use byteorder::{NetworkEndian, WriteBytesExt};
use repr_with_fallback::repr_with_fallback;
use strum_macros::EnumString;

pub mod dnssec;
pub mod error;
pub mod master;
pub mod name;
pub mod rdata;

use error::EncodeError;

pub use name::Name;
pub use rdata::Rdata;

repr_with_fallback! {
    /// Represents a DNS TYPE.
    ///
    /// Only the types that commonly appear in signed zones are modelled with
    /// typed RDATA; everything else round-trips through [`Rdata::Unknown`].
    ///
    /// This enum is non-exhaustive, see
    /// [here](https://en.wikipedia.org/wiki/List_of_DNS_record_types) for a
    /// more comprehensive overview.
    #[derive(PartialEq, Eq, Copy, Clone, EnumString, Debug)]
    #[non_exhaustive]
    pub enum RecordType {
        A = 1,
        NS = 2,
        CNAME = 5,
        SOA = 6,
        PTR = 12,
        MX = 15,
        TXT = 16,
        AAAA = 28,
        RRSIG = 46,
        DNSKEY = 48,
        ZONEMD = 63,
        Unknown(u16),
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::Unknown(x) => write!(f, "TYPE{}", x),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// Represents a DNS CLASS.
///
/// Other classes than `IN` are included only for completeness and historical
/// reasons; zone digests are defined over `IN` data.
///
/// See [RFC 1035](https://www.rfc-editor.org/rfc/rfc1035) for further information.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
pub enum Class {
    IN,
    CH,
    HS,
    NONE,
    ANY,
}

impl Class {
    /// Encodes a `Class` as a two-byte value.
    pub fn encode(&self) -> u16 {
        match self {
            Class::IN => 1,
            Class::CH => 3,
            Class::HS => 4,
            Class::NONE => 254,
            Class::ANY => 255,
        }
    }
}

impl Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Represents a DNS resource record.
///
/// Records are immutable once stored in a zone; all mutation happens by
/// replacement. The encoded RDATA is cached alongside the typed form so that
/// hashing and canonical comparisons never have to re-encode.
///
/// See [RFC 1035](https://www.rfc-editor.org/rfc/rfc1035) for further information.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Record {
    /// The [`Name`] that this record is for.
    pub owner: Name,
    /// The type of this record.
    pub rtype: RecordType,
    /// The class of this record (will almost always be [`Class::IN`]).
    pub class: Class,
    /// The amount of seconds this record may be cached for.
    pub ttl: u32,
    // rdlength omitted as rdata knows its own length
    encoded_rdata: Vec<u8>,
    rdata: Rdata,
}

impl Record {
    /// Creates a new `Record` from typed [`Rdata`].
    ///
    /// Returns an error if `rdata` is [`Rdata::Unknown`] (use
    /// [`Record::from_raw_rdata()`] for that, as the raw form does not know
    /// its own type) or if `rdata` could not be encoded.
    pub fn new(owner: Name, class: Class, ttl: u32, rdata: Rdata) -> Result<Self, EncodeError> {
        let rtype = match rdata.rtype() {
            Some(rtype) => rtype,
            None => return Err(EncodeError::UnknownRdataWithoutType),
        };
        let encoded_rdata = rdata.encode()?;

        Ok(Self {
            owner,
            rtype,
            class,
            ttl,
            encoded_rdata,
            rdata,
        })
    }

    /// Creates a new `Record` carrying opaque RDATA bytes for the given type.
    ///
    /// This is the storage form for types without a typed RDATA model, e.g.
    /// records read from the RFC 3597 `\# <length> <hex>` notation.
    pub fn from_raw_rdata(
        owner: Name,
        rtype: RecordType,
        class: Class,
        ttl: u32,
        raw: Vec<u8>,
    ) -> Self {
        Self {
            owner,
            rtype,
            class,
            ttl,
            encoded_rdata: raw.clone(),
            rdata: Rdata::Unknown(raw),
        }
    }

    /// Encodes the record as it would appear in the answer section of an
    /// uncompressed DNS message: owner, type, class, TTL, RDLENGTH, RDATA.
    ///
    /// Returns an error if a method defined in [`byteorder::WriteBytesExt`]
    /// returns an error.
    pub fn encode_into(&self, buf: &mut impl Write) -> Result<(), EncodeError> {
        self.owner.encode_into(buf)?;
        buf.write_u16::<NetworkEndian>(self.rtype.into())?;
        buf.write_u16::<NetworkEndian>(self.class.encode())?;
        buf.write_u32::<NetworkEndian>(self.ttl)?;
        buf.write_u16::<NetworkEndian>(self.encoded_rdata.len() as u16)?;
        buf.write_all(&self.encoded_rdata)?;
        Ok(())
    }

    /// The same as [`encode_into()`](Self::encode_into()), but returns the
    /// encoded bytes in a newly allocated buffer.
    pub fn wire(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Compares two records in canonical DNS order: owner name (canonical,
    /// label by label), then type code, then class, then the wire-format
    /// RDATA bytes.
    ///
    /// The TTL does not participate, so two records that differ only in TTL
    /// compare equal here.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.owner
            .cmp(&other.owner)
            .then_with(|| u16::from(self.rtype).cmp(&u16::from(other.rtype)))
            .then_with(|| self.class.encode().cmp(&other.class.encode()))
            .then_with(|| self.encoded_rdata.cmp(&other.encoded_rdata))
    }

    /// Ensures the record is in canonical format, as defined in
    /// [RFC 4034, Section 6.2](https://www.rfc-editor.org/rfc/rfc4034#section-6.2):
    /// the owner name and all names embedded in the RDATA are lowercased, and
    /// the cached RDATA encoding is refreshed accordingly.
    pub fn canonicalize(&mut self) -> Result<(), EncodeError> {
        self.owner.canonicalize();
        self.rdata.canonicalize();
        self.encoded_rdata.clear();
        self.rdata.encode_into(&mut self.encoded_rdata)?;
        Ok(())
    }

    /// Replaces the record's RDATA, refreshing the cached encoding.
    ///
    /// The record type is left untouched; this is meant for replacing RDATA
    /// with an updated value of the same type (e.g. writing a computed digest
    /// into a ZONEMD placeholder).
    pub fn replace_rdata(&mut self, rdata: Rdata) -> Result<(), EncodeError> {
        self.encoded_rdata = rdata.encode()?;
        self.rdata = rdata;
        Ok(())
    }

    /// Returns a reference to the contained [`Rdata`].
    pub fn rdata(&self) -> &Rdata {
        &self.rdata
    }

    /// Returns the cached wire-format RDATA bytes.
    pub fn raw_rdata(&self) -> &[u8] {
        &self.encoded_rdata
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.owner, self.ttl, self.class, self.rtype, self.rdata
        )
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{Class, Name, Record, RecordType};
    use crate::rdata::{self, Rdata};

    fn a_record(owner: &str, addr: [u8; 4]) -> Record {
        Record::new(
            Name::from_ascii(owner).unwrap(),
            Class::IN,
            3600,
            rdata::A {
                address: addr.into(),
            }
            .into(),
        )
        .unwrap()
    }

    #[test]
    fn record_type_codes() {
        assert_eq!(u16::from(RecordType::ZONEMD), 63);
        assert_eq!(RecordType::from(46u16), RecordType::RRSIG);
        assert_eq!(RecordType::from(64000u16), RecordType::Unknown(64000));
        assert_eq!(RecordType::from_str("ZONEMD").ok(), Some(RecordType::ZONEMD));
        assert_eq!(RecordType::Unknown(64000).to_string(), "TYPE64000");
    }

    #[test]
    fn wire_format_layout() {
        let rr = a_record("example.com", [192, 0, 2, 1]);
        let wire = rr.wire().unwrap();
        // owner (13) + type (2) + class (2) + ttl (4) + rdlength (2) + rdata (4)
        assert_eq!(wire.len(), 27);
        assert_eq!(&wire[..13], b"\x07example\x03com\0");
        assert_eq!(&wire[13..17], &[0, 1, 0, 1]);
        assert_eq!(&wire[21..23], &[0, 4]);
        assert_eq!(&wire[23..], &[192, 0, 2, 1]);
    }

    #[test]
    fn canonical_order_owner_then_type_then_rdata() {
        let soa = Record::new(
            Name::from_ascii("example.com").unwrap(),
            Class::IN,
            3600,
            rdata::SOA {
                mname: Name::from_ascii("ns.example.com").unwrap(),
                rname: Name::from_ascii("root.example.com").unwrap(),
                serial: 1,
                refresh: 7200,
                retry: 3600,
                expire: 1209600,
                minimum: 3600,
            }
            .into(),
        )
        .unwrap();
        let apex_a = a_record("example.com", [192, 0, 2, 1]);
        let apex_a2 = a_record("example.com", [192, 0, 2, 2]);
        let sub = a_record("a.example.com", [192, 0, 2, 1]);

        let mut records = vec![sub.clone(), soa.clone(), apex_a2.clone(), apex_a.clone()];
        records.sort_by(Record::canonical_cmp);
        assert_eq!(records, vec![apex_a, apex_a2, soa, sub]);
    }

    #[test]
    fn canonical_cmp_ignores_ttl_and_case() {
        let mut a = a_record("EXAMPLE.com", [192, 0, 2, 1]);
        a.ttl = 60;
        let b = a_record("example.com", [192, 0, 2, 1]);
        assert_eq!(a.canonical_cmp(&b), std::cmp::Ordering::Equal);
    }

    #[test]
    fn raw_rdata_record_keeps_bytes() {
        let rr = Record::from_raw_rdata(
            Name::from_ascii("example.com").unwrap(),
            RecordType::Unknown(64000),
            Class::IN,
            300,
            vec![0xde, 0xad, 0xbe, 0xef],
        );
        assert_eq!(rr.raw_rdata(), &[0xde, 0xad, 0xbe, 0xef]);
        assert!(matches!(rr.rdata(), Rdata::Unknown(_)));
    }
}
