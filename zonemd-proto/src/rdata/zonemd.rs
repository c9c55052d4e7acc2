//! `ZONEMD` RDATA definition and codec.
//!
//! The ZONEMD record anchors a message digest over the whole zone at the
//! apex. Its RDATA is the SOA serial the digest was computed for, a digest
//! type, a reserved parameter byte (always written as zero, ignored on read),
//! and the digest bytes themselves.
//!
//! Two physical encodings are accepted on read: the typed form produced by
//! the zone file parser when it recognises the ZONEMD mnemonic, and the
//! opaque blob form ([`Rdata::Unknown`]) produced by the RFC 3597 generic
//! notation. Both share the exact wire layout, so they hash identically; the
//! helpers at the bottom of this module work on records in either form and
//! preserve the form on update.

use std::fmt::Display;
use std::io::{Cursor, Read, Write};

use byteorder::{NetworkEndian, ReadBytesExt, WriteBytesExt};
use data_encoding::HEXUPPER;
use repr_with_fallback::repr_with_fallback;

use crate::error::{EncodeError, ParseError, ZoneError};
use crate::{Rdata, Record};

use super::RdataTrait;

repr_with_fallback! {
    /// Digest algorithms for the [`ZONEMD`] record.
    ///
    /// Only SHA-384 has a registered value so far; the design leaves room for
    /// more.
    #[derive(PartialEq, Eq, Copy, Clone, Debug)]
    #[non_exhaustive]
    pub enum DigestType {
        SHA384 = 1,
        Unassigned(u8),
    }
}

impl DigestType {
    /// Returns the digest length in bytes, or [`None`] for digest types this
    /// implementation does not know.
    pub fn digest_len(&self) -> Option<usize> {
        match self {
            DigestType::SHA384 => Some(48),
            DigestType::Unassigned(_) => None,
        }
    }
}

impl Display for DigestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}

/// A record containing a message digest over the zone's contents.
///
/// See [draft-wessels-dns-zone-digest](https://datatracker.ietf.org/doc/draft-wessels-dns-zone-digest/).
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct ZONEMD {
    /// The SOA serial of the zone the digest was computed over.
    pub serial: u32,
    /// The digest algorithm; determines the length of [`Self::digest`].
    pub digest_type: DigestType,
    /// The digest bytes. All zeroes in a placeholder record.
    pub digest: Vec<u8>,
}

impl ZONEMD {
    /// Creates a placeholder `ZONEMD` with an all-zero digest of the correct
    /// length for `digest_type`.
    ///
    /// Returns [`ZoneError::UnsupportedDigest`] for digest types without a
    /// known length.
    pub fn placeholder(serial: u32, digest_type: DigestType) -> Result<Self, ZoneError> {
        let len = digest_type
            .digest_len()
            .ok_or(ZoneError::UnsupportedDigest(digest_type.into()))?;
        Ok(Self {
            serial,
            digest_type,
            digest: vec![0; len],
        })
    }

    /// Parses `ZONEMD` fields from wire-format RDATA bytes.
    ///
    /// The parameter byte is skipped; it is reserved and always written as
    /// zero.
    pub fn unpack(rdata: &[u8]) -> Result<Self, ParseError> {
        if rdata.len() < 6 {
            return Err(ParseError::ZonemdRdataTooShort(rdata.len()));
        }

        let mut rdata = Cursor::new(rdata);
        let serial = rdata.read_u32::<NetworkEndian>()?;
        let digest_type: DigestType = rdata.read_u8()?.into();
        // skip over the reserved parameter field
        let _parameter = rdata.read_u8()?;
        let mut digest = Vec::new();
        rdata.read_to_end(&mut digest)?;

        Ok(Self {
            serial,
            digest_type,
            digest,
        })
    }

    /// Returns a copy with the digest bytes zeroed out.
    ///
    /// For a known digest type the zeroed digest has the canonical length for
    /// that type; for unknown types the stored length is kept. This is the
    /// substitution the canonicalizer applies to the apex ZONEMD so the
    /// digest can cover the record that will eventually hold it.
    pub fn zeroed(&self) -> Self {
        let len = self.digest_type.digest_len().unwrap_or(self.digest.len());
        Self {
            serial: self.serial,
            digest_type: self.digest_type,
            digest: vec![0; len],
        }
    }
}

impl RdataTrait for ZONEMD {
    fn encode_rdata_into(&self, buf: &mut impl Write) -> Result<u16, EncodeError> {
        buf.write_u32::<NetworkEndian>(self.serial)?;
        buf.write_u8(self.digest_type.into())?;
        // reserved parameter field
        buf.write_u8(0)?;
        buf.write_all(&self.digest)?;

        Ok(self.digest.len() as u16 + 4 + 1 + 1)
    }
}

impl Display for ZONEMD {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} 0 {}",
            self.serial,
            self.digest_type,
            HEXUPPER.encode(&self.digest)
        )
    }
}

/// Parses the `ZONEMD` fields out of a record, accepting both the typed and
/// the opaque-blob encoding.
pub fn unpack_record(rr: &Record) -> Result<ZONEMD, ParseError> {
    // the cached RDATA encoding has the same layout in both forms
    ZONEMD::unpack(rr.raw_rdata())
}

/// Writes a freshly computed digest into a placeholder record, preserving the
/// record's physical encoding.
///
/// Fails with [`ZoneError::DigestTypeMismatch`] if the record's stored digest
/// type differs from `digest_type`.
pub fn update_record_digest(
    rr: &mut Record,
    digest_type: DigestType,
    digest: &[u8],
) -> Result<(), ZoneError> {
    let old = unpack_record(rr)?;
    if old.digest_type != digest_type {
        return Err(ZoneError::DigestTypeMismatch {
            found: old.digest_type.into(),
            wanted: digest_type.into(),
        });
    }

    let new = ZONEMD {
        serial: old.serial,
        digest_type,
        digest: digest.to_vec(),
    };
    store_back(rr, new)?;
    Ok(())
}

/// Replaces a record's digest bytes with zeroes, preserving the record's
/// physical encoding. See [`ZONEMD::zeroed()`].
pub fn zero_record_digest(rr: &mut Record) -> Result<(), ZoneError> {
    let zeroed = unpack_record(rr)?.zeroed();
    store_back(rr, zeroed)?;
    Ok(())
}

/// Writes `new` back into `rr` in the same physical encoding the record
/// already carries.
fn store_back(rr: &mut Record, new: ZONEMD) -> Result<(), EncodeError> {
    let rdata = match rr.rdata() {
        Rdata::Unknown(_) => Rdata::Unknown(new.encode()?),
        _ => Rdata::ZONEMD(new),
    };
    rr.replace_rdata(rdata)
}

#[cfg(test)]
mod tests {
    use crate::error::{ParseError, ZoneError};
    use crate::{Class, Name, Record, RecordType};

    use super::{
        unpack_record, update_record_digest, zero_record_digest, DigestType, RdataTrait, ZONEMD,
    };

    fn typed_record(zonemd: ZONEMD) -> Record {
        Record::new(
            Name::from_ascii("example.com").unwrap(),
            Class::IN,
            3600,
            zonemd.into(),
        )
        .unwrap()
    }

    fn blob_record(zonemd: &ZONEMD) -> Record {
        Record::from_raw_rdata(
            Name::from_ascii("example.com").unwrap(),
            RecordType::ZONEMD,
            Class::IN,
            3600,
            zonemd.encode().unwrap(),
        )
    }

    #[test]
    fn pack_unpack_round_trip() {
        let zonemd = ZONEMD {
            serial: 2018093000,
            digest_type: DigestType::SHA384,
            digest: vec![0xab; 48],
        };
        let packed = zonemd.encode().unwrap();
        assert_eq!(packed.len(), 4 + 1 + 1 + 48);
        assert_eq!(&packed[..4], &2018093000u32.to_be_bytes());
        assert_eq!(packed[4], 1);
        assert_eq!(packed[5], 0);

        assert_eq!(ZONEMD::unpack(&packed).unwrap(), zonemd);
    }

    #[test]
    fn unpack_ignores_parameter_byte() {
        let mut packed = ZONEMD::placeholder(7, DigestType::SHA384)
            .unwrap()
            .encode()
            .unwrap();
        packed[5] = 0xff;
        let unpacked = ZONEMD::unpack(&packed).unwrap();
        assert_eq!(unpacked.serial, 7);
        assert_eq!(unpacked.digest_type, DigestType::SHA384);
    }

    #[test]
    fn unpack_rejects_short_rdata() {
        assert!(matches!(
            ZONEMD::unpack(&[0, 0, 0, 1, 1]),
            Err(ParseError::ZonemdRdataTooShort(5))
        ));
    }

    #[test]
    fn both_encodings_share_wire_bytes() {
        let zonemd = ZONEMD {
            serial: 42,
            digest_type: DigestType::SHA384,
            digest: vec![0x11; 48],
        };
        let typed = typed_record(zonemd.clone());
        let blob = blob_record(&zonemd);
        assert_eq!(typed.wire().unwrap(), blob.wire().unwrap());
        assert_eq!(unpack_record(&typed).unwrap(), unpack_record(&blob).unwrap());
    }

    #[test]
    fn update_preserves_encoding_form() {
        let placeholder = ZONEMD::placeholder(1, DigestType::SHA384).unwrap();
        let digest = vec![0xcd; 48];

        let mut typed = typed_record(placeholder.clone());
        update_record_digest(&mut typed, DigestType::SHA384, &digest).unwrap();
        assert!(typed.rdata().as_zonemd().is_some());

        let mut blob = blob_record(&placeholder);
        update_record_digest(&mut blob, DigestType::SHA384, &digest).unwrap();
        assert!(blob.rdata().as_zonemd().is_none());

        // identical on the wire regardless of form
        assert_eq!(typed.wire().unwrap(), blob.wire().unwrap());
        assert_eq!(unpack_record(&typed).unwrap().digest, digest);
    }

    #[test]
    fn update_rejects_digest_type_change() {
        let mut rr = typed_record(ZONEMD::placeholder(1, DigestType::SHA384).unwrap());
        let err = update_record_digest(&mut rr, DigestType::Unassigned(2), &[0; 48]);
        assert!(matches!(
            err,
            Err(ZoneError::DigestTypeMismatch { found: 1, wanted: 2 })
        ));
    }

    #[test]
    fn zeroed_uses_canonical_length_for_known_types() {
        // a known digest type with a wrong stored length zeroes to 48 bytes
        let mut rr = typed_record(ZONEMD {
            serial: 1,
            digest_type: DigestType::SHA384,
            digest: vec![0xee; 20],
        });
        zero_record_digest(&mut rr).unwrap();
        assert_eq!(unpack_record(&rr).unwrap().digest, vec![0; 48]);

        // an unknown digest type keeps the stored length
        let mut rr = typed_record(ZONEMD {
            serial: 1,
            digest_type: DigestType::Unassigned(200),
            digest: vec![0xee; 20],
        });
        zero_record_digest(&mut rr).unwrap();
        assert_eq!(unpack_record(&rr).unwrap().digest, vec![0; 20]);
    }
}
