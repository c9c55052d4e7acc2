//! RDATA type definitions.

use std::fmt::Display;
use std::io::Write;

use data_encoding::HEXUPPER;

use crate::error::EncodeError;
use crate::RecordType;

pub mod a;
pub mod aaaa;
pub mod cname;
pub mod dnskey;
pub mod mx;
pub mod ns;
pub mod ptr;
pub mod rrsig;
pub mod soa;
pub mod txt;
pub mod zonemd;

pub use a::A;
pub use aaaa::AAAA;
pub use cname::CNAME;
pub use dnskey::DNSKEY;
pub use mx::MX;
pub use ns::NS;
pub use ptr::PTR;
pub use rrsig::RRSIG;
pub use soa::SOA;
pub use txt::TXT;
pub use zonemd::ZONEMD;

/// The record data (RDATA) for a [`Record`][super::Record].
#[derive(PartialEq, Eq, Clone, Debug)]
#[non_exhaustive]
pub enum Rdata {
    A(A),
    NS(NS),
    CNAME(CNAME),
    SOA(SOA),
    PTR(PTR),
    MX(MX),
    TXT(TXT),
    AAAA(AAAA),
    RRSIG(RRSIG),
    DNSKEY(DNSKEY),
    ZONEMD(ZONEMD),

    /// Unknown RDATA, containing the raw RDATA bytes.
    Unknown(Vec<u8>),
}

/// A trait for working with the different RDATA variants.
pub trait RdataTrait: Sized + Display {
    /// Encodes the RDATA into the given `buf` and returns the number of written bytes on success.
    ///
    /// If an error is returned, no guarantees for the state of `buf` are given.
    fn encode_rdata_into(&self, buf: &mut impl Write) -> Result<u16, EncodeError>;

    /// Ensures the RDATA is in canonical format, as defined in
    /// [RFC 4034, Section 6.2](https://www.rfc-editor.org/rfc/rfc4034#section-6.2).
    ///
    /// Canonical format means that for [`NS`], [`CNAME`], [`SOA`], [`PTR`], [`MX`], and [`RRSIG`],
    /// all [`Name`](crate::Name)s contained within the RDATA are in canonical format (see
    /// [`Name::canonicalize()`](crate::Name::canonicalize)).
    fn canonicalize(&mut self) {}

    /// Encodes the RDATA and returns the encoded bytes.
    fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let mut rdata = Vec::new();
        self.encode_rdata_into(&mut rdata)?;
        Ok(rdata)
    }
}

#[doc(hidden)]
macro_rules! impl_from_rtype {
    ($variant:ident) => {
        impl From<$variant> for Rdata {
            fn from(rdata: $variant) -> Self {
                Self::$variant(rdata)
            }
        }
    };
}

#[doc(hidden)]
macro_rules! impl_as_rtype {
    // shoutout to https://stackoverflow.com/a/43353854 for the idea to use a recursive macro and
    // stringify! to put $variant inside the doc comment
    ($method:ident, $method_mut:ident, $variant:ident, $doc:expr) => {
        #[doc = "Returns a reference to the inner [`"]
        #[doc = $doc]
        #[doc = "`] when called on the `"]
        #[doc = $doc]
        #[doc = "` variant. For all other variants, returns [`None`]."]
        pub fn $method(&self) -> Option<&$variant> {
            if let Self::$variant(inner) = self {
                Some(inner)
            } else {
                None
            }
        }

        #[doc = "Returns a mutable reference to the inner [`"]
        #[doc = $doc]
        #[doc = "`] when called on the `"]
        #[doc = $doc]
        #[doc = "` variant. For all other variants, returns [`None`]."]
        pub fn $method_mut(&mut self) -> Option<&mut $variant> {
            if let Self::$variant(ref mut inner) = self {
                Some(inner)
            } else {
                None
            }
        }
    };

    ($method:ident, $method_mut:ident, $variant:ident) => {
        impl_as_rtype!($method, $method_mut, $variant, stringify!($variant));
    };
}

/// Match on every [`Rdata`] variant and execute a block for it.
///
/// Matches $self, using $arm as the match arm for the non-[`Rdata::Unknown`] variants and
/// $unknown_arm as the match arm for the [`Rdata::Unknown`] variant. $inner and $inner_unknown are
/// the identifiers for the inner field that can be used in $arm and $unknown_arm, respectively.
///
/// # Examples
/// This is how [`Rdata::canonicalize()`] is implemented:
/// ```ignore
/// pub fn canonicalize(&mut self) {
///     match_rdata!(self, rdata, { rdata.canonicalize() }, _rdata, {})
/// }
/// ```
#[macro_export]
macro_rules! match_rdata {
    ($self:ident, $inner:ident, $arm:block, $inner_unknown:ident, $unknown_arm:block) => {
        match $self {
            Rdata::A($inner) => $arm,
            Rdata::NS($inner) => $arm,
            Rdata::CNAME($inner) => $arm,
            Rdata::SOA($inner) => $arm,
            Rdata::PTR($inner) => $arm,
            Rdata::MX($inner) => $arm,
            Rdata::TXT($inner) => $arm,
            Rdata::AAAA($inner) => $arm,
            Rdata::RRSIG($inner) => $arm,
            Rdata::DNSKEY($inner) => $arm,
            Rdata::ZONEMD($inner) => $arm,
            Rdata::Unknown($inner_unknown) => $unknown_arm,
        }
    };
}

impl Rdata {
    /// See [`RdataTrait::canonicalize()`].
    pub fn canonicalize(&mut self) {
        match_rdata!(self, rdata, { rdata.canonicalize() }, _rdata, {})
    }

    /// See [`RdataTrait::encode()`].
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        match_rdata!(self, rdata, { rdata.encode() }, unknown_rdata, {
            Ok(unknown_rdata.clone())
        })
    }

    /// See [`RdataTrait::encode_rdata_into()`].
    pub fn encode_into(&self, buf: &mut impl Write) -> Result<u16, EncodeError> {
        match_rdata!(
            self,
            rdata,
            { rdata.encode_rdata_into(buf) },
            unknown_rdata,
            {
                buf.write_all(unknown_rdata)?;
                Ok(unknown_rdata.len() as u16)
            }
        )
    }

    /// Returns the [`RecordType`] that matches this `RDATA`.
    ///
    /// [`Rdata::Unknown`] does not know its type, so calling this method on it
    /// returns [`None`]; the type is then carried by the record.
    pub fn rtype(&self) -> Option<RecordType> {
        match self {
            Rdata::A(_) => Some(RecordType::A),
            Rdata::NS(_) => Some(RecordType::NS),
            Rdata::CNAME(_) => Some(RecordType::CNAME),
            Rdata::SOA(_) => Some(RecordType::SOA),
            Rdata::PTR(_) => Some(RecordType::PTR),
            Rdata::MX(_) => Some(RecordType::MX),
            Rdata::TXT(_) => Some(RecordType::TXT),
            Rdata::AAAA(_) => Some(RecordType::AAAA),
            Rdata::RRSIG(_) => Some(RecordType::RRSIG),
            Rdata::DNSKEY(_) => Some(RecordType::DNSKEY),
            Rdata::ZONEMD(_) => Some(RecordType::ZONEMD),
            Rdata::Unknown(_) => None,
        }
    }

    impl_as_rtype!(as_a, as_mut_a, A);
    impl_as_rtype!(as_ns, as_mut_ns, NS);
    impl_as_rtype!(as_cname, as_mut_cname, CNAME);
    impl_as_rtype!(as_soa, as_mut_soa, SOA);
    impl_as_rtype!(as_ptr, as_mut_ptr, PTR);
    impl_as_rtype!(as_mx, as_mut_mx, MX);
    impl_as_rtype!(as_txt, as_mut_txt, TXT);
    impl_as_rtype!(as_aaaa, as_mut_aaaa, AAAA);
    impl_as_rtype!(as_rrsig, as_mut_rrsig, RRSIG);
    impl_as_rtype!(as_dnskey, as_mut_dnskey, DNSKEY);
    impl_as_rtype!(as_zonemd, as_mut_zonemd, ZONEMD);
}

impl_from_rtype!(A);
impl_from_rtype!(NS);
impl_from_rtype!(CNAME);
impl_from_rtype!(SOA);
impl_from_rtype!(PTR);
impl_from_rtype!(MX);
impl_from_rtype!(TXT);
impl_from_rtype!(AAAA);
impl_from_rtype!(RRSIG);
impl_from_rtype!(DNSKEY);
impl_from_rtype!(ZONEMD);

impl Display for Rdata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match_rdata!(self, rdata, { write!(f, "{}", rdata) }, data, {
            write!(f, "\\# {} {}", data.len(), HEXUPPER.encode(data))
        })
    }
}

/// Encodes a string as a character string as defined in
/// [RFC 1035](https://www.rfc-editor.org/rfc/rfc1035), i.e. writes the length of the string as a
/// byte and then the string bytes, into the given `buf`.
///
/// `string` must consist of only ASCII characters.
///
/// Returns the number of bytes written on success.
pub fn encode_string_into(
    string: impl AsRef<str>,
    buf: &mut impl Write,
) -> Result<u16, EncodeError> {
    let string = string.as_ref();

    if !string.is_ascii() {
        return Err(EncodeError::NonAsciiString(string.to_string()));
    }

    let len = string.len();
    buf.write_all(&(len as u8).to_be_bytes())?;
    write!(buf, "{}", string)?;
    Ok(1 + len as u16)
}
