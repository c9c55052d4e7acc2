//! Custom error type definitions.

use std::path::PathBuf;

use thiserror::Error;

use crate::Name;

/// Errors that may arise while parsing zone data in presentation format or
/// while decoding RDATA fields.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid name length: must be smaller than 255, is {0}.")]
    NameTooLong(usize),

    #[error("Invalid label length in name: must be smaller than 64, is {0}.")]
    LabelTooLong(usize),

    #[error("Invalid name: labels must contain only a-z, A-Z, 0-9, underscores, and hyphens, and must not start or end with a hyphen.")]
    NameInvalidChars,

    #[error("Invalid name: contains an empty label.")]
    EmptyLabel,

    #[error("Unknown record type: {0}.")]
    UnknownRecordType(String),

    #[error("Unsupported class: only IN is supported, got {0}.")]
    UnsupportedClass(String),

    #[error("Invalid integer field: {0}.")]
    InvalidInteger(String),

    #[error("Invalid IP address: {0}.")]
    InvalidAddress(String),

    #[error("Invalid base64 data: {0}.")]
    InvalidBase64(String),

    #[error("Invalid hex data: {0}.")]
    InvalidHex(String),

    #[error("Invalid timestamp: expected YYYYMMDDHHMMSS or seconds since the epoch, got {0}.")]
    InvalidTimestamp(String),

    #[error("Invalid DNSKEY protocol field: must be 3, is {0}.")]
    InvalidDnskeyProtocol(u8),

    #[error("ZONEMD rdata too short: need at least 6 bytes, got {0}.")]
    ZonemdRdataTooShort(usize),

    #[error("Record data ended unexpectedly.")]
    UnexpectedEndOfEntry,

    #[error("Unbalanced parentheses in zone file.")]
    UnbalancedParentheses,

    #[error("Unterminated quoted string in zone file.")]
    UnterminatedString,

    #[error("Missing record owner name.")]
    MissingOwner,

    #[error("Unsupported zone file directive: {0}.")]
    UnsupportedDirective(String),

    #[error("Type {0} has no presentation format; use the \\# generic notation.")]
    GenericRdataRequired(String),

    #[error("Generic rdata length {declared} does not match {actual} data bytes.")]
    GenericRdataLength { declared: usize, actual: usize },

    #[error("line {0}: {1}")]
    AtLine(usize, Box<ParseError>),

    #[error("Error encoding record data.")]
    Encoding(#[from] EncodeError),

    #[error("IO error.")]
    IoError(#[from] std::io::Error),
}

impl ParseError {
    /// Wraps the error with the zone file line it was encountered on.
    pub fn at_line(self, line: usize) -> Self {
        match self {
            ParseError::AtLine(..) => self,
            other => ParseError::AtLine(line, Box::new(other)),
        }
    }
}

/// Errors that may arise during wire-format encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("Domain name too long: allowed are up to 255 bytes, got {0}.")]
    DomainTooLong(usize),

    #[error("Label too long: allowed are up to 63 bytes, got {0}.")]
    LabelTooLong(usize),

    #[error("Tried to encode non-ASCII string: {0}.")]
    NonAsciiString(String),

    #[error("Tried to create a record from unknown RDATA without a record type.")]
    UnknownRdataWithoutType,

    #[error("IO error.")]
    IoError(#[from] std::io::Error),
}

/// Errors that may arise while operating on a loaded zone.
#[derive(Debug, Error)]
pub enum ZoneError {
    #[error("No SOA record found at the zone apex.")]
    NoSoa,

    #[error("No ZONEMD record found at the zone apex. Use -p to add one.")]
    NoZonemd,

    #[error("Record owner '{0}' is out of zone.")]
    OutOfZone(Name),

    #[error("Unsupported digest type {0}.")]
    UnsupportedDigest(u8),

    #[error("Mismatched digest type: found {found} but wanted {wanted}.")]
    DigestTypeMismatch { found: u8, wanted: u8 },

    #[error("Error during parsing.")]
    Parsing(#[from] ParseError),

    #[error("Error during encoding.")]
    Encoding(#[from] EncodeError),

    #[error("Error during signing.")]
    Signing(#[from] SignError),

    #[error("IO error.")]
    IoError(#[from] std::io::Error),
}

/// Errors that may arise while loading a zone signing key or producing an
/// RRSIG with it.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("Could not read key file {path}.")]
    KeyFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed key file: {0}.")]
    MalformedKey(String),

    #[error("Unsupported signing algorithm {0}.")]
    UnsupportedAlgorithm(u8),

    #[error("Invalid record set: no records given.")]
    EmptyRrset,

    #[error("Invalid record set: not all records have the same owner name and record type.")]
    InvalidRrset,

    #[error("Could not parse the signature data.")]
    ParseSignature,

    #[error("Could not parse the public key data.")]
    ParseKey,

    #[error("The signature is invalid.")]
    InvalidSignature,

    #[error("Encoding during signing failed.")]
    EncodingFailed(#[from] EncodeError),
}
