//! DNSSEC signing of record sets with a zone signing key.
//!
//! The only consumer in this workspace signs the apex ZONEMD RRset after the
//! digest has been computed, but the signer is type-agnostic and works for
//! any RRset.

use std::fs;
use std::path::Path;

use chrono::Utc;
use data_encoding::BASE64;
use ecdsa::signature::Signer;
use p256::ecdsa::SigningKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use sha2::{Digest, Sha256};

use crate::error::{EncodeError, SignError};
use crate::rdata::dnskey::{Algorithm, DNSKEY};
use crate::rdata::RRSIG;
use crate::{Class, Record};

/// Default RRSIG validity period in seconds (four weeks).
const DEFAULT_VALIDITY: u32 = 2_419_200;

/// A private zone signing key, loaded from a BIND-format key file.
pub struct ZoneSigningKey {
    algorithm: Algorithm,
    key: SigningKey,
}

impl ZoneSigningKey {
    /// Loads a key from a BIND-format private key file, as written by
    /// `dnssec-keygen` (a `.private` file).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SignError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SignError::KeyFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bind_format(&text)
    }

    /// Parses the BIND private key format: `Field: value` lines, of which
    /// `Algorithm` and `PrivateKey` are the ones that matter here.
    pub fn from_bind_format(text: &str) -> Result<Self, SignError> {
        let mut algorithm = None;
        let mut private_key = None;

        for line in text.lines() {
            let (field, value) = match line.split_once(':') {
                Some(parts) => parts,
                None => continue,
            };
            let value = value.trim();
            match field.trim() {
                "Algorithm" => {
                    // the value looks like "13 (ECDSAP256SHA256)"
                    let number = value.split_whitespace().next().unwrap_or(value);
                    let number: u8 = number.parse().map_err(|_| {
                        SignError::MalformedKey(format!("unparseable algorithm '{}'", value))
                    })?;
                    algorithm = Some(Algorithm::from(number));
                }
                "PrivateKey" => {
                    let bytes = BASE64.decode(value.as_bytes()).map_err(|_| {
                        SignError::MalformedKey("PrivateKey is not valid base64".to_string())
                    })?;
                    private_key = Some(bytes);
                }
                _ => (),
            }
        }

        let algorithm =
            algorithm.ok_or_else(|| SignError::MalformedKey("missing Algorithm".to_string()))?;
        let private_key =
            private_key.ok_or_else(|| SignError::MalformedKey("missing PrivateKey".to_string()))?;

        match algorithm {
            Algorithm::ECDSAP256SHA256 => {
                let key =
                    SigningKey::from_bytes(&private_key).map_err(|_| SignError::ParseKey)?;
                Ok(Self { algorithm, key })
            }
            other => Err(SignError::UnsupportedAlgorithm(other.into())),
        }
    }

    /// Returns the key's algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Derives the public [`DNSKEY`] RDATA for this key, with the zone flag
    /// set.
    pub fn dnskey(&self) -> DNSKEY {
        let point = self.key.verifying_key().to_encoded_point(false);
        // strip the 0x04 uncompressed-point tag; DNSKEY stores the raw x || y
        let key = point.as_bytes()[1..].to_vec();
        DNSKEY {
            zone: true,
            revoked: false,
            secure_entry_point: false,
            algorithm: self.algorithm,
            key,
        }
    }

    /// Returns the key tag of the derived [`DNSKEY`]. See
    /// [`DNSKEY::key_tag()`].
    pub fn key_tag(&self) -> u16 {
        self.dnskey().key_tag()
    }

    /// Signs the given record set and returns the RRSIG record covering it.
    ///
    /// All records must share one owner, type, and class. The signer name is
    /// the (canonicalized) owner of the set, which for the ZONEMD RRset is
    /// the zone apex.
    pub fn sign_rrset(
        &self,
        rrset: &[Record],
        inception: u32,
        expiration: u32,
    ) -> Result<Record, SignError> {
        let first = rrset.first().ok_or(SignError::EmptyRrset)?;
        let mut signer_name = first.owner.clone();
        signer_name.canonicalize();

        let mut rrsig = RRSIG {
            type_covered: first.rtype,
            algorithm: self.algorithm,
            labels: first.owner.label_count(),
            original_ttl: first.ttl,
            signature_expiration: expiration,
            signature_inception: inception,
            key_tag: self.key_tag(),
            signer_name,
            signature: Vec::new(),
        };

        let data = signed_data(&rrsig, rrset)?;
        let signature: p256::ecdsa::Signature = self.key.sign(&data);
        // the fixed encoding is r || s, 64 bytes, which is exactly the RRSIG
        // signature field format for this algorithm
        rrsig.signature = signature.as_ref().to_vec();

        Record::new(first.owner.clone(), Class::IN, first.ttl, rrsig.into())
            .map_err(SignError::EncodingFailed)
    }
}

/// Validates an RRSIG over the given record set using the given DNSKEY RDATA.
///
/// This is the inverse of [`ZoneSigningKey::sign_rrset()`] and mainly serves
/// round-trip checks; resolver-grade validation (validity windows, chains of
/// trust) is out of scope here.
pub fn verify_rrsig(
    rrset: &[Record],
    rrsig_record: &Record,
    dnskey: &DNSKEY,
) -> Result<(), SignError> {
    let rrsig = rrsig_record
        .rdata()
        .as_rrsig()
        .ok_or(SignError::InvalidRrset)?;
    let first = rrset.first().ok_or(SignError::EmptyRrset)?;
    if rrsig.type_covered != first.rtype || rrsig_record.owner != first.owner {
        return Err(SignError::InvalidRrset);
    }

    let data = signed_data(rrsig, rrset)?;
    dnskey.validate(&data, &rrsig.signature)
}

/// Builds the byte sequence covered by an RRSIG: the RRSIG RDATA without the
/// signature field, followed by the record set in canonical form (lowercased
/// names, original TTL, sorted by RDATA, duplicates removed). See
/// [RFC 4034, Section 3.1.8.1](https://www.rfc-editor.org/rfc/rfc4034#section-3.1.8.1).
fn signed_data(rrsig: &RRSIG, rrset: &[Record]) -> Result<Vec<u8>, SignError> {
    let first = rrset.first().ok_or(SignError::EmptyRrset)?;
    if rrset
        .iter()
        .any(|rec| rec.rtype != first.rtype || rec.owner != first.owner || rec.class != first.class)
    {
        return Err(SignError::InvalidRrset);
    }

    let mut records = rrset.to_vec();
    for rec in records.iter_mut() {
        rec.ttl = rrsig.original_ttl;
        rec.canonicalize().map_err(SignError::EncodingFailed)?;
    }

    // because of lifetime issues, we cannot just do
    // `records.sort_unstable_by_key(|rec| rec.raw_rdata())`.
    // the solution is to create a temporary array containing the encoded rdata,
    // sort that and apply the same permutation to `records`.
    let temp_rdata: Vec<_> = records.iter().map(|rec| rec.raw_rdata().to_vec()).collect();
    let mut perm = permutation::sort(&temp_rdata);
    perm.apply_slice_in_place(&mut records);

    /*
    From RFC 4034, Section 6.3:
        RFC 2181 specifies that an RRset is not allowed to contain duplicate records (multiple
        RRs with the same owner name, class, type, and RDATA). [...] If the implementation
        chooses to handle this protocol error in the spirit of the robustness principle (being
        liberal in what it accepts), it MUST remove all but one of the duplicate RR(s) for the
        purposes of calculating the canonical form of the RRset.
    */
    records.dedup_by_key(|rec| Sha256::digest(rec.raw_rdata()));

    let mut data = Vec::with_capacity(1024);
    rrsig
        .encode_into_without_signature(&mut data)
        .map_err(SignError::EncodingFailed)?;
    for record in &records {
        record
            .encode_into(&mut data)
            .map_err(|e: EncodeError| SignError::EncodingFailed(e))?;
    }

    Ok(data)
}

/// Returns the default (inception, expiration) pair for freshly produced
/// signatures: now until four weeks from now.
pub fn default_validity() -> (u32, u32) {
    let now = Utc::now().timestamp() as u32;
    (now, now.wrapping_add(DEFAULT_VALIDITY))
}
