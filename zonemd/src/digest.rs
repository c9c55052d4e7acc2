//! The digest engine: canonical ordering and streaming hash of zone records.
//!
//! The canonical sequence fed to the hash is defined so that any two zone
//! instances holding the same record multiset produce byte-identical input:
//! records are sorted in canonical DNS order, byte-identical duplicates are
//! skipped, the RRSIG covering the ZONEMD RRset is excluded (it is produced
//! only after the digest is final), and every apex ZONEMD is replaced by a
//! copy whose digest bytes are all zero. The zero substitution is what lets
//! the digest cover the record that will eventually hold it without chasing a
//! fixed point.

use sha2::{Digest, Sha384};

use zonemd_proto::error::ZoneError;
use zonemd_proto::rdata::zonemd::{self, DigestType};
use zonemd_proto::rdata::Rdata;
use zonemd_proto::{Name, Record, RecordType};

/// A streaming hash context for a ZONEMD digest type.
///
/// Only SHA-384 is registered so far; adding a digest type means adding a
/// variant here and a length in [`DigestType::digest_len()`].
pub enum DigestCtx {
    Sha384(Sha384),
}

impl DigestCtx {
    /// Creates a context for the given digest type, or [`None`] if the type
    /// is not supported.
    pub fn new(digest_type: DigestType) -> Option<Self> {
        match digest_type {
            DigestType::SHA384 => Some(DigestCtx::Sha384(Sha384::new())),
            DigestType::Unassigned(_) => None,
            _ => None,
        }
    }

    /// Feeds data into the hash.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            DigestCtx::Sha384(ctx) => ctx.update(data),
        }
    }

    /// Finalizes the hash and returns the digest bytes.
    pub fn finalize(self) -> Vec<u8> {
        match self {
            DigestCtx::Sha384(ctx) => ctx.finalize().to_vec(),
        }
    }
}

/// Returns the type covered by an RRSIG record, regardless of whether its
/// RDATA is typed or an opaque blob.
pub fn rrsig_covered(rr: &Record) -> Option<RecordType> {
    match rr.rdata() {
        Rdata::RRSIG(rrsig) => Some(rrsig.type_covered),
        Rdata::Unknown(raw) if raw.len() >= 2 => {
            // type covered is the first RDATA field
            Some(RecordType::from(u16::from_be_bytes([raw[0], raw[1]])))
        }
        _ => None,
    }
}

/// Feeds the canonical wire-format sequence for `records` into `ctx`.
///
/// The sort is local to the given slice. In tree mode this is called once per
/// leaf; that is sound because the routing function partitions records by
/// owner name, so the per-owner ordering the digest definition relies on is
/// preserved within each leaf.
///
/// Skipped duplicates are surfaced through `warnings`.
pub fn hash_rrlist(
    records: &[Record],
    origin: &Name,
    ctx: &mut DigestCtx,
    warnings: &mut Vec<String>,
) -> Result<(), ZoneError> {
    let mut sorted: Vec<&Record> = records.iter().collect();
    sorted.sort_by(|a, b| a.canonical_cmp(b));

    let mut prev_wire: Option<Vec<u8>> = None;
    for rr in sorted {
        let wire = rr.wire()?;
        if prev_wire.as_deref() == Some(&wire[..]) {
            warnings.push(format!("Ignoring duplicate RR: {}", rr));
            continue;
        }
        prev_wire = Some(wire.clone());

        // don't include the RRSIG over ZONEMD in the digest
        if rr.rtype == RecordType::RRSIG && rrsig_covered(rr) == Some(RecordType::ZONEMD) {
            continue;
        }

        // for ZONEMD RRs at the apex, hash a copy with the digest zeroized
        if rr.rtype == RecordType::ZONEMD && rr.owner == *origin {
            let mut copy = rr.clone();
            zonemd::zero_record_digest(&mut copy)?;
            ctx.update(&copy.wire()?);
            continue;
        }

        ctx.update(&wire);
    }

    Ok(())
}

/// Computes the digest over a full record list (flat mode).
pub fn digest_rrlist(
    records: &[Record],
    origin: &Name,
    digest_type: DigestType,
    warnings: &mut Vec<String>,
) -> Result<Vec<u8>, ZoneError> {
    let mut ctx =
        DigestCtx::new(digest_type).ok_or(ZoneError::UnsupportedDigest(digest_type.into()))?;
    hash_rrlist(records, origin, &mut ctx, warnings)?;
    Ok(ctx.finalize())
}

#[cfg(test)]
mod tests {
    use zonemd_proto::master;
    use zonemd_proto::rdata::zonemd::{self, DigestType};
    use zonemd_proto::Name;

    use super::digest_rrlist;

    fn origin() -> Name {
        Name::from_ascii("example.com").unwrap()
    }

    fn base_zone() -> Vec<zonemd_proto::Record> {
        master::parse(
            "\
@ 3600 IN SOA ns root 1 7200 3600 1209600 300
@ 3600 IN NS ns
ns 3600 IN A 192.0.2.1
@ 300 IN ZONEMD 1 1 0 \
000000000000000000000000000000000000000000000000\
000000000000000000000000000000000000000000000000
",
            &origin(),
        )
        .unwrap()
    }

    fn digest_of(records: &[zonemd_proto::Record]) -> Vec<u8> {
        let mut warnings = Vec::new();
        let digest = digest_rrlist(records, &origin(), DigestType::SHA384, &mut warnings).unwrap();
        assert_eq!(digest.len(), 48);
        digest
    }

    #[test]
    fn digest_is_deterministic() {
        assert_eq!(digest_of(&base_zone()), digest_of(&base_zone()));
    }

    #[test]
    fn digest_ignores_record_order() {
        let mut shuffled = base_zone();
        shuffled.reverse();
        assert_eq!(digest_of(&base_zone()), digest_of(&shuffled));
    }

    #[test]
    fn duplicate_records_do_not_change_digest() {
        let mut with_dup = base_zone();
        with_dup.push(with_dup[2].clone());
        assert_eq!(digest_of(&base_zone()), digest_of(&with_dup));

        let mut warnings = Vec::new();
        digest_rrlist(&with_dup, &origin(), DigestType::SHA384, &mut warnings).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("duplicate RR"));
    }

    #[test]
    fn zonemd_digest_bytes_do_not_affect_digest() {
        // writing a digest value into the placeholder must not change the
        // computed digest (the fixed point of compute -> write -> compute)
        let records = base_zone();
        let first = digest_of(&records);

        let mut updated = records.clone();
        let zonemd_idx = updated
            .iter()
            .position(|rr| rr.rtype == zonemd_proto::RecordType::ZONEMD)
            .unwrap();
        zonemd::update_record_digest(&mut updated[zonemd_idx], DigestType::SHA384, &first)
            .unwrap();

        assert_eq!(first, digest_of(&updated));
    }

    #[test]
    fn rrsig_over_zonemd_is_excluded() {
        let records = base_zone();
        let first = digest_of(&records);

        let mut with_rrsig = records.clone();
        with_rrsig.extend(
            master::parse(
                "@ 300 IN RRSIG ZONEMD 13 2 300 20260101000000 20250101000000 42 example.com. \
d2hhdGV2ZXIgc2lnbmF0dXJlIGJ5dGVzIGdvIGhlcmUuLi4uLg==",
                &origin(),
            )
            .unwrap(),
        );
        assert_eq!(first, digest_of(&with_rrsig));

        // an RRSIG over anything else does change the digest
        let mut with_other = records;
        with_other.extend(
            master::parse(
                "@ 300 IN RRSIG NS 13 2 300 20260101000000 20250101000000 42 example.com. \
d2hhdGV2ZXIgc2lnbmF0dXJlIGJ5dGVzIGdvIGhlcmUuLi4uLg==",
                &origin(),
            )
            .unwrap(),
        );
        assert_ne!(first, digest_of(&with_other));
    }

    #[test]
    fn zonemd_below_apex_is_not_zeroized() {
        // a (nonsensical) ZONEMD at a subdomain is hashed as-is, so changing
        // its digest bytes changes the zone digest
        let sub = "sub 300 IN ZONEMD 1 1 0 ffffffffffffffffffffffffffffffffffffffffffffffff\
ffffffffffffffffffffffffffffffffffffffffffffffff";
        let sub_zeroed = "sub 300 IN ZONEMD 1 1 0 \
000000000000000000000000000000000000000000000000\
000000000000000000000000000000000000000000000000";

        let mut a = base_zone();
        a.extend(master::parse(sub, &origin()).unwrap());
        let mut b = base_zone();
        b.extend(master::parse(sub_zeroed, &origin()).unwrap());

        assert_ne!(digest_of(&a), digest_of(&b));
    }

    #[test]
    fn unsupported_digest_type_is_an_error() {
        let mut warnings = Vec::new();
        let res = digest_rrlist(
            &base_zone(),
            &origin(),
            DigestType::Unassigned(240),
            &mut warnings,
        );
        assert!(matches!(
            res,
            Err(zonemd_proto::error::ZoneError::UnsupportedDigest(240))
        ));
    }
}
