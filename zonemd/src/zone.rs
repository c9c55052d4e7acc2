//! The in-memory zone: record store, placeholder handling, digest
//! calculation, verification, and incremental updates.
//!
//! The two storage back-ends (flat list and digest tree) sit behind one
//! interface and produce identical digests; callers select one at load time
//! and everything above is unaware of the choice.
//!
//! Non-fatal conditions (out-of-zone records, duplicate RRs, unmatched
//! deletes) accumulate as warnings that the caller drains and reports;
//! nothing in this module writes to the terminal.

use std::io;

use zonemd_proto::dnssec::{self, ZoneSigningKey};
use zonemd_proto::error::ZoneError;
use zonemd_proto::master;
use zonemd_proto::rdata::zonemd::{self, DigestType, ZONEMD};
use zonemd_proto::{Class, Name, Record, RecordType};

use crate::digest::{self, rrsig_covered};
use crate::tree::DigestTree;

/// Storage back-end selection for a [`Zone`].
#[derive(Copy, Clone, Debug)]
pub enum StoreKind {
    /// One flat record list, hashed in a single canonical pass.
    Flat,
    /// A digest tree for incremental recomputation. A depth of 0 makes the
    /// root the single leaf, which behaves exactly like [`StoreKind::Flat`].
    Tree { depth: u32, width: usize },
}

enum Store {
    Flat(Vec<Record>),
    Tree(DigestTree),
}

impl Store {
    fn new(kind: StoreKind) -> Self {
        match kind {
            StoreKind::Flat => Store::Flat(Vec::new()),
            StoreKind::Tree { depth, width } => Store::Tree(DigestTree::new(depth, width)),
        }
    }

    fn add(&mut self, rr: Record) {
        match self {
            Store::Flat(list) => list.push(rr),
            Store::Tree(tree) => tree.add(rr),
        }
    }

    fn remove_exact(&mut self, rr: &Record) -> bool {
        match self {
            Store::Flat(list) => {
                match list
                    .iter()
                    .position(|have| have.canonical_cmp(rr) == std::cmp::Ordering::Equal)
                {
                    Some(idx) => {
                        list.remove(idx);
                        true
                    }
                    None => false,
                }
            }
            Store::Tree(tree) => tree.remove_exact(rr),
        }
    }

    /// A mutable view of the records that may contain apex data: the whole
    /// list in flat mode, the apex leaf in tree mode. Callers filter by owner
    /// themselves (a tree leaf also holds unrelated owners that happen to
    /// route there).
    fn apex_records_mut(&mut self, origin: &Name, mark_dirty: bool) -> &mut Vec<Record> {
        match self {
            Store::Flat(list) => list,
            Store::Tree(tree) => tree.records_at_mut(origin, mark_dirty),
        }
    }

    fn apex_records(&self, origin: &Name) -> &[Record] {
        match self {
            Store::Flat(list) => list,
            Store::Tree(tree) => tree.records_at(origin),
        }
    }

    fn all_records(&self) -> Vec<&Record> {
        match self {
            Store::Flat(list) => list.iter().collect(),
            Store::Tree(tree) => tree.all_records(),
        }
    }

    fn record_count(&self) -> usize {
        match self {
            Store::Flat(list) => list.len(),
            Store::Tree(tree) => tree.record_count(),
        }
    }
}

/// One problem found by [`Zone::verify()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyIssue {
    /// The serial embedded in a ZONEMD record differs from the SOA serial.
    SerialMismatch { zonemd_serial: u32, soa_serial: u32 },
    /// A ZONEMD record uses a digest type this implementation cannot compute.
    UnsupportedDigest { digest_type: u8 },
    /// The stored and freshly computed digests differ.
    DigestMismatch {
        digest_type: u8,
        found: Vec<u8>,
        computed: Vec<u8>,
    },
}

/// Counters reported by [`Zone::apply_update()`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UpdateStats {
    pub additions: usize,
    pub deletions: usize,
}

/// A loaded zone with its apex SOA and record store.
pub struct Zone {
    origin: Name,
    soa: Record,
    store: Store,
    warnings: Vec<String>,
}

impl Zone {
    /// Parses zone file contents and builds the store.
    ///
    /// Out-of-zone records are skipped with a warning; a missing SOA at the
    /// origin is fatal.
    pub fn load(origin: Name, content: &str, kind: StoreKind) -> Result<Self, ZoneError> {
        let records = master::parse(content, &origin)?;

        let soa = records
            .iter()
            .find(|rr| {
                rr.rtype == RecordType::SOA
                    && rr.owner == origin
                    && rr.rdata().as_soa().is_some()
            })
            .cloned()
            .ok_or(ZoneError::NoSoa)?;

        let mut zone = Self {
            origin,
            soa,
            store: Store::new(kind),
            warnings: Vec::new(),
        };

        let mut soa_seen = false;
        for rr in records {
            if rr.rtype == RecordType::SOA && rr.owner == zone.origin {
                if soa_seen {
                    zone.warnings
                        .push(format!("Ignoring extra SOA record at the zone apex: {}", rr));
                    continue;
                }
                soa_seen = true;
            }
            zone.add(rr);
        }

        Ok(zone)
    }

    /// The zone origin (apex name).
    pub fn origin(&self) -> &Name {
        &self.origin
    }

    /// The serial field of the apex SOA.
    pub fn soa_serial(&self) -> u32 {
        // load() guarantees the SOA rdata is typed
        self.soa.rdata().as_soa().map(|soa| soa.serial).unwrap_or(0)
    }

    /// The number of stored records.
    pub fn record_count(&self) -> usize {
        self.store.record_count()
    }

    /// Drains accumulated warnings for reporting.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Adds a record, rejecting owners outside the origin with a warning.
    /// Duplicates are preserved at this layer; the digest engine collapses
    /// them. Returns whether the record was stored.
    pub fn add(&mut self, rr: Record) -> bool {
        if !self.origin.zone_of(&rr.owner) {
            self.warnings
                .push(format!("Ignoring out-of-zone data for '{}'", rr.owner));
            return false;
        }
        self.store.add(rr);
        true
    }

    /// Removes every record of `rtype` at the apex; for RRSIG, only those
    /// covering `covered`.
    fn remove_apex(&mut self, rtype: RecordType, covered: Option<RecordType>) {
        let origin = self.origin.clone();
        let apex = self.store.apex_records_mut(&origin, true);
        apex.retain(|rr| {
            if rr.owner != origin || rr.rtype != rtype {
                return true;
            }
            match (rtype, covered) {
                (RecordType::RRSIG, Some(covered)) => rrsig_covered(rr) != Some(covered),
                _ => false,
            }
        });
    }

    /// All ZONEMD records at the apex, in store order.
    pub fn apex_zonemds(&self) -> Vec<&Record> {
        self.store
            .apex_records(&self.origin)
            .iter()
            .filter(|rr| rr.rtype == RecordType::ZONEMD && rr.owner == self.origin)
            .collect()
    }

    /// Replaces the apex ZONEMD RRset with placeholder records (zero digest)
    /// for the given digest types. Duplicate types are skipped with a
    /// warning; an unknown digest type is fatal.
    pub fn add_placeholders(&mut self, digest_types: &[u8]) -> Result<(), ZoneError> {
        self.remove_apex(RecordType::ZONEMD, None);

        let serial = self.soa_serial();
        let ttl = self.soa.ttl;

        for (idx, &digest_type) in digest_types.iter().enumerate() {
            if digest_types[..idx].contains(&digest_type) {
                self.warnings
                    .push(format!("Ignoring duplicate digest type {}", digest_type));
                continue;
            }
            let placeholder = ZONEMD::placeholder(serial, DigestType::from(digest_type))?;
            let rr = Record::new(self.origin.clone(), Class::IN, ttl, placeholder.into())
                .map_err(ZoneError::Encoding)?;
            self.store.add(rr);
        }

        Ok(())
    }

    /// Computes the zone digest for one digest type over the current store.
    pub fn digest(&mut self, digest_type: DigestType) -> Result<Vec<u8>, ZoneError> {
        match &mut self.store {
            Store::Flat(list) => {
                digest::digest_rrlist(list, &self.origin, digest_type, &mut self.warnings)
            }
            Store::Tree(tree) => tree.compute(&self.origin, digest_type, &mut self.warnings),
        }
    }

    /// Computes and writes back the digest for every apex ZONEMD record,
    /// then optionally re-signs the ZONEMD RRset.
    ///
    /// Fails with [`ZoneError::NoZonemd`] when no placeholder exists and with
    /// [`ZoneError::UnsupportedDigest`] for digest types that cannot be
    /// computed.
    pub fn calculate(&mut self, zsk: Option<&ZoneSigningKey>) -> Result<(), ZoneError> {
        let mut digest_types = Vec::new();
        for rr in self.apex_zonemds() {
            let unpacked = zonemd::unpack_record(rr)?;
            if !digest_types.contains(&unpacked.digest_type) {
                digest_types.push(unpacked.digest_type);
            }
        }
        if digest_types.is_empty() {
            return Err(ZoneError::NoZonemd);
        }

        for digest_type in digest_types {
            let digest = self.digest(digest_type)?;

            // writing the digest bytes back does not dirty the tree: the
            // canonicalizer zeroizes them before hashing, so cached subtree
            // digests stay valid
            let origin = self.origin.clone();
            let apex = self.store.apex_records_mut(&origin, false);
            for rr in apex
                .iter_mut()
                .filter(|rr| rr.rtype == RecordType::ZONEMD && rr.owner == origin)
            {
                if zonemd::unpack_record(rr)?.digest_type == digest_type {
                    zonemd::update_record_digest(rr, digest_type, &digest)?;
                }
            }
        }

        if let Some(zsk) = zsk {
            self.resign(zsk)?;
        }

        Ok(())
    }

    /// Signs the apex ZONEMD RRset, replacing any previous RRSIG over ZONEMD.
    fn resign(&mut self, zsk: &ZoneSigningKey) -> Result<(), ZoneError> {
        let rrset: Vec<Record> = self.apex_zonemds().into_iter().cloned().collect();
        let (inception, expiration) = dnssec::default_validity();
        let rrsig = zsk.sign_rrset(&rrset, inception, expiration)?;

        self.remove_apex(RecordType::RRSIG, Some(RecordType::ZONEMD));
        self.store.add(rrsig);
        Ok(())
    }

    /// Checks every apex ZONEMD record against a freshly computed digest.
    ///
    /// Issues accumulate so that all mismatches get reported in one pass; an
    /// empty result means the zone verifies.
    pub fn verify(&mut self) -> Result<Vec<VerifyIssue>, ZoneError> {
        let mut stored = Vec::new();
        for rr in self.apex_zonemds() {
            stored.push(zonemd::unpack_record(rr)?);
        }
        if stored.is_empty() {
            return Err(ZoneError::NoZonemd);
        }

        let soa_serial = self.soa_serial();
        let mut issues = Vec::new();
        for zonemd in stored {
            if zonemd.serial != soa_serial {
                issues.push(VerifyIssue::SerialMismatch {
                    zonemd_serial: zonemd.serial,
                    soa_serial,
                });
            }
            if zonemd.digest_type.digest_len().is_none() {
                issues.push(VerifyIssue::UnsupportedDigest {
                    digest_type: zonemd.digest_type.into(),
                });
                continue;
            }
            let computed = self.digest(zonemd.digest_type)?;
            if computed != zonemd.digest {
                issues.push(VerifyIssue::DigestMismatch {
                    digest_type: zonemd.digest_type.into(),
                    found: zonemd.digest,
                    computed,
                });
            }
        }

        Ok(issues)
    }

    /// Applies a line-oriented update script: each line is `add <rr>` or
    /// `del <rr>` with the record in presentation format. Blank or malformed
    /// lines, and deletes that match nothing, produce warnings and are
    /// skipped.
    pub fn apply_update(&mut self, content: &str) -> UpdateStats {
        let mut stats = UpdateStats::default();

        for (idx, line) in content.lines().enumerate() {
            let lineno = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                self.warnings
                    .push(format!("update line {}: unparseable input", lineno));
                continue;
            }
            let (cmd, rr_text) = match trimmed.split_once(char::is_whitespace) {
                Some(parts) => parts,
                None => {
                    self.warnings
                        .push(format!("update line {}: unparseable input", lineno));
                    continue;
                }
            };

            if cmd != "add" && cmd != "del" {
                self.warnings.push(format!(
                    "update line {}: expected 'add' or 'del', got '{}'",
                    lineno, cmd
                ));
                continue;
            }

            let rr = match master::parse_rr(rr_text, &self.origin, master::DEFAULT_TTL) {
                Ok(rr) => rr,
                Err(err) => {
                    self.warnings
                        .push(format!("update line {}: {}", lineno, err));
                    continue;
                }
            };

            if cmd == "add" {
                if self.add(rr) {
                    stats.additions += 1;
                }
            } else if self.store.remove_exact(&rr) {
                stats.deletions += 1;
            } else {
                self.warnings.push(format!(
                    "update line {}: no matching record to delete",
                    lineno
                ));
            }
        }

        stats
    }

    /// All records in canonical order, for the zone writer.
    pub fn iter_sorted(&self) -> Vec<&Record> {
        let mut records = self.store.all_records();
        records.sort_by(|a, b| a.canonical_cmp(b));
        records
    }

    /// Writes the sorted zone in presentation format.
    pub fn write_to(&self, w: &mut impl io::Write) -> io::Result<()> {
        master::write_records(w, self.iter_sorted())
    }
}

#[cfg(test)]
mod tests {
    use zonemd_proto::error::ZoneError;
    use zonemd_proto::master;
    use zonemd_proto::rdata::zonemd::{self, DigestType};
    use zonemd_proto::Name;

    use super::{StoreKind, VerifyIssue, Zone};

    const SIMPLE_ZONE: &str = "\
example. 3600 IN SOA ns.example. admin.example. 1 7200 3600 1209600 300
example. 3600 IN NS ns.example.
ns.example. 3600 IN A 192.0.2.1
";

    fn origin() -> Name {
        Name::from_ascii("example").unwrap()
    }

    fn load(kind: StoreKind) -> Zone {
        Zone::load(origin(), SIMPLE_ZONE, kind).unwrap()
    }

    #[test]
    fn placeholder_calculate_verify_round_trip() {
        let mut zone = load(StoreKind::Flat);
        zone.add_placeholders(&[1]).unwrap();
        assert_eq!(zone.apex_zonemds().len(), 1);

        zone.calculate(None).unwrap();
        let stored = zonemd::unpack_record(zone.apex_zonemds()[0]).unwrap();
        assert_eq!(stored.serial, 1);
        assert_ne!(stored.digest, vec![0u8; 48]);

        assert!(zone.verify().unwrap().is_empty());
    }

    #[test]
    fn verify_reports_digest_mismatch() {
        let content = format!(
            "{}example. 300 IN ZONEMD 1 1 0 {}\n",
            SIMPLE_ZONE,
            "ff".repeat(48)
        );
        let mut zone = Zone::load(origin(), &content, StoreKind::Flat).unwrap();
        let issues = zone.verify().unwrap();
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            &issues[0],
            VerifyIssue::DigestMismatch { digest_type: 1, found, .. } if found == &vec![0xff; 48]
        ));
    }

    #[test]
    fn verify_reports_serial_mismatch_and_keeps_checking() {
        let content = format!(
            "{}example. 300 IN ZONEMD 9 1 0 {}\n",
            SIMPLE_ZONE,
            "00".repeat(48)
        );
        let mut zone = Zone::load(origin(), &content, StoreKind::Flat).unwrap();
        let issues = zone.verify().unwrap();
        assert_eq!(issues.len(), 2);
        assert!(matches!(
            issues[0],
            VerifyIssue::SerialMismatch { zonemd_serial: 9, soa_serial: 1 }
        ));
        assert!(matches!(issues[1], VerifyIssue::DigestMismatch { .. }));
    }

    #[test]
    fn verify_flags_unsupported_digest_type_without_computing() {
        let content = format!("{}example. 300 IN ZONEMD 1 240 0 aabb\n", SIMPLE_ZONE);
        let mut zone = Zone::load(origin(), &content, StoreKind::Flat).unwrap();
        let issues = zone.verify().unwrap();
        assert_eq!(
            issues,
            vec![VerifyIssue::UnsupportedDigest { digest_type: 240 }]
        );
    }

    #[test]
    fn mutating_a_record_breaks_verification() {
        let mut zone = load(StoreKind::Flat);
        zone.add_placeholders(&[1]).unwrap();
        zone.calculate(None).unwrap();

        let replacement = master::parse_rr("ns.example. 3600 IN A 192.0.2.99", &origin(), 3600)
            .unwrap();
        let victim = master::parse_rr("ns.example. 3600 IN A 192.0.2.1", &origin(), 3600).unwrap();
        assert!(zone.store.remove_exact(&victim));
        zone.add(replacement);

        let issues = zone.verify().unwrap();
        assert!(matches!(issues[0], VerifyIssue::DigestMismatch { .. }));
    }

    #[test]
    fn flat_and_tree_calculate_identical_digests() {
        let mut flat = load(StoreKind::Flat);
        flat.add_placeholders(&[1]).unwrap();
        flat.calculate(None).unwrap();
        let flat_digest = zonemd::unpack_record(flat.apex_zonemds()[0])
            .unwrap()
            .digest;

        for (depth, width) in [(0, 13), (2, 13), (3, 2)] {
            let mut tree = load(StoreKind::Tree { depth, width });
            tree.add_placeholders(&[1]).unwrap();
            tree.calculate(None).unwrap();
            let tree_digest = zonemd::unpack_record(tree.apex_zonemds()[0])
                .unwrap()
                .digest;
            assert_eq!(flat_digest, tree_digest, "depth {} width {}", depth, width);
            assert!(tree.verify().unwrap().is_empty());
        }
    }

    #[test]
    fn duplicate_placeholder_types_are_coalesced() {
        let mut zone = load(StoreKind::Flat);
        zone.add_placeholders(&[1, 1]).unwrap();
        assert_eq!(zone.apex_zonemds().len(), 1);
        let warnings = zone.take_warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("duplicate digest type 1"));
    }

    #[test]
    fn placeholders_replace_existing_zonemd_rrset() {
        let content = format!(
            "{}example. 300 IN ZONEMD 1 1 0 {}\n",
            SIMPLE_ZONE,
            "ab".repeat(48)
        );
        let mut zone = Zone::load(origin(), &content, StoreKind::Flat).unwrap();
        zone.add_placeholders(&[1]).unwrap();

        let zonemds = zone.apex_zonemds();
        assert_eq!(zonemds.len(), 1);
        assert_eq!(
            zonemd::unpack_record(zonemds[0]).unwrap().digest,
            vec![0u8; 48]
        );
    }

    #[test]
    fn unknown_placeholder_type_is_fatal() {
        let mut zone = load(StoreKind::Flat);
        assert!(matches!(
            zone.add_placeholders(&[240]),
            Err(ZoneError::UnsupportedDigest(240))
        ));
    }

    #[test]
    fn calculate_without_placeholder_fails() {
        let mut zone = load(StoreKind::Flat);
        assert!(matches!(zone.calculate(None), Err(ZoneError::NoZonemd)));
        assert!(matches!(zone.verify(), Err(ZoneError::NoZonemd)));
    }

    #[test]
    fn missing_soa_is_fatal() {
        let err = Zone::load(origin(), "ns.example. 3600 IN A 192.0.2.1\n", StoreKind::Flat);
        assert!(matches!(err, Err(ZoneError::NoSoa)));
    }

    #[test]
    fn out_of_zone_records_are_skipped_with_warning() {
        let content = format!("{}other.test. 3600 IN A 192.0.2.50\n", SIMPLE_ZONE);
        let mut zone = Zone::load(origin(), &content, StoreKind::Flat).unwrap();
        assert_eq!(zone.record_count(), 3);
        let warnings = zone.take_warnings();
        assert!(warnings[0].contains("out-of-zone"));
    }

    #[test]
    fn adding_duplicate_txt_twice_digests_like_once() {
        let mut once = load(StoreKind::Flat);
        once.add(master::parse_rr("example. 3600 IN TXT \"x\"", &origin(), 3600).unwrap());
        let mut twice = load(StoreKind::Flat);
        twice.add(master::parse_rr("example. 3600 IN TXT \"x\"", &origin(), 3600).unwrap());
        twice.add(master::parse_rr("example. 3600 IN TXT \"x\"", &origin(), 3600).unwrap());

        assert_eq!(
            once.digest(DigestType::SHA384).unwrap(),
            twice.digest(DigestType::SHA384).unwrap()
        );
        assert!(twice
            .take_warnings()
            .iter()
            .any(|w| w.contains("duplicate RR")));
    }

    #[test]
    fn update_script_applies_adds_and_dels() {
        let mut zone = load(StoreKind::Tree { depth: 2, width: 13 });
        zone.add_placeholders(&[1]).unwrap();
        zone.calculate(None).unwrap();

        let stats = zone.apply_update(
            "\
add www.example. 3600 IN A 192.0.2.7
del ns.example. 3600 IN A 192.0.2.1
del nope.example. 3600 IN A 203.0.113.1
bogus line here
",
        );
        assert_eq!(stats.additions, 1);
        assert_eq!(stats.deletions, 1);

        let warnings = zone.take_warnings();
        assert!(warnings.iter().any(|w| w.contains("no matching record")));
        assert!(warnings.iter().any(|w| w.contains("expected 'add' or 'del'")));

        // recompute and cross-check against a freshly loaded equivalent zone
        zone.calculate(None).unwrap();
        assert!(zone.verify().unwrap().is_empty());

        let fresh_content = "\
example. 3600 IN SOA ns.example. admin.example. 1 7200 3600 1209600 300
example. 3600 IN NS ns.example.
www.example. 3600 IN A 192.0.2.7
";
        let mut fresh = Zone::load(origin(), fresh_content, StoreKind::Flat).unwrap();
        fresh.add_placeholders(&[1]).unwrap();
        fresh.calculate(None).unwrap();

        assert_eq!(
            zonemd::unpack_record(zone.apex_zonemds()[0]).unwrap().digest,
            zonemd::unpack_record(fresh.apex_zonemds()[0]).unwrap().digest
        );
    }

    #[test]
    fn signing_inserts_rrsig_and_keeps_digest_valid() {
        let key = "\
Private-key-format: v1.3
Algorithm: 13 (ECDSAP256SHA256)
PrivateKey: AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=
";
        let zsk = zonemd_proto::dnssec::ZoneSigningKey::from_bind_format(key).unwrap();

        let mut zone = load(StoreKind::Flat);
        zone.add_placeholders(&[1]).unwrap();
        zone.calculate(Some(&zsk)).unwrap();

        let rrsigs: Vec<_> = zone
            .iter_sorted()
            .into_iter()
            .filter(|rr| rr.rtype == zonemd_proto::RecordType::RRSIG)
            .cloned()
            .collect();
        assert_eq!(rrsigs.len(), 1);

        let rrset: Vec<_> = zone.apex_zonemds().into_iter().cloned().collect();
        zonemd_proto::dnssec::verify_rrsig(&rrset, &rrsigs[0], &zsk.dnskey()).unwrap();

        // the RRSIG over ZONEMD does not participate in the digest
        assert!(zone.verify().unwrap().is_empty());

        // calculating again (fresh signature) still verifies
        zone.calculate(Some(&zsk)).unwrap();
        assert!(zone.verify().unwrap().is_empty());
        let rrsig_count = zone
            .iter_sorted()
            .into_iter()
            .filter(|rr| rr.rtype == zonemd_proto::RecordType::RRSIG)
            .count();
        assert_eq!(rrsig_count, 1);
    }

    #[test]
    fn write_to_emits_sorted_zone() {
        let mut zone = load(StoreKind::Tree { depth: 2, width: 13 });
        zone.add(master::parse_rr("www.example. 3600 IN A 192.0.2.2", &origin(), 3600).unwrap());

        let mut out = Vec::new();
        zone.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        // canonical order puts the apex records first
        assert!(lines[0].starts_with("example.\t3600\tIN\tNS"));
        assert!(lines[1].starts_with("example.\t3600\tIN\tSOA"));
        assert!(lines[2].starts_with("ns.example."));
        assert!(lines[3].starts_with("www.example."));
    }
}
