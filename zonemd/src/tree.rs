//! The incremental digest tree.
//!
//! A rooted tree of fixed maximum depth `D` and fixed fanout `W`. Every leaf
//! holds the records whose owner names route to it; every node caches the
//! digest of its subtree together with a dirty flag, so that recomputation
//! after an edit only touches the path from the changed leaf to the root.
//!
//! Records are routed by their owner name's printable form: at depth `d` the
//! child index is `byte[d mod len] mod W`. The routing uses the lowercase
//! absolute form, so names that compare equal always share a leaf, and all
//! records with the same owner land in the same leaf. That makes the per-leaf
//! canonical sort sufficient for the root digest: ordering between records in
//! different leaves never influences the result, only the fixed child index
//! order does. The tree is a Merkle index, not an ordering structure, and its
//! shape is not required to be balanced.
//!
//! With `D = 0` the root is the single leaf and the tree degenerates to flat
//! mode.

use zonemd_proto::error::ZoneError;
use zonemd_proto::rdata::zonemd::DigestType;
use zonemd_proto::{Name, Record};

use crate::digest::{hash_rrlist, DigestCtx};

struct Node {
    depth: u32,
    rrlist: Vec<Record>,
    // lazily sized to the tree fanout on first descent
    kids: Vec<Option<Box<Node>>>,
    digest: Vec<u8>,
    dirty: bool,
}

impl Node {
    fn new(depth: u32) -> Self {
        Self {
            depth,
            rrlist: Vec::new(),
            kids: Vec::new(),
            digest: Vec::new(),
            dirty: true,
        }
    }
}

/// The record store for incremental digest computation.
pub struct DigestTree {
    root: Node,
    max_depth: u32,
    width: usize,
}

impl DigestTree {
    /// Creates an empty tree with the given maximum depth and fanout.
    ///
    /// `width` must be at least 1; a depth of 0 makes the root the single
    /// leaf.
    pub fn new(max_depth: u32, width: usize) -> Self {
        assert!(width >= 1, "tree fanout must be at least 1");
        Self {
            root: Node::new(0),
            max_depth,
            width,
        }
    }

    /// Adds a record to the leaf its owner routes to, marking the path dirty.
    pub fn add(&mut self, rr: Record) {
        let key = routing_key(&rr.owner);
        let leaf = descend(&mut self.root, &key, self.max_depth, self.width, true);
        leaf.rrlist.push(rr);
    }

    /// Removes the first record matching `rr` (same owner, type, class, and
    /// RDATA; the TTL does not participate). Returns whether a record was
    /// removed.
    pub fn remove_exact(&mut self, rr: &Record) -> bool {
        let key = routing_key(&rr.owner);
        let leaf = descend(&mut self.root, &key, self.max_depth, self.width, true);
        match leaf
            .rrlist
            .iter()
            .position(|have| have.canonical_cmp(rr) == std::cmp::Ordering::Equal)
        {
            Some(idx) => {
                leaf.rrlist.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Returns the records in the leaf that `owner` routes to, without
    /// disturbing digest caches. Empty if the leaf was never created.
    pub fn records_at(&self, owner: &Name) -> &[Record] {
        let key = routing_key(owner);
        let mut node = &self.root;
        while node.depth < self.max_depth {
            let branch = branch_index(node.depth, &key, self.width);
            match node.kids.get(branch).and_then(|kid| kid.as_ref()) {
                Some(kid) => node = kid,
                None => return &[],
            }
        }
        &node.rrlist
    }

    /// Returns a mutable view of the records in the leaf that `owner` routes
    /// to, creating the path if needed.
    ///
    /// With `mark_dirty` false the digest caches along the path are left
    /// untouched. The only caller doing that writes computed digest bytes
    /// into apex ZONEMD records, which is sound because the canonicalizer
    /// zeroizes those bytes before hashing; any other mutation must dirty the
    /// path.
    pub fn records_at_mut(&mut self, owner: &Name, mark_dirty: bool) -> &mut Vec<Record> {
        let key = routing_key(owner);
        let leaf = descend(&mut self.root, &key, self.max_depth, self.width, mark_dirty);
        &mut leaf.rrlist
    }

    /// Marks the path from the leaf that `owner` routes to up to the root as
    /// dirty. Used after in-place edits through
    /// [`records_at_mut()`](Self::records_at_mut).
    pub fn mark_dirty(&mut self, owner: &Name) {
        let key = routing_key(owner);
        descend(&mut self.root, &key, self.max_depth, self.width, true);
    }

    /// Computes the digest of the whole tree, reusing cached subtree digests
    /// where nothing changed.
    pub fn compute(
        &mut self,
        origin: &Name,
        digest_type: DigestType,
        warnings: &mut Vec<String>,
    ) -> Result<Vec<u8>, ZoneError> {
        compute_node(&mut self.root, self.max_depth, origin, digest_type, warnings)
    }

    /// Walks the tree and returns all records, in no particular order.
    pub fn all_records(&self) -> Vec<&Record> {
        let mut out = Vec::new();
        collect(&self.root, &mut out);
        out
    }

    /// The total number of stored records.
    pub fn record_count(&self) -> usize {
        self.all_records().len()
    }

    #[cfg(test)]
    fn root_dirty(&self) -> bool {
        self.root.dirty
    }
}

/// Child index for a routing key at the given depth: a byte of the name
/// selected by the depth, folded onto the fanout.
fn branch_index(depth: u32, key: &str, width: usize) -> usize {
    let bytes = key.as_bytes();
    if bytes.is_empty() {
        return 0;
    }
    let pos = (depth as usize) % bytes.len();
    (bytes[pos] as usize) % width
}

/// The printable form the routing function operates on: lowercase absolute
/// presentation, so that names comparing equal route identically.
fn routing_key(owner: &Name) -> String {
    owner.to_string().to_ascii_lowercase()
}

fn descend<'a>(
    node: &'a mut Node,
    key: &str,
    max_depth: u32,
    width: usize,
    mark_dirty: bool,
) -> &'a mut Node {
    if mark_dirty {
        node.dirty = true;
    }
    if node.depth >= max_depth {
        return node;
    }

    let branch = branch_index(node.depth, key, width);
    let next_depth = node.depth + 1;
    if node.kids.is_empty() {
        node.kids = (0..width).map(|_| None).collect();
    }
    let kid = node.kids[branch].get_or_insert_with(|| Box::new(Node::new(next_depth)));
    descend(kid, key, max_depth, width, mark_dirty)
}

fn compute_node(
    node: &mut Node,
    max_depth: u32,
    origin: &Name,
    digest_type: DigestType,
    warnings: &mut Vec<String>,
) -> Result<Vec<u8>, ZoneError> {
    if !node.dirty {
        return Ok(node.digest.clone());
    }

    let mut ctx =
        DigestCtx::new(digest_type).ok_or(ZoneError::UnsupportedDigest(digest_type.into()))?;

    if node.depth < max_depth {
        // interior: compose the digests of present children in index order
        for kid in node.kids.iter_mut().flatten() {
            let digest = compute_node(kid, max_depth, origin, digest_type, warnings)?;
            ctx.update(&digest);
        }
    } else {
        hash_rrlist(&node.rrlist, origin, &mut ctx, warnings)?;
    }

    node.digest = ctx.finalize();
    node.dirty = false;
    Ok(node.digest.clone())
}

fn collect<'a>(node: &'a Node, out: &mut Vec<&'a Record>) {
    out.extend(node.rrlist.iter());
    for kid in node.kids.iter().flatten() {
        collect(kid, out);
    }
}

#[cfg(test)]
mod tests {
    use zonemd_proto::master;
    use zonemd_proto::rdata::zonemd::DigestType;
    use zonemd_proto::{Name, Record};

    use crate::digest::digest_rrlist;

    use super::DigestTree;

    fn origin() -> Name {
        Name::from_ascii("example.com").unwrap()
    }

    fn sample_records() -> Vec<Record> {
        master::parse(
            "\
@ 3600 IN SOA ns root 1 7200 3600 1209600 300
@ 3600 IN NS ns
ns 3600 IN A 192.0.2.1
www 3600 IN A 192.0.2.2
www 3600 IN AAAA 2001:db8::2
mail 3600 IN MX 10 mx
a.b.c 3600 IN TXT \"deep\"
@ 300 IN ZONEMD 1 1 0 \
000000000000000000000000000000000000000000000000\
000000000000000000000000000000000000000000000000
",
            &origin(),
        )
        .unwrap()
    }

    fn tree_with(records: &[Record], depth: u32, width: usize) -> DigestTree {
        let mut tree = DigestTree::new(depth, width);
        for rr in records {
            tree.add(rr.clone());
        }
        tree
    }

    fn tree_digest(tree: &mut DigestTree) -> Vec<u8> {
        let mut warnings = Vec::new();
        tree.compute(&origin(), DigestType::SHA384, &mut warnings)
            .unwrap()
    }

    #[test]
    fn tree_digest_equals_flat_digest() {
        let records = sample_records();
        let mut warnings = Vec::new();
        let flat = digest_rrlist(&records, &origin(), DigestType::SHA384, &mut warnings).unwrap();

        for (depth, width) in [(0, 13), (1, 1), (1, 13), (2, 13), (3, 5)] {
            let mut tree = tree_with(&records, depth, width);
            assert_eq!(
                tree_digest(&mut tree),
                flat,
                "mismatch for depth {} width {}",
                depth,
                width
            );
        }
    }

    #[test]
    fn digest_does_not_depend_on_insertion_order() {
        let records = sample_records();
        let mut reversed = records.clone();
        reversed.reverse();

        let mut a = tree_with(&records, 2, 13);
        let mut b = tree_with(&reversed, 2, 13);
        assert_eq!(tree_digest(&mut a), tree_digest(&mut b));
    }

    #[test]
    fn incremental_updates_match_fresh_tree() {
        let records = sample_records();
        let mut tree = tree_with(&records, 2, 13);
        // compute once so every node's cache is warm
        tree_digest(&mut tree);

        let added = master::parse("new 3600 IN A 192.0.2.77", &origin()).unwrap();
        tree.add(added[0].clone());
        let removed = records
            .iter()
            .find(|rr| rr.owner.to_string() == "www.example.com.")
            .unwrap();
        assert!(tree.remove_exact(removed));

        let mut expected_records: Vec<Record> = records
            .iter()
            .filter(|rr| rr.canonical_cmp(removed) != std::cmp::Ordering::Equal)
            .cloned()
            .collect();
        expected_records.push(added[0].clone());
        let mut fresh = tree_with(&expected_records, 2, 13);

        assert_eq!(tree_digest(&mut tree), tree_digest(&mut fresh));
    }

    #[test]
    fn compute_clears_dirty_and_mutation_sets_it() {
        let mut tree = tree_with(&sample_records(), 2, 13);
        assert!(tree.root_dirty());

        tree_digest(&mut tree);
        assert!(!tree.root_dirty());

        let added = master::parse("x 3600 IN A 192.0.2.5", &origin()).unwrap();
        tree.add(added[0].clone());
        assert!(tree.root_dirty());
    }

    #[test]
    fn cached_digest_is_returned_without_rehashing() {
        let mut tree = tree_with(&sample_records(), 2, 13);
        let first = tree_digest(&mut tree);

        // mutating records through the untracked view leaves the cache alone,
        // so the stale digest comes back even though the contents changed
        tree.records_at_mut(&origin(), false).clear();
        assert_eq!(tree_digest(&mut tree), first);

        // once the path is dirtied, the change becomes visible
        tree.mark_dirty(&origin());
        assert_ne!(tree_digest(&mut tree), first);
    }

    #[test]
    fn same_owner_routes_to_same_leaf_regardless_of_case() {
        let records = master::parse(
            "WWW 3600 IN A 192.0.2.1\nwww 3600 IN A 192.0.2.2",
            &origin(),
        )
        .unwrap();
        let mut tree = tree_with(&records, 3, 13);
        assert_eq!(
            tree.records_at(&Name::from_ascii("www.example.com").unwrap())
                .len(),
            2
        );
    }

    #[test]
    fn records_at_is_empty_for_missing_leaf() {
        let tree = DigestTree::new(2, 13);
        assert!(tree
            .records_at(&Name::from_ascii("nope.example.com").unwrap())
            .is_empty());
    }
}
