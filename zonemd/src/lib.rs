//! `zonemd` computes, embeds, signs, and verifies a message digest covering
//! the contents of a DNS zone, following
//! [draft-wessels-dns-zone-digest](https://datatracker.ietf.org/doc/draft-wessels-dns-zone-digest/).
//!
//! The zone is modelled as a multiset of resource records (see
//! [`zonemd_proto`]); the digest is a hash over their canonical wire-format
//! concatenation, anchored in a ZONEMD record at the apex. Two interchangeable
//! storage back-ends produce the same digest bytes: a flat record list and an
//! incremental digest tree that recomputes in time proportional to the change
//! set.

pub mod digest;
pub mod tree;
pub mod zone;
