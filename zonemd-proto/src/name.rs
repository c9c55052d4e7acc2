//! Definition and implementation of the [`Name`] type.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::fmt::Display;
use std::io::Write;

use byteorder::WriteBytesExt;
use smartstring::SmartString;

use crate::error::{EncodeError, ParseError};

/// A DNS domain name.
///
/// `Name`s can be sorted according to the canonical ordering, as defined in
/// [RFC 4034, Section 6.1](https://www.rfc-editor.org/rfc/rfc4034#section-6.1),
/// thanks to the [`Ord`] impl (see below for an example). Equality follows the
/// same rules, i.e. it is case-insensitive.
///
/// The string representation is always the absolute form with a trailing dot,
/// as a name would appear in a zone file. The DNS root's name is represented
/// as `"."`.
#[derive(Eq, Clone, Debug)]
pub struct Name {
    // does not contain the root label, as that would be the empty string
    labels: VecDeque<SmartString<smartstring::LazyCompact>>,
}

impl Name {
    /// Returns a `Name` representing the DNS root (`"."`).
    ///
    /// Do not create this solely for comparisons with other `Name`s, as this method allocates.
    /// [`Name::is_root()`] is allocation-free.
    ///
    /// # Examples
    /// ```rust
    /// use zonemd_proto::Name;
    ///
    /// assert_eq!(Name::from_ascii(".").ok(), Some(Name::root()));
    /// ```
    pub fn root() -> Self {
        Self {
            labels: VecDeque::new(),
        }
    }

    /// Constructs a `Name` from an ASCII domain string.
    ///
    /// The rules for allowed names are as follows:
    /// - Every label (except for the first, see next item) must consist of the following
    ///   characters: `a-z`, `A-Z`, `0-9`, `_`, `-`. The label's first and last character must not
    ///   be `-`.
    /// - The first label may also be a wildcard (i.e. `"*"`).
    /// - Every label must contain at least one character, except for the DNS root's name.
    /// - A trailing dot is allowed, but not necessary.
    ///
    /// # Examples
    /// ```rust
    /// use zonemd_proto::Name;
    ///
    /// assert_eq!(Name::from_ascii(".").ok(), Some(Name::root()));
    /// assert_eq!(Name::from_ascii("").ok(), Some(Name::root()));
    ///
    /// assert!(Name::from_ascii("example.com").is_ok());
    /// assert!(Name::from_ascii("example.com.").is_ok());
    /// assert!(Name::from_ascii("*.example.com").is_ok());
    /// assert!(Name::from_ascii("_th1s-1s-an.example.com").is_ok());
    ///
    /// assert!(Name::from_ascii("**.example.com").is_err());
    /// assert!(Name::from_ascii("exa-mple-.com").is_err());
    /// assert!(Name::from_ascii("example..com").is_err());
    /// assert!(Name::from_ascii("exämple.com").is_err());
    /// ```
    pub fn from_ascii(name: impl AsRef<str>) -> Result<Self, ParseError> {
        let name = name.as_ref();

        // without this special case, we would later return `Err(EmptyLabel)`, because splitting "."
        // on '.' gives two empty labels
        if name == "." || name.is_empty() {
            return Ok(Self::root());
        }

        if name.bytes().len() > 255 {
            return Err(ParseError::NameTooLong(name.bytes().len()));
        }

        let labels_iter = name.split('.');
        let mut labels = VecDeque::new();
        let mut root_label_found = false;
        for (idx, label) in labels_iter.enumerate() {
            if root_label_found {
                return Err(ParseError::EmptyLabel);
            }
            if label.bytes().len() > 63 {
                return Err(ParseError::LabelTooLong(label.bytes().len()));
            }
            if label.is_empty() {
                root_label_found = true;
            } else {
                // only the first label may be a wildcard
                let is_valid_wildcard = (idx == 0) && (label == "*");

                if !is_valid_wildcard {
                    Name::check_label(label)?;
                }
                labels.push_back(label.into());
            }
        }

        Ok(Name { labels })
    }

    /// Encodes this name as an uncompressed DNS QNAME into the given buffer.
    ///
    /// Returns the number of bytes written on success.
    ///
    /// Returns an error if writing to the buffer fails.
    ///
    /// # Examples
    /// ```rust
    /// use zonemd_proto::Name;
    ///
    /// let mut buf = Vec::new();
    /// let name = Name::from_ascii("example.com").unwrap();
    /// name.encode_into(&mut buf).ok();
    /// assert_eq!(buf, b"\x07example\x03com\0");
    /// ```
    pub fn encode_into(&self, buf: &mut impl Write) -> Result<u16, EncodeError> {
        let mut bytes_written = 0;
        for label in &self.labels {
            buf.write_u8(label.len() as u8)?;
            buf.write_all(label.as_bytes())?;
            bytes_written += 1 + label.as_bytes().len();
        }
        buf.write_u8(0)?;
        Ok(bytes_written as u16 + 1)
    }

    /// Appends the given `Name` to this `Name`.
    ///
    /// This is how a relative name from a zone file is made absolute against
    /// the origin.
    ///
    /// # Examples
    /// ```rust
    /// use zonemd_proto::Name;
    ///
    /// let mut base = Name::from_ascii("a").unwrap();
    /// let name = Name::from_ascii("example.com").unwrap();
    /// base.append_name(name);
    ///
    /// let complete = Name::from_ascii("a.example.com").unwrap();
    /// assert_eq!(base, complete);
    /// ```
    pub fn append_name(&mut self, mut other: Name) {
        self.labels.append(&mut other.labels)
    }

    /// Ensures this `Name` is in canonical format, i.e. all uppercase letters are replaced with
    /// their lowercase counterparts.
    ///
    /// # Examples
    /// ```rust
    /// use zonemd_proto::Name;
    ///
    /// let mut name = Name::from_ascii("*._EX4m-pLE.CoM").unwrap();
    /// name.canonicalize();
    ///
    /// assert_eq!(name.to_string(), "*._ex4m-ple.com.");
    /// ```
    pub fn canonicalize(&mut self) {
        self.labels
            .iter_mut()
            .for_each(|label| label.make_ascii_lowercase());
    }

    /// Returns true iff this `Name` is a parent zone of `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use zonemd_proto::Name;
    ///
    /// let parent = Name::from_ascii("example.com").unwrap();
    /// let child = Name::from_ascii("a.example.com").unwrap();
    ///
    /// assert_eq!(child.zone_of(&child), true);
    /// assert_eq!(parent.zone_of(&parent), true);
    /// assert_eq!(parent.zone_of(&child), true);
    /// assert_eq!(child.zone_of(&parent), false);
    /// ```
    pub fn zone_of(&self, other: &Name) -> bool {
        if self.labels.len() > other.labels.len() {
            return false;
        }

        let label_pairs = self.labels.iter().rev().zip(other.labels.iter().rev());
        for (self_label, other_label) in label_pairs {
            if !self_label.eq_ignore_ascii_case(other_label) {
                return false;
            }
        }

        true
    }

    /// Returns the label count of this `Name`.
    ///
    /// This is calculated the same way as the `RRSIG` labels value, i.e.
    /// wildcards do not count (`"*.example.com"` has a label count of two) and
    /// the DNS root's name (`"."`) has a label count of zero.
    ///
    /// # Examples
    /// ```rust
    /// use zonemd_proto::Name;
    ///
    /// assert_eq!(Name::from_ascii("www.example.com").unwrap().label_count(), 3);
    /// assert_eq!(Name::from_ascii("*.example.com").unwrap().label_count(), 2);
    /// assert_eq!(Name::root().label_count(), 0);
    /// ```
    pub fn label_count(&self) -> u8 {
        if self.is_root() {
            0
        } else if self.is_wildcard() {
            (self.labels.len() - 1) as u8
        } else {
            self.labels.len() as u8
        }
    }

    /// Returns true iff this `Name` represents the DNS root (`"."`).
    ///
    /// # Examples
    /// ```rust
    /// use zonemd_proto::Name;
    ///
    /// assert!(Name::root().is_root());
    ///
    /// assert_eq!(Name::from_ascii("example.com").unwrap().is_root(), false);
    /// ```
    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns true iff this `Name` is a wildcard, i.e. the first label is `"*"`.
    pub fn is_wildcard(&self) -> bool {
        if let Some(label) = self.labels.front() {
            label == "*"
        } else {
            false
        }
    }

    /// Checks if the given string is a valid DNS name label.
    fn check_label(label: impl AsRef<str>) -> Result<(), ParseError> {
        let mut chars = label.as_ref().chars();
        // label is non-empty, so we can unwrap
        let mut c = chars.next().unwrap();
        // first label char must be a-z, A-Z, 0-9, or _
        if !c.is_ascii_alphanumeric() && (c != '_') {
            return Err(ParseError::NameInvalidChars);
        }
        // label chars in the middle must be a-z, A-Z, 0-9, _, or -
        for next_c in chars {
            if !c.is_ascii_alphanumeric() && (c != '_') && (c != '-') {
                return Err(ParseError::NameInvalidChars);
            }
            c = next_c;
        }
        // last label char must be a-z, A-Z, 0-9, or _
        if !c.is_ascii_alphanumeric() && (c != '_') {
            return Err(ParseError::NameInvalidChars);
        }

        Ok(())
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// This implements canonical ordering, as defined in
/// [RFC 4034, Section 6.1](https://www.rfc-editor.org/rfc/rfc4034#section-6.1).
///
/// # Examples
/// ```rust
/// use zonemd_proto::Name;
///
/// let names_sorted: Vec<_> = [
///     "example",
///     "a.example",
///     "ylj-jljk.a.example",
///     "yljkjljk.a.example",
///     "Z.a.example",
///     "zABC.a.EXAMPLE",
///     "z.example",
///     "*.z.example",
///     "_.z.example",
///     "a.z.example",
/// ]
/// .into_iter()
/// .map(|n| Name::from_ascii(n).unwrap())
/// .collect();
///
/// let mut names = names_sorted.clone();
/// names.swap(0, 1);
/// names.swap(5, 1);
/// names.swap(8, 4);
/// names.swap(2, 9);
/// names.swap(6, 5);
/// names.swap(3, 0);
/// names.sort();
///
/// assert_eq!(names, names_sorted);
/// ```
impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        /*
        RFC 4034, Section 6.1:
            For the purposes of DNS security, owner names are ordered by treating individual labels
            as unsigned left-justified octet strings. The absence of a octet sorts before a zero
            value octet, and uppercase US-ASCII letters are treated as if they were lowercase
            US-ASCII letters.

            To compute the canonical ordering of a set of DNS names, start by sorting the names
            according to their most significant (rightmost) labels. For names in which the most
            significant label is identical, continue sorting according to their next most
            significant label, and so forth.
        */

        // reverse the labels because we need to look at the most significant (i.e. rightmost)
        // labels first
        let mut self_lbls = self.labels.iter().rev();
        let mut other_lbls = other.labels.iter().rev();

        let (mut self_lbl, mut other_lbl) = (self_lbls.next(), other_lbls.next());
        loop {
            match (self_lbl, other_lbl) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => return Ordering::Less,
                (Some(_), None) => return Ordering::Greater,
                (Some(self_lbl), Some(other_lbl)) => {
                    let self_lbl = self_lbl.to_ascii_lowercase();
                    let other_lbl = other_lbl.to_ascii_lowercase();

                    // this orders lexicographically, which is exactly what we want
                    match self_lbl.as_bytes().cmp(other_lbl.as_bytes()) {
                        Ordering::Less => return Ordering::Less,
                        Ordering::Greater => return Ordering::Greater,
                        Ordering::Equal => (),
                    }
                }
            }
            (self_lbl, other_lbl) = (self_lbls.next(), other_lbls.next());
        }
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_root() {
            write!(f, ".")
        } else {
            for label in &self.labels {
                write!(f, "{}.", label)?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Name;

    #[test]
    fn equality_is_case_insensitive() {
        let a = Name::from_ascii("WWW.Example.COM").unwrap();
        let b = Name::from_ascii("www.example.com.").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn display_is_absolute() {
        assert_eq!(Name::root().to_string(), ".");
        assert_eq!(
            Name::from_ascii("example.com").unwrap().to_string(),
            "example.com."
        );
    }

    #[test]
    fn zone_of_ignores_case() {
        let origin = Name::from_ascii("example.com").unwrap();
        let sub = Name::from_ascii("A.EXAMPLE.com").unwrap();
        assert!(origin.zone_of(&sub));
        assert!(!origin.zone_of(&Name::from_ascii("example.net").unwrap()));
        assert!(Name::root().zone_of(&origin));
    }
}
