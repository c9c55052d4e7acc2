//! Zone master file parsing and writing.
//!
//! Reads the standard presentation format of
//! [RFC 1035, Section 5](https://www.rfc-editor.org/rfc/rfc1035#section-5):
//! `$ORIGIN` and `$TTL` directives, `;` comments, parentheses for
//! multi-line entries, quoted strings, `@` for the origin, relative owner
//! names, and the RFC 3597 `\# <length> <hex>` generic RDATA notation for
//! types without a presentation format.
//!
//! A ZONEMD record can therefore enter the zone in two ways: through its own
//! presentation parser (typed RDATA) or through the generic notation (opaque
//! RDATA). Both produce identical wire bytes; see
//! [`rdata::zonemd`](crate::rdata::zonemd).

use std::io;
use std::str::FromStr;

use chrono::{TimeZone, Utc};
use data_encoding::{BASE64, HEXLOWER_PERMISSIVE};

use crate::error::ParseError;
use crate::rdata::dnskey::Algorithm;
use crate::rdata::zonemd::DigestType;
use crate::rdata::{self, Rdata};
use crate::{Class, Name, Record, RecordType};

/// The TTL used for records that carry no explicit TTL in a zone without a
/// `$TTL` directive.
pub const DEFAULT_TTL: u32 = 3600;

#[derive(Debug)]
struct Tok {
    text: String,
    quoted: bool,
}

#[derive(Debug)]
struct Entry {
    line: usize,
    leading_ws: bool,
    tokens: Vec<Tok>,
}

/// Parses the given zone file contents into records.
///
/// Relative names are made absolute against `origin` (or the most recent
/// `$ORIGIN` directive). The parser performs no zone-level checks; records
/// with owners outside the origin are returned as-is and left to the caller
/// to reject.
pub fn parse(content: &str, origin: &Name) -> Result<Vec<Record>, ParseError> {
    let mut records = Vec::new();
    let mut current_origin = origin.clone();
    let mut default_ttl = None;
    let mut last_owner: Option<Name> = None;

    for entry in tokenize(content)? {
        let line = entry.line;
        let first = &entry.tokens[0];
        if !first.quoted && first.text.starts_with('$') {
            match first.text.as_str() {
                "$ORIGIN" => {
                    let tok = entry.tokens.get(1).ok_or(ParseError::UnexpectedEndOfEntry);
                    let tok = tok.map_err(|e| e.at_line(line))?;
                    current_origin =
                        parse_name(&tok.text, &current_origin).map_err(|e| e.at_line(line))?;
                }
                "$TTL" => {
                    let tok = entry.tokens.get(1).ok_or(ParseError::UnexpectedEndOfEntry);
                    let tok = tok.map_err(|e| e.at_line(line))?;
                    default_ttl = Some(parse_u32(&tok.text).map_err(|e| e.at_line(line))?);
                }
                other => {
                    return Err(
                        ParseError::UnsupportedDirective(other.to_string()).at_line(line)
                    );
                }
            }
            continue;
        }

        let rr = rr_from_entry(&entry, &current_origin, &last_owner, default_ttl)
            .map_err(|e| e.at_line(line))?;
        last_owner = Some(rr.owner.clone());
        records.push(rr);
    }

    Ok(records)
}

/// Parses a single record in presentation format, e.g. one line of an update
/// script.
pub fn parse_rr(text: &str, origin: &Name, default_ttl: u32) -> Result<Record, ParseError> {
    let entries = tokenize(text)?;
    let entry = entries.first().ok_or(ParseError::UnexpectedEndOfEntry)?;
    if entry.leading_ws {
        return Err(ParseError::MissingOwner);
    }
    rr_from_entry(entry, origin, &None, Some(default_ttl))
}

/// Writes the given records in presentation format, one per line.
pub fn write_records<'a, W: io::Write>(
    w: &mut W,
    records: impl IntoIterator<Item = &'a Record>,
) -> io::Result<()> {
    for rr in records {
        writeln!(w, "{}", rr)?;
    }
    Ok(())
}

/// Splits zone file text into entries, honoring comments, quoted strings, and
/// parentheses. An entry is one logical line's worth of tokens.
fn tokenize(content: &str) -> Result<Vec<Entry>, ParseError> {
    let mut entries = Vec::new();
    let mut tokens: Vec<Tok> = Vec::new();
    let mut entry_line = 1;
    let mut leading_ws = false;
    let mut paren_depth = 0usize;
    let mut line = 1usize;
    let mut at_line_start = true;

    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => {
                line += 1;
                at_line_start = true;
                if paren_depth == 0 {
                    if tokens.is_empty() {
                        leading_ws = false;
                    } else {
                        entries.push(Entry {
                            line: entry_line,
                            leading_ws,
                            tokens: std::mem::take(&mut tokens),
                        });
                        leading_ws = false;
                    }
                }
            }
            ' ' | '\t' | '\r' => {
                if at_line_start && tokens.is_empty() && paren_depth == 0 {
                    leading_ws = true;
                }
                at_line_start = false;
            }
            ';' => {
                at_line_start = false;
                while chars.next_if(|&nc| nc != '\n').is_some() {}
            }
            '(' => {
                at_line_start = false;
                paren_depth += 1;
            }
            ')' => {
                at_line_start = false;
                paren_depth = paren_depth
                    .checked_sub(1)
                    .ok_or(ParseError::UnbalancedParentheses)?;
            }
            '"' => {
                at_line_start = false;
                if tokens.is_empty() {
                    entry_line = line;
                }
                let mut text = String::new();
                let mut terminated = false;
                while let Some(qc) = chars.next() {
                    match qc {
                        '\\' => {
                            if let Some(esc) = chars.next() {
                                if esc == '\n' {
                                    line += 1;
                                }
                                text.push(esc);
                            }
                        }
                        '"' => {
                            terminated = true;
                            break;
                        }
                        '\n' => {
                            line += 1;
                            text.push(qc);
                        }
                        _ => text.push(qc),
                    }
                }
                if !terminated {
                    return Err(ParseError::UnterminatedString);
                }
                tokens.push(Tok { text, quoted: true });
            }
            _ => {
                at_line_start = false;
                if tokens.is_empty() {
                    entry_line = line;
                }
                let mut text = String::new();
                text.push(c);
                while let Some(&nc) = chars.peek() {
                    if matches!(nc, ' ' | '\t' | '\r' | '\n' | ';' | '(' | ')' | '"') {
                        break;
                    }
                    text.push(nc);
                    chars.next();
                }
                tokens.push(Tok {
                    text,
                    quoted: false,
                });
            }
        }
    }

    if paren_depth != 0 {
        return Err(ParseError::UnbalancedParentheses);
    }
    if !tokens.is_empty() {
        entries.push(Entry {
            line: entry_line,
            leading_ws,
            tokens,
        });
    }

    Ok(entries)
}

/// Builds a record from one tokenized entry:
/// `[owner] [ttl] [class] type rdata...`, with TTL and class in either order.
fn rr_from_entry(
    entry: &Entry,
    origin: &Name,
    last_owner: &Option<Name>,
    default_ttl: Option<u32>,
) -> Result<Record, ParseError> {
    let mut iter = entry.tokens.iter();

    let owner = if entry.leading_ws {
        last_owner.clone().ok_or(ParseError::MissingOwner)?
    } else {
        let tok = iter.next().ok_or(ParseError::UnexpectedEndOfEntry)?;
        parse_name(&tok.text, origin)?
    };

    let mut ttl = None;
    let rtype = loop {
        let tok = iter.next().ok_or(ParseError::UnexpectedEndOfEntry)?;
        if !tok.quoted && ttl.is_none() && tok.text.bytes().all(|b| b.is_ascii_digit()) {
            ttl = Some(parse_u32(&tok.text)?);
        } else if !tok.quoted && tok.text.eq_ignore_ascii_case("IN") {
            // the only supported class; it is also the default
        } else if !tok.quoted
            && ["CH", "HS", "NONE", "ANY"]
                .iter()
                .any(|c| tok.text.eq_ignore_ascii_case(c))
        {
            return Err(ParseError::UnsupportedClass(tok.text.clone()));
        } else {
            break parse_rtype(&tok.text)?;
        }
    };

    let ttl = ttl.or(default_ttl).unwrap_or(DEFAULT_TTL);
    let rest: Vec<&Tok> = iter.collect();

    if let Some(first) = rest.first() {
        if !first.quoted && first.text == "\\#" {
            return generic_rdata(owner, rtype, ttl, &rest[1..]);
        }
    }

    let rdata = match rtype {
        RecordType::A => Rdata::A(rdata::A {
            address: parse_addr(&rest, 0)?,
        }),
        RecordType::AAAA => Rdata::AAAA(rdata::AAAA {
            address: parse_addr(&rest, 0)?,
        }),
        RecordType::NS => Rdata::NS(rdata::NS {
            name: parse_name(text_at(&rest, 0)?, origin)?,
        }),
        RecordType::CNAME => Rdata::CNAME(rdata::CNAME {
            name: parse_name(text_at(&rest, 0)?, origin)?,
        }),
        RecordType::PTR => Rdata::PTR(rdata::PTR {
            name: parse_name(text_at(&rest, 0)?, origin)?,
        }),
        RecordType::MX => Rdata::MX(rdata::MX {
            preference: parse_u16(text_at(&rest, 0)?)?,
            exchange: parse_name(text_at(&rest, 1)?, origin)?,
        }),
        RecordType::TXT => {
            if rest.is_empty() {
                return Err(ParseError::UnexpectedEndOfEntry);
            }
            Rdata::TXT(rdata::TXT {
                text: rest.iter().map(|tok| tok.text.clone()).collect(),
            })
        }
        RecordType::SOA => Rdata::SOA(rdata::SOA {
            mname: parse_name(text_at(&rest, 0)?, origin)?,
            rname: parse_name(text_at(&rest, 1)?, origin)?,
            serial: parse_u32(text_at(&rest, 2)?)?,
            refresh: parse_u32(text_at(&rest, 3)?)?,
            retry: parse_u32(text_at(&rest, 4)?)?,
            expire: parse_u32(text_at(&rest, 5)?)?,
            minimum: parse_u32(text_at(&rest, 6)?)?,
        }),
        RecordType::RRSIG => Rdata::RRSIG(rdata::RRSIG {
            type_covered: parse_rtype(text_at(&rest, 0)?)?,
            algorithm: Algorithm::from(parse_u8(text_at(&rest, 1)?)?),
            labels: parse_u8(text_at(&rest, 2)?)?,
            original_ttl: parse_u32(text_at(&rest, 3)?)?,
            signature_expiration: parse_timestamp(text_at(&rest, 4)?)?,
            signature_inception: parse_timestamp(text_at(&rest, 5)?)?,
            key_tag: parse_u16(text_at(&rest, 6)?)?,
            signer_name: parse_name(text_at(&rest, 7)?, origin)?,
            signature: parse_base64(&rest[8.min(rest.len())..])?,
        }),
        RecordType::DNSKEY => {
            let flags = parse_u16(text_at(&rest, 0)?)?;
            let protocol = parse_u8(text_at(&rest, 1)?)?;
            if protocol != 3 {
                return Err(ParseError::InvalidDnskeyProtocol(protocol));
            }
            let (zone, revoked, secure_entry_point) = rdata::DNSKEY::split_flags(flags);
            Rdata::DNSKEY(rdata::DNSKEY {
                zone,
                revoked,
                secure_entry_point,
                algorithm: Algorithm::from(parse_u8(text_at(&rest, 2)?)?),
                key: parse_base64(&rest[3.min(rest.len())..])?,
            })
        }
        RecordType::ZONEMD => {
            let serial = parse_u32(text_at(&rest, 0)?)?;
            let digest_type = DigestType::from(parse_u8(text_at(&rest, 1)?)?);
            // the reserved parameter field is parsed but ignored
            let _parameter = parse_u8(text_at(&rest, 2)?)?;
            Rdata::ZONEMD(rdata::ZONEMD {
                serial,
                digest_type,
                digest: parse_hex(&rest[3.min(rest.len())..])?,
            })
        }
        other => return Err(ParseError::GenericRdataRequired(other.to_string())),
    };

    Ok(Record::new(owner, Class::IN, ttl, rdata)?)
}

/// Builds a record from the RFC 3597 generic notation:
/// `\# <length> <hex data>`.
fn generic_rdata(
    owner: Name,
    rtype: RecordType,
    ttl: u32,
    rest: &[&Tok],
) -> Result<Record, ParseError> {
    let declared = parse_u32(text_at(rest, 0)?)? as usize;
    let data = parse_hex(&rest[1.min(rest.len())..])?;
    if data.len() != declared {
        return Err(ParseError::GenericRdataLength {
            declared,
            actual: data.len(),
        });
    }
    Ok(Record::from_raw_rdata(owner, rtype, Class::IN, ttl, data))
}

/// Resolves a presentation-format name: `@` is the origin, names with a
/// trailing dot are absolute, everything else is relative to the origin.
pub fn parse_name(text: &str, origin: &Name) -> Result<Name, ParseError> {
    if text == "@" {
        return Ok(origin.clone());
    }
    let mut name = Name::from_ascii(text)?;
    if !text.ends_with('.') {
        name.append_name(origin.clone());
    }
    Ok(name)
}

fn parse_rtype(text: &str) -> Result<RecordType, ParseError> {
    let upper = text.to_uppercase();
    if let Ok(rtype) = RecordType::from_str(&upper) {
        return Ok(rtype);
    }
    if let Some(code) = upper.strip_prefix("TYPE") {
        let code = code
            .parse::<u16>()
            .map_err(|_| ParseError::UnknownRecordType(text.to_string()))?;
        return Ok(RecordType::from(code));
    }
    Err(ParseError::UnknownRecordType(text.to_string()))
}

fn text_at<'a>(rest: &[&'a Tok], idx: usize) -> Result<&'a str, ParseError> {
    rest.get(idx)
        .map(|tok| tok.text.as_str())
        .ok_or(ParseError::UnexpectedEndOfEntry)
}

fn parse_u32(text: &str) -> Result<u32, ParseError> {
    text.parse()
        .map_err(|_| ParseError::InvalidInteger(text.to_string()))
}

fn parse_u16(text: &str) -> Result<u16, ParseError> {
    text.parse()
        .map_err(|_| ParseError::InvalidInteger(text.to_string()))
}

fn parse_u8(text: &str) -> Result<u8, ParseError> {
    text.parse()
        .map_err(|_| ParseError::InvalidInteger(text.to_string()))
}

fn parse_addr<A: FromStr>(rest: &[&Tok], idx: usize) -> Result<A, ParseError> {
    let text = text_at(rest, idx)?;
    text.parse()
        .map_err(|_| ParseError::InvalidAddress(text.to_string()))
}

/// Parses an RRSIG validity timestamp, either `YYYYMMDDHHMMSS` or seconds
/// since the epoch.
fn parse_timestamp(text: &str) -> Result<u32, ParseError> {
    if text.len() == 14 && text.bytes().all(|b| b.is_ascii_digit()) {
        return match Utc.datetime_from_str(text, "%Y%m%d%H%M%S") {
            Ok(dt) => Ok(dt.timestamp() as u32),
            Err(_) => Err(ParseError::InvalidTimestamp(text.to_string())),
        };
    }
    text.parse()
        .map_err(|_| ParseError::InvalidTimestamp(text.to_string()))
}

/// Decodes base64 data that may be split over several tokens.
fn parse_base64(rest: &[&Tok]) -> Result<Vec<u8>, ParseError> {
    if rest.is_empty() {
        return Err(ParseError::UnexpectedEndOfEntry);
    }
    let joined: String = rest.iter().map(|tok| tok.text.as_str()).collect();
    BASE64
        .decode(joined.as_bytes())
        .map_err(|_| ParseError::InvalidBase64(joined))
}

/// Decodes hex data that may be split over several tokens.
fn parse_hex(rest: &[&Tok]) -> Result<Vec<u8>, ParseError> {
    if rest.is_empty() {
        return Err(ParseError::UnexpectedEndOfEntry);
    }
    let joined: String = rest.iter().map(|tok| tok.text.as_str()).collect();
    HEXLOWER_PERMISSIVE
        .decode(joined.to_ascii_lowercase().as_bytes())
        .map_err(|_| ParseError::InvalidHex(joined))
}

#[cfg(test)]
mod tests {
    use crate::error::ParseError;
    use crate::rdata::zonemd::DigestType;
    use crate::rdata::Rdata;
    use crate::{Name, RecordType};

    use super::{parse, parse_rr, write_records};

    fn origin() -> Name {
        Name::from_ascii("example.com").unwrap()
    }

    #[test]
    fn parses_basic_zone() {
        let zone = "\
$TTL 3600
@   IN SOA ns root 1 7200 3600 1209600 300 ; apex
    IN NS  ns
ns  IN A   192.0.2.1
www 300 IN AAAA 2001:db8::1
";
        let records = parse(zone, &origin()).unwrap();
        assert_eq!(records.len(), 4);

        let soa = &records[0];
        assert_eq!(soa.owner.to_string(), "example.com.");
        assert_eq!(soa.ttl, 3600);
        let soa_rdata = soa.rdata().as_soa().unwrap();
        assert_eq!(soa_rdata.mname.to_string(), "ns.example.com.");
        assert_eq!(soa_rdata.serial, 1);

        // blank owner reuses the previous one
        assert_eq!(records[1].owner, records[0].owner);
        assert_eq!(records[3].owner.to_string(), "www.example.com.");
        assert_eq!(records[3].ttl, 300);
    }

    #[test]
    fn parses_parentheses_and_comments() {
        let zone = "\
@ IN SOA ns.example.com. root.example.com. ( ; comment
        2021120101 ; serial
        7200 3600 1209600 300 )
";
        let records = parse(zone, &origin()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rdata().as_soa().unwrap().serial, 2021120101);
    }

    #[test]
    fn parses_quoted_txt_strings() {
        let zone = "@ IN TXT \"hello world\" \"x;y(z)\"\n";
        let records = parse(zone, &origin()).unwrap();
        let txt = records[0].rdata().as_txt().unwrap();
        assert_eq!(txt.text, vec!["hello world", "x;y(z)"]);
    }

    #[test]
    fn honors_origin_directive() {
        let zone = "\
$ORIGIN sub.example.com.
a IN A 192.0.2.7
";
        let records = parse(zone, &origin()).unwrap();
        assert_eq!(records[0].owner.to_string(), "a.sub.example.com.");
    }

    #[test]
    fn parses_zonemd_presentation() {
        let zone = "@ 300 IN ZONEMD 2018093000 1 0 deadbeef\n";
        let records = parse(zone, &origin()).unwrap();
        let zonemd = records[0].rdata().as_zonemd().unwrap();
        assert_eq!(zonemd.serial, 2018093000);
        assert_eq!(zonemd.digest_type, DigestType::SHA384);
        assert_eq!(zonemd.digest, vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn parses_generic_rdata_notation() {
        // the same ZONEMD rdata as above, in RFC 3597 form
        let zone = "@ 300 IN ZONEMD \\# 10 7849a7c8 01 00 deadbeef\n";
        let records = parse(zone, &origin()).unwrap();
        assert_eq!(records[0].rtype, RecordType::ZONEMD);
        assert!(matches!(records[0].rdata(), Rdata::Unknown(_)));

        let typed = parse("@ 300 IN ZONEMD 2018093000 1 0 deadbeef\n", &origin()).unwrap();
        assert_eq!(records[0].wire().unwrap(), typed[0].wire().unwrap());
    }

    #[test]
    fn parses_unknown_type_mnemonic() {
        let zone = "@ IN TYPE64000 \\# 2 abcd\n";
        let records = parse(zone, &origin()).unwrap();
        assert_eq!(records[0].rtype, RecordType::Unknown(64000));
        assert_eq!(records[0].raw_rdata(), &[0xab, 0xcd]);
    }

    #[test]
    fn rejects_generic_rdata_length_mismatch() {
        let err = parse("@ IN TYPE64000 \\# 3 abcd\n", &origin());
        assert!(matches!(
            err,
            Err(ParseError::AtLine(1, e))
                if matches!(*e, ParseError::GenericRdataLength { declared: 3, actual: 2 })
        ));
    }

    #[test]
    fn rejects_non_in_class() {
        let err = parse("@ CH A 192.0.2.1\n", &origin());
        assert!(matches!(
            err,
            Err(ParseError::AtLine(1, e)) if matches!(*e, ParseError::UnsupportedClass(_))
        ));
    }

    #[test]
    fn parse_rr_resolves_relative_names() {
        let rr = parse_rr("www 300 IN A 192.0.2.9", &origin(), 3600).unwrap();
        assert_eq!(rr.owner.to_string(), "www.example.com.");
        assert_eq!(rr.ttl, 300);

        let rr = parse_rr("mail IN MX 10 mx", &origin(), 600).unwrap();
        assert_eq!(rr.ttl, 600);
        assert_eq!(
            rr.rdata().as_mx().unwrap().exchange.to_string(),
            "mx.example.com."
        );
    }

    #[test]
    fn write_then_reparse_preserves_records() {
        let zone = "\
$TTL 3600
@ IN SOA ns root 1 7200 3600 1209600 300
@ IN NS ns
ns IN A 192.0.2.1
@ IN TXT \"some text\"
@ IN TYPE64000 \\# 2 abcd
";
        let records = parse(zone, &origin()).unwrap();
        let mut out = Vec::new();
        write_records(&mut out, records.iter()).unwrap();

        let reparsed = parse(std::str::from_utf8(&out).unwrap(), &origin()).unwrap();
        assert_eq!(records, reparsed);
    }
}
