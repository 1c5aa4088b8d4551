//! Range expressions and their expansion into concrete IPv4 addresses.
//!
//! Operators describe the address space of a container with compact
//! expressions.  Three forms are understood, checked in this order:
//!
//! | Form              | Example            | Expands to                          |
//! |-------------------|--------------------|-------------------------------------|
//! | `/24` CIDR block  | `10.4.101.0/24`    | `.1` – `.254` (usable hosts only)   |
//! | Last-octet span   | `10.4.101.10-20`   | `.10` – `.20` inclusive             |
//! | Bare prefix       | `10.4.101`         | `.1` – `.255`                       |
//!
//! Expansion never fails.  Anything that does not match one of the forms
//! (or matches one but carries an invalid octet) expands to the empty set,
//! so a typo in one expression cannot abort a scan of the others.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use tracing::debug;

/// Suffix that marks the only CIDR form the expander accepts.
const CIDR_24_SUFFIX: &str = "/24";

/// Host mask for a `/24` network.
const NETWORK_MASK_24: u32 = 0xFFFF_FF00;

/// Expands a single range expression into the set of addresses it denotes.
///
/// Leading and trailing whitespace is ignored.  Malformed expressions expand
/// to an empty set.
///
/// # Examples
///
/// ```rust
/// use antscan_core::expand;
///
/// assert_eq!(expand("10.4.101.0/24").len(), 254);
/// assert_eq!(expand("10.4.101.10-19").len(), 10);
/// assert_eq!(expand("10.4.101").len(), 255);
/// assert!(expand("10.4").is_empty());
/// ```
pub fn expand(expr: &str) -> BTreeSet<Ipv4Addr> {
    let expr = expr.trim();

    let parsed = if expr.ends_with(CIDR_24_SUFFIX) {
        parse_cidr_24(expr)
    } else if expr.contains('-') {
        parse_octet_span(expr)
    } else if expr.split('.').count() == 3 {
        parse_bare_prefix(expr)
    } else {
        None
    };

    parsed.unwrap_or_else(|| {
        debug!("range expression {expr:?} is malformed; expanding to nothing");
        BTreeSet::new()
    })
}

/// Expands every expression and merges the results into one deduplicated set.
///
/// Overlapping expressions (e.g. `10.4.101` and `10.4.101.1-50`) contribute
/// each address only once, so no device is queried twice in a pass.
pub fn expand_all<I, S>(exprs: I) -> BTreeSet<Ipv4Addr>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    exprs
        .into_iter()
        .flat_map(|expr| expand(expr.as_ref()))
        .collect()
}

/// Parses `a.b.c.d/24` and returns the usable hosts of the enclosing block.
///
/// Host bits in `d` are ignored, so `10.4.101.77/24` denotes the same block
/// as `10.4.101.0/24`.
fn parse_cidr_24(expr: &str) -> Option<BTreeSet<Ipv4Addr>> {
    let addr: Ipv4Addr = expr.strip_suffix(CIDR_24_SUFFIX)?.parse().ok()?;

    let network = u32::from(addr) & NETWORK_MASK_24;
    let broadcast = network | !NETWORK_MASK_24;

    Some(((network + 1)..broadcast).map(Ipv4Addr::from).collect())
}

/// Parses `a.b.c.start-end` into the inclusive last-octet span.
fn parse_octet_span(expr: &str) -> Option<BTreeSet<Ipv4Addr>> {
    let (base, span) = expr.rsplit_once('.')?;
    let (start, end) = span.split_once('-')?;

    let [a, b, c] = parse_base_octets(base)?;
    let start = parse_octet(start)?;
    let end = parse_octet(end)?;

    if start > end {
        return None;
    }

    Some((start..=end).map(|d| Ipv4Addr::new(a, b, c, d)).collect())
}

/// Parses a bare `a.b.c` prefix into `a.b.c.1` through `a.b.c.255`.
fn parse_bare_prefix(expr: &str) -> Option<BTreeSet<Ipv4Addr>> {
    let [a, b, c] = parse_base_octets(expr)?;
    Some((1..=u8::MAX).map(|d| Ipv4Addr::new(a, b, c, d)).collect())
}

/// Parses exactly three dot-separated octets.
fn parse_base_octets(base: &str) -> Option<[u8; 3]> {
    let octets: Vec<u8> = base.split('.').map(parse_octet).collect::<Option<_>>()?;
    octets.try_into().ok()
}

/// Parses one decimal octet with the same strictness as [`Ipv4Addr`]:
/// ASCII digits only, no sign, no inner whitespace and no leading zero.
fn parse_octet(octet: &str) -> Option<u8> {
    let digits_only = !octet.is_empty() && octet.bytes().all(|b| b.is_ascii_digit());
    if !digits_only || (octet.len() > 1 && octet.starts_with('0')) {
        return None;
    }
    octet.parse().ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
