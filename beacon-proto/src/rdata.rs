use core::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use triomphe::Arc;

use crate::{
  error::ProtoError,
  name::{CompressionMap, Name},
  record::RecordType,
};

const IPV4_LEN: usize = 4;
const IPV6_LEN: usize = 16;
const SRV_FIXED_LEN: usize = 6; // priority(2) + weight(2) + port(2)
const MAX_TXT_STRING_LEN: usize = 255;
const MAX_RDATA_LEN: usize = u16::MAX as usize;

/// ```text
/// RFC 2782                       DNS SRV RR                  February 2000
///
/// The format of the SRV RR
///
///  _Service._Proto.Name TTL Class SRV Priority Weight Port Target
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Srv {
  priority: u16,
  weight: u16,
  port: u16,
  target: Name,
}

impl Srv {
  /// Creates a new SRV record data.
  #[inline]
  pub const fn new(priority: u16, weight: u16, port: u16, target: Name) -> Self {
    Self {
      priority,
      weight,
      port,
      target,
    }
  }

  /// ```text
  ///  Priority
  /// The priority of this target host.  A client MUST attempt to
  /// contact the target host with the lowest-numbered priority it can
  /// reach.  The range is 0-65535.  This is a 16 bit unsigned integer
  /// in network byte order.
  /// ```
  #[inline]
  pub const fn priority(&self) -> u16 {
    self.priority
  }

  /// ```text
  ///  Weight
  /// A server selection mechanism.  The weight field specifies a
  /// relative weight for entries with the same priority.  The range of
  /// this number is 0-65535.  This is a 16 bit unsigned integer in
  /// network byte order.
  /// ```
  #[inline]
  pub const fn weight(&self) -> u16 {
    self.weight
  }

  /// ```text
  ///  Port
  /// The port on this target host of this service.  The range is 0-
  /// 65535.  This is a 16 bit unsigned integer in network byte order.
  /// ```
  #[inline]
  pub const fn port(&self) -> u16 {
    self.port
  }

  /// ```text
  ///  Target
  /// The domain name of the target host.  There MUST be one or more
  /// address records for this name, the name MUST NOT be an alias.
  /// Unless and until permitted by future standards action, name
  /// compression is not to be used for this field.
  /// ```
  ///
  /// mDNS relaxes the no-compression rule for multicast responses
  /// (RFC 6762 section 18.14); the packet encoder falls back to the
  /// uncompressed form for legacy-unicast responses only.
  #[inline]
  pub const fn target(&self) -> &Name {
    &self.target
  }
}

/// ```text
/// 3.3.14. TXT RDATA format
///
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///     /                   TXT-DATA                    /
///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
///
/// where:
///
/// TXT-DATA        One or more <character-string>s.
/// ```
///
/// An empty record is encoded as a single zero byte (one empty string).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Txt {
  strings: Arc<[Box<[u8]>]>,
}

impl Default for Txt {
  #[inline]
  fn default() -> Self {
    Self {
      strings: Arc::from_iter(core::iter::empty::<Box<[u8]>>()),
    }
  }
}

impl fmt::Debug for Txt {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut list = f.debug_list();
    for s in self.strings.iter() {
      list.entry(&format_args!(r#""{}""#, s.escape_ascii()));
    }
    list.finish()
  }
}

impl Txt {
  /// Creates TXT record data from a list of byte strings.
  ///
  /// Each string may be at most 255 bytes and the whole rdata at most
  /// 65535 bytes.
  pub fn new<I, B>(strings: I) -> Result<Self, ProtoError>
  where
    I: IntoIterator<Item = B>,
    B: Into<Box<[u8]>>,
  {
    let strings: Arc<[Box<[u8]>]> = Arc::from_iter(strings.into_iter().map(Into::into));
    let mut total = 0usize;
    for s in strings.iter() {
      if s.len() > MAX_TXT_STRING_LEN {
        return Err(ProtoError::InvalidRdata);
      }
      total += 1 + s.len();
    }
    if total.max(1) > MAX_RDATA_LEN {
      return Err(ProtoError::InvalidRdata);
    }

    Ok(Self { strings })
  }

  /// Creates TXT record data from `key=value` style text strings.
  pub fn from_strings<I, S>(strings: I) -> Result<Self, ProtoError>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    Self::new(strings.into_iter().map(|s| s.as_ref().as_bytes().to_vec()))
  }

  /// Returns the byte strings of this record, in order.
  #[inline]
  pub fn strings(&self) -> &[Box<[u8]>] {
    &self.strings
  }

  pub(crate) fn encoded_len(&self) -> usize {
    if self.strings.is_empty() {
      return 1;
    }
    self.strings.iter().map(|s| 1 + s.len()).sum()
  }

  pub(crate) fn encode(&self, buf: &mut Vec<u8>) {
    if self.strings.is_empty() {
      buf.push(0);
      return;
    }
    for s in self.strings.iter() {
      buf.push(s.len() as u8);
      buf.extend_from_slice(s);
    }
  }

  pub(crate) fn decode(msg: &[u8], off: usize, end: usize) -> Result<Self, ProtoError> {
    let mut strings = Vec::new();
    let mut pos = off;
    while pos < end {
      let len = msg[pos] as usize;
      pos += 1;
      if pos + len > end {
        return Err(ProtoError::MalformedRecord);
      }
      strings.push(Box::from(&msg[pos..pos + len]));
      pos += len;
    }

    Ok(Self {
      strings: Arc::from_iter(strings),
    })
  }
}

/// NSEC record data as used by mDNS to assert the non-existence of other
/// record types for a name (RFC 6762 section 6.1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nsec {
  next_name: Name,
  types: Vec<u16>,
}

impl Nsec {
  /// Creates NSEC record data from the next name and the set of existing
  /// record type codes.
  pub fn new(next_name: Name, types: impl IntoIterator<Item = u16>) -> Self {
    let mut types = Vec::from_iter(types);
    types.sort_unstable();
    types.dedup();
    Self { next_name, types }
  }

  /// Returns the next name field.
  #[inline]
  pub const fn next_name(&self) -> &Name {
    &self.next_name
  }

  /// Returns the asserted type codes, ascending.
  #[inline]
  pub fn types(&self) -> &[u16] {
    &self.types
  }

  /// The type bitmap encoded as window blocks (RFC 4034 section 4.1.2).
  fn bitmap(&self, out: &mut Vec<u8>) {
    let mut i = 0;
    while i < self.types.len() {
      let window = (self.types[i] >> 8) as u8;
      let mut end = i;
      while end < self.types.len() && (self.types[end] >> 8) as u8 == window {
        end += 1;
      }

      let max_low = (self.types[end - 1] & 0xFF) as usize;
      let bitmap_len = max_low / 8 + 1;
      let mut bitmap = vec![0u8; bitmap_len];
      for &code in &self.types[i..end] {
        let low = (code & 0xFF) as usize;
        bitmap[low / 8] |= 0x80 >> (low % 8);
      }

      out.push(window);
      out.push(bitmap_len as u8);
      out.extend_from_slice(&bitmap);
      i = end;
    }
  }

  fn bitmap_len(&self) -> usize {
    let mut len = 0;
    let mut i = 0;
    while i < self.types.len() {
      let window = self.types[i] >> 8;
      let mut end = i;
      while end < self.types.len() && self.types[end] >> 8 == window {
        end += 1;
      }
      len += 2 + (self.types[end - 1] & 0xFF) as usize / 8 + 1;
      i = end;
    }
    len
  }

  fn decode(msg: &[u8], off: usize, end: usize) -> Result<Self, ProtoError> {
    let (next_name, mut pos) = Name::decode(msg, off)?;
    let mut types = Vec::new();
    while pos < end {
      if pos + 2 > end {
        return Err(ProtoError::MalformedRecord);
      }
      let window = msg[pos] as u16;
      let bitmap_len = msg[pos + 1] as usize;
      pos += 2;
      if bitmap_len == 0 || bitmap_len > 32 || pos + bitmap_len > end {
        return Err(ProtoError::MalformedRecord);
      }
      for (byte_idx, &byte) in msg[pos..pos + bitmap_len].iter().enumerate() {
        for bit in 0..8 {
          if byte & (0x80 >> bit) != 0 {
            types.push(window << 8 | (byte_idx * 8 + bit) as u16);
          }
        }
      }
      pos += bitmap_len;
    }

    Ok(Self { next_name, types })
  }
}

/// The data of a resource record, tagged by record type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[allow(clippy::upper_case_acronyms)]
pub enum RecordData {
  /// ```text
  /// 3.4.1. A RDATA format
  ///
  ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
  ///     |                    ADDRESS                    |
  ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
  ///
  /// where:
  ///
  /// ADDRESS         A 32 bit Internet address.
  /// ```
  A(Ipv4Addr),
  /// ```text
  /// 2.2 AAAA data format
  ///
  ///    A 128 bit IPv6 address is encoded in the data portion of an AAAA
  ///    resource record in network byte order (high-order byte first).
  /// ```
  AAAA(Ipv6Addr),
  /// ```text
  /// 3.3.12. PTR RDATA format
  ///
  ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
  ///     /                   PTRDNAME                    /
  ///     +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
  /// ```
  PTR(Name),
  /// An alias for the owner name (RFC 1035 section 3.3.1).
  CNAME(Name),
  /// A service locator (RFC 2782).
  SRV(Srv),
  /// One or more character strings (RFC 1035 section 3.3.14).
  TXT(Txt),
  /// A negative-existence assertion (RFC 4034 section 4, as used by
  /// RFC 6762 section 6.1).
  NSEC(Nsec),
  /// The EDNS0 pseudo-record (RFC 6891), kept as raw option bytes. Its
  /// class field carries the sender's payload size and is therefore stored
  /// unmasked on the enclosing record.
  OPT(Box<[u8]>),
}

impl RecordData {
  /// Returns the type of the record data.
  #[inline]
  pub const fn ty(&self) -> RecordType {
    match self {
      Self::A(_) => RecordType::A,
      Self::AAAA(_) => RecordType::AAAA,
      Self::PTR(_) => RecordType::PTR,
      Self::CNAME(_) => RecordType::CNAME,
      Self::SRV(_) => RecordType::SRV,
      Self::TXT(_) => RecordType::TXT,
      Self::NSEC(_) => RecordType::NSEC,
      Self::OPT(_) => RecordType::OPT,
    }
  }

  /// The rdata length under the given coder state, for rdata starting at
  /// message offset `off`.
  pub(crate) fn encoded_len(
    &self,
    off: usize,
    cmap: &mut Option<CompressionMap>,
    legacy_unicast: bool,
  ) -> usize {
    match self {
      Self::A(_) => IPV4_LEN,
      Self::AAAA(_) => IPV6_LEN,
      Self::PTR(name) | Self::CNAME(name) => name.encoded_len(off, cmap, true),
      Self::SRV(srv) => {
        SRV_FIXED_LEN
          + srv
            .target
            .encoded_len(off + SRV_FIXED_LEN, cmap, !legacy_unicast)
      }
      Self::TXT(txt) => txt.encoded_len(),
      Self::NSEC(nsec) => nsec.next_name.wire_len() + nsec.bitmap_len(),
      Self::OPT(data) => data.len(),
    }
  }

  pub(crate) fn encode(
    &self,
    buf: &mut Vec<u8>,
    cmap: &mut Option<CompressionMap>,
    legacy_unicast: bool,
  ) {
    match self {
      Self::A(addr) => buf.extend_from_slice(&addr.octets()),
      Self::AAAA(addr) => buf.extend_from_slice(&addr.octets()),
      Self::PTR(name) | Self::CNAME(name) => {
        name.encode(buf, cmap, true);
      }
      Self::SRV(srv) => {
        buf.extend_from_slice(&srv.priority.to_be_bytes());
        buf.extend_from_slice(&srv.weight.to_be_bytes());
        buf.extend_from_slice(&srv.port.to_be_bytes());
        // some legacy resolvers mis-parse a compressed SRV target
        srv.target.encode(buf, cmap, !legacy_unicast);
      }
      Self::TXT(txt) => txt.encode(buf),
      Self::NSEC(nsec) => {
        // RFC 4034: names inside NSEC rdata are never compressed
        nsec.next_name.encode(buf, &mut None, false);
        nsec.bitmap(buf);
      }
      Self::OPT(data) => buf.extend_from_slice(data),
    }
  }

  /// The rdata in canonical form: no compression, names lowercased
  /// (RFC 6762 section 8.2.1).
  pub(crate) fn canonical_bytes(&self, out: &mut Vec<u8>) {
    match self {
      Self::PTR(name) => {
        name.to_lowercase().encode(out, &mut None, false);
      }
      Self::CNAME(name) => {
        name.to_lowercase().encode(out, &mut None, false);
      }
      Self::SRV(srv) => {
        out.extend_from_slice(&srv.priority.to_be_bytes());
        out.extend_from_slice(&srv.weight.to_be_bytes());
        out.extend_from_slice(&srv.port.to_be_bytes());
        srv.target.to_lowercase().encode(out, &mut None, false);
      }
      Self::NSEC(nsec) => {
        nsec.next_name.to_lowercase().encode(out, &mut None, false);
        nsec.bitmap(out);
      }
      _ => self.encode(out, &mut None, false),
    }
  }

  pub(crate) fn decode(
    ty: RecordType,
    msg: &[u8],
    off: usize,
    rdlen: usize,
  ) -> Result<Self, ProtoError> {
    let end = off + rdlen;
    match ty {
      RecordType::A => {
        if rdlen != IPV4_LEN {
          return Err(ProtoError::MalformedRecord);
        }
        let octets: [u8; IPV4_LEN] = msg[off..end].try_into().expect("length checked");
        Ok(Self::A(Ipv4Addr::from(octets)))
      }
      RecordType::AAAA => {
        if rdlen != IPV6_LEN {
          return Err(ProtoError::MalformedRecord);
        }
        let octets: [u8; IPV6_LEN] = msg[off..end].try_into().expect("length checked");
        Ok(Self::AAAA(Ipv6Addr::from(octets)))
      }
      RecordType::PTR | RecordType::CNAME => {
        let (name, read) = Name::decode(msg, off)?;
        if read != end {
          return Err(ProtoError::MalformedRecord);
        }
        Ok(match ty {
          RecordType::PTR => Self::PTR(name),
          _ => Self::CNAME(name),
        })
      }
      RecordType::SRV => {
        if rdlen < SRV_FIXED_LEN {
          return Err(ProtoError::MalformedRecord);
        }
        let priority = u16::from_be_bytes([msg[off], msg[off + 1]]);
        let weight = u16::from_be_bytes([msg[off + 2], msg[off + 3]]);
        let port = u16::from_be_bytes([msg[off + 4], msg[off + 5]]);
        let (target, read) = Name::decode(msg, off + SRV_FIXED_LEN)?;
        if read != end {
          return Err(ProtoError::MalformedRecord);
        }
        Ok(Self::SRV(Srv::new(priority, weight, port, target)))
      }
      RecordType::TXT => Txt::decode(msg, off, end).map(Self::TXT),
      RecordType::NSEC => Nsec::decode(msg, off, end).map(Self::NSEC),
      RecordType::OPT => Ok(Self::OPT(Box::from(&msg[off..end]))),
      RecordType::ANY => Err(ProtoError::MalformedRecord),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn txt_empty_is_single_zero_byte() {
    let txt = Txt::default();
    assert_eq!(txt.encoded_len(), 1);
    let mut buf = Vec::new();
    txt.encode(&mut buf);
    assert_eq!(buf, [0]);

    let decoded = Txt::decode(&buf, 0, buf.len()).unwrap();
    assert_eq!(decoded.strings().len(), 1);
    assert!(decoded.strings()[0].is_empty());
  }

  #[test]
  fn txt_round_trip() {
    let txt = Txt::from_strings(["md=Beacon", "pv=1.1", ""]).unwrap();
    let mut buf = Vec::new();
    txt.encode(&mut buf);
    assert_eq!(buf.len(), txt.encoded_len());

    let decoded = Txt::decode(&buf, 0, buf.len()).unwrap();
    assert_eq!(decoded, txt);
  }

  #[test]
  fn txt_string_too_long() {
    assert_eq!(
      Txt::new([vec![b'x'; 256]]).unwrap_err(),
      ProtoError::InvalidRdata
    );
    assert!(Txt::new([vec![b'x'; 255]]).is_ok());
  }

  #[test]
  fn txt_truncated_string() {
    let buf = [5, b'a', b'b'];
    assert_eq!(
      Txt::decode(&buf, 0, buf.len()).unwrap_err(),
      ProtoError::MalformedRecord
    );
  }

  #[test]
  fn nsec_bitmap_round_trip() {
    let name: Name = "box.local".parse().unwrap();
    let nsec = Nsec::new(
      name,
      [
        u16::from(RecordType::A),
        u16::from(RecordType::AAAA),
        u16::from(RecordType::SRV),
        257,
      ],
    );

    let mut buf = Vec::new();
    RecordData::NSEC(nsec.clone()).encode(&mut buf, &mut None, false);
    assert_eq!(
      buf.len(),
      RecordData::NSEC(nsec.clone()).encoded_len(0, &mut None, false)
    );

    let decoded = Nsec::decode(&buf, 0, buf.len()).unwrap();
    assert_eq!(decoded, nsec);
  }

  #[test]
  fn srv_decode_rejects_garbage_tail() {
    // priority/weight/port + root target + one stray byte
    let buf = [0, 10, 0, 1, 0, 80, 0, 0xFF];
    assert_eq!(
      RecordData::decode(RecordType::SRV, &buf, 0, buf.len()).unwrap_err(),
      ProtoError::MalformedRecord
    );
  }
}
