use core::str::FromStr;

use smol_str::SmolStr;

use crate::{
  error::ProtoError,
  name::{CompressionMap, Name},
  rdata::RecordData,
  CLASS_TOP_BIT, DNS_CLASS_IN,
};

// ty(2) + class(2) + ttl(4) + rdlen(2)
const RECORD_HEADER_ENCODED_WITHOUT_NAME_SIZE: usize = 10;

/// An unknown record type string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[error("unknown record type string: {0}")]
pub struct UnknownRecordTypeStr(pub SmolStr);

/// An unknown record type code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
#[error("unknown record type: {0}")]
pub struct UnknownRecordType(pub u16);

/// A subset of the DNS record types, which only contains the types that
/// are relevant to mDNS.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u16)]
#[non_exhaustive]
#[allow(clippy::upper_case_acronyms)]
pub enum RecordType {
  /// [RFC 1035](https://tools.ietf.org/html/rfc1035) IPv4 Address record
  A = 1,
  /// [RFC 1035](https://tools.ietf.org/html/rfc1035) Canonical name record
  CNAME = 5,
  /// [RFC 1035](https://tools.ietf.org/html/rfc1035) Pointer record
  PTR = 12,
  /// [RFC 1035](https://tools.ietf.org/html/rfc1035) Text record
  TXT = 16,
  /// [RFC 3596](https://tools.ietf.org/html/rfc3596) IPv6 address record
  AAAA = 28,
  /// [RFC 6891](https://tools.ietf.org/html/rfc6891) EDNS0 pseudo-record
  OPT = 41,
  /// [RFC 4034](https://tools.ietf.org/html/rfc4034) Next secure record
  NSEC = 47,
  /// [RFC 2782](https://tools.ietf.org/html/rfc2782) Service locator
  SRV = 33,
  /// [RFC 1035](https://tools.ietf.org/html/rfc1035) All cached records, aka ANY
  ANY = 255,
}

impl From<RecordType> for u16 {
  #[inline]
  fn from(value: RecordType) -> Self {
    value as u16
  }
}

impl TryFrom<u16> for RecordType {
  type Error = UnknownRecordType;

  #[inline]
  fn try_from(value: u16) -> Result<Self, Self::Error> {
    Ok(match value {
      1 => Self::A,
      5 => Self::CNAME,
      12 => Self::PTR,
      16 => Self::TXT,
      28 => Self::AAAA,
      33 => Self::SRV,
      41 => Self::OPT,
      47 => Self::NSEC,
      255 => Self::ANY,
      _ => return Err(UnknownRecordType(value)),
    })
  }
}

impl TryFrom<&str> for RecordType {
  type Error = UnknownRecordTypeStr;

  #[inline]
  fn try_from(value: &str) -> Result<Self, Self::Error> {
    Ok(match value.trim() {
      "A" | "a" => Self::A,
      "CNAME" | "cname" => Self::CNAME,
      "PTR" | "ptr" => Self::PTR,
      "TXT" | "txt" => Self::TXT,
      "AAAA" | "aaaa" => Self::AAAA,
      "SRV" | "srv" => Self::SRV,
      "OPT" | "opt" => Self::OPT,
      "NSEC" | "nsec" => Self::NSEC,
      "ANY" | "any" => Self::ANY,
      _ => return Err(UnknownRecordTypeStr(value.into())),
    })
  }
}

impl FromStr for RecordType {
  type Err = UnknownRecordTypeStr;

  #[inline]
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    RecordType::try_from(s)
  }
}

/// An mDNS resource record: owner name, class with the cache-flush bit,
/// time-to-live and typed rdata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Record {
  name: Name,
  /// Class without the cache-flush bit; raw for OPT, where the field
  /// carries the sender's payload size.
  class: u16,
  cache_flush: bool,
  ttl: u32,
  data: RecordData,
}

impl Record {
  /// Creates a new IN-class resource record.
  pub fn from_rdata(name: Name, ttl: u32, data: RecordData) -> Self {
    Self {
      name,
      class: DNS_CLASS_IN,
      cache_flush: false,
      ttl,
      data,
    }
  }

  /// Sets the cache-flush bit (RFC 6762 section 10.2).
  #[inline]
  pub fn with_cache_flush(mut self, cache_flush: bool) -> Self {
    self.cache_flush = cache_flush;
    self
  }

  /// Returns the owner name of the record.
  #[inline]
  pub const fn name(&self) -> &Name {
    &self.name
  }

  /// Returns the type of the record.
  #[inline]
  pub const fn ty(&self) -> RecordType {
    self.data.ty()
  }

  /// Returns the class of the record, without the cache-flush bit.
  #[inline]
  pub const fn class(&self) -> u16 {
    self.class
  }

  /// Returns whether the cache-flush bit is set.
  #[inline]
  pub const fn cache_flush(&self) -> bool {
    self.cache_flush
  }

  /// Returns the time-to-live of the record.
  #[inline]
  pub const fn ttl(&self) -> u32 {
    self.ttl
  }

  /// Returns a reference to the record's data.
  #[inline]
  pub const fn data(&self) -> &RecordData {
    &self.data
  }

  /// Two records represent the same data when they share owner name
  /// (ignoring case), type and class (without the cache-flush bit).
  pub fn represents_same_data(&self, other: &Record) -> bool {
    self.ty() == other.ty() && self.class == other.class && self.name.eq_ignore_case(&other.name)
  }

  /// Like [`Record::represents_same_data`], and additionally the rdata
  /// bytes match exactly.
  pub fn data_eq(&self, other: &Record) -> bool {
    if !self.represents_same_data(other) {
      return false;
    }

    let mut ours = Vec::new();
    let mut theirs = Vec::new();
    self.data.encode(&mut ours, &mut None, false);
    other.data.encode(&mut theirs, &mut None, false);
    ours == theirs
  }

  /// The rdata in canonical form: uncompressed, with every name lowercased
  /// (RFC 6762 section 8.2.1).
  pub fn canonical_rdata(&self) -> Vec<u8> {
    let mut out = Vec::new();
    self.data.canonical_bytes(&mut out);
    out
  }

  /// The bytes this record occupies when encoded at message offset `off`
  /// under the given coder state.
  pub fn encoded_len(
    &self,
    off: usize,
    cmap: &mut Option<CompressionMap>,
    legacy_unicast: bool,
  ) -> usize {
    let name_len = self.name.encoded_len(off, cmap, true);
    let rdata_off = off + name_len + RECORD_HEADER_ENCODED_WITHOUT_NAME_SIZE;
    name_len
      + RECORD_HEADER_ENCODED_WITHOUT_NAME_SIZE
      + self.data.encoded_len(rdata_off, cmap, legacy_unicast)
  }

  /// The uncompressed wire length, an upper bound independent of any coder
  /// state.
  pub fn uncompressed_len(&self) -> usize {
    self.encoded_len(0, &mut None, false)
  }

  pub(crate) fn encode(
    &self,
    buf: &mut Vec<u8>,
    cmap: &mut Option<CompressionMap>,
    legacy_unicast: bool,
  ) {
    self.name.encode(buf, cmap, true);

    buf.extend_from_slice(&u16::from(self.ty()).to_be_bytes());
    let class = if self.cache_flush {
      self.class | CLASS_TOP_BIT
    } else {
      self.class
    };
    buf.extend_from_slice(&class.to_be_bytes());
    buf.extend_from_slice(&self.ttl.to_be_bytes());

    // rdlen is patched once the rdata has been written
    let rdlen_at = buf.len();
    buf.extend_from_slice(&[0, 0]);
    self.data.encode(buf, cmap, legacy_unicast);
    let rdlen = (buf.len() - rdlen_at - 2) as u16;
    buf[rdlen_at..rdlen_at + 2].copy_from_slice(&rdlen.to_be_bytes());
  }

  /// Decodes one record, returning `None` (but still consuming the bytes)
  /// for record types the codec does not model.
  pub(crate) fn decode(msg: &[u8], off: usize) -> Result<(Option<Self>, usize), ProtoError> {
    let (name, mut off) = Name::decode(msg, off)?;
    if msg.len() < off + RECORD_HEADER_ENCODED_WITHOUT_NAME_SIZE {
      return Err(ProtoError::ShortBuffer);
    }

    let ty = u16::from_be_bytes([msg[off], msg[off + 1]]);
    let raw_class = u16::from_be_bytes([msg[off + 2], msg[off + 3]]);
    let ttl = u32::from_be_bytes([msg[off + 4], msg[off + 5], msg[off + 6], msg[off + 7]]);
    let rdlen = u16::from_be_bytes([msg[off + 8], msg[off + 9]]) as usize;
    off += RECORD_HEADER_ENCODED_WITHOUT_NAME_SIZE;

    if off + rdlen > msg.len() {
      return Err(ProtoError::ShortBuffer);
    }

    let ty = match RecordType::try_from(ty) {
      Ok(RecordType::ANY) | Err(_) => return Ok((None, off + rdlen)),
      Ok(ty) => ty,
    };

    let (class, cache_flush) = if ty == RecordType::OPT {
      (raw_class, false)
    } else {
      (raw_class & !CLASS_TOP_BIT, raw_class & CLASS_TOP_BIT != 0)
    };

    let data = RecordData::decode(ty, msg, off, rdlen)?;

    Ok((
      Some(Self {
        name,
        class,
        cache_flush,
        ttl,
        data,
      }),
      off + rdlen,
    ))
  }
}
