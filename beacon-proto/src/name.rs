use core::fmt::{self, Write as _};
use core::str::FromStr;
use std::collections::HashMap;

use crate::{
  error::ProtoError, COMPRESSION_POINTER_MASK, MAX_COMPRESSION_OFFSET, MAX_COMPRESSION_POINTERS,
  MAX_DOMAIN_NAME_WIRE_OCTETS, MAX_LABEL_LEN,
};

/// A single `.`-separated component of a [`Name`].
///
/// Labels are arbitrary bytes, 1 to 63 bytes long. Comparison through
/// `PartialEq` is byte-exact; use [`Label::eq_ignore_ascii_case`] for the
/// case-insensitive matching DNS requires.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Label {
  bytes: Box<[u8]>,
}

impl Label {
  /// The maximum length of a label in bytes.
  pub const MAX_LEN: usize = MAX_LABEL_LEN;

  /// Creates a label from raw bytes or a string slice.
  pub fn new(label: impl AsRef<[u8]>) -> Result<Self, ProtoError> {
    let label = label.as_ref();
    if label.is_empty() || label.len() > Self::MAX_LEN {
      return Err(ProtoError::InvalidLabel(label.len()));
    }

    Ok(Self {
      bytes: label.into(),
    })
  }

  /// Returns the raw bytes of this label.
  #[inline]
  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes
  }

  /// Case-insensitive label comparison, as required by RFC 1035 section
  /// 2.3.3.
  #[inline]
  pub fn eq_ignore_ascii_case(&self, other: &Label) -> bool {
    self.bytes.eq_ignore_ascii_case(&other.bytes)
  }
}

impl fmt::Debug for Label {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, r#""{}""#, self.bytes.escape_ascii())
  }
}

impl fmt::Display for Label {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.bytes.escape_ascii())
  }
}

impl FromStr for Label {
  type Err = ProtoError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::new(s)
  }
}

/// A domain name: a sequence of [`Label`]s, leaf first.
///
/// The trailing empty root label is implicit. [`Name::ROOT`] is the empty
/// sequence, used only by pseudo-records such as OPT. Names are immutable
/// once built.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Name {
  labels: Vec<Label>,
}

impl Name {
  /// The root domain `.`.
  pub const ROOT: Self = Self { labels: Vec::new() };

  /// Builds a name from labels, rejecting names whose wire form would
  /// exceed 255 octets.
  pub fn from_labels<I>(labels: I) -> Result<Self, ProtoError>
  where
    I: IntoIterator<Item = Label>,
  {
    let name = Self {
      labels: Vec::from_iter(labels),
    };
    if name.wire_len() > MAX_DOMAIN_NAME_WIRE_OCTETS {
      return Err(ProtoError::NameTooLong);
    }
    Ok(name)
  }

  /// Returns the labels of this name, leaf first.
  #[inline]
  pub fn labels(&self) -> &[Label] {
    &self.labels
  }

  /// Returns `true` for the root domain.
  #[inline]
  pub fn is_root(&self) -> bool {
    self.labels.is_empty()
  }

  /// Returns a new name with `label` prepended, e.g. an instance label in
  /// front of a service name.
  pub fn child(&self, label: Label) -> Result<Self, ProtoError> {
    let mut labels = Vec::with_capacity(self.labels.len() + 1);
    labels.push(label);
    labels.extend(self.labels.iter().cloned());
    Self::from_labels(labels)
  }

  /// The uncompressed wire length: one length prefix per label plus the
  /// zero terminator.
  pub fn wire_len(&self) -> usize {
    self
      .labels
      .iter()
      .map(|l| l.as_bytes().len() + 1)
      .sum::<usize>()
      + 1
  }

  /// Case-insensitive name comparison.
  pub fn eq_ignore_case(&self, other: &Name) -> bool {
    self.labels.len() == other.labels.len()
      && self
        .labels
        .iter()
        .zip(other.labels.iter())
        .all(|(a, b)| a.eq_ignore_ascii_case(b))
  }

  /// Returns the name with every ASCII letter lowercased, the canonical
  /// form used by tiebreaking (RFC 6762 section 8.2.1).
  pub fn to_lowercase(&self) -> Name {
    Name {
      labels: self
        .labels
        .iter()
        .map(|l| Label {
          bytes: l.bytes.to_ascii_lowercase().into(),
        })
        .collect(),
    }
  }

  /// Encodes this name at the end of `buf`, returning the number of bytes
  /// written.
  ///
  /// With `compress` set and a [`CompressionMap`] supplied, a suffix that
  /// already appeared in the message is replaced by a two-byte pointer and
  /// every newly written suffix is registered for later names. Offsets are
  /// relative to the start of `buf`, which must therefore hold the whole
  /// message being encoded.
  pub fn encode(
    &self,
    buf: &mut Vec<u8>,
    cmap: &mut Option<CompressionMap>,
    compress: bool,
  ) -> usize {
    let start = buf.len();
    self.encode_inner(Some(buf), start, cmap, compress)
  }

  /// Computes the bytes [`Name::encode`] would write for a name starting at
  /// message offset `off`, registering suffixes in `cmap` exactly as the
  /// real encoding pass would.
  pub fn encoded_len(
    &self,
    off: usize,
    cmap: &mut Option<CompressionMap>,
    compress: bool,
  ) -> usize {
    self.encode_inner(None, off, cmap, compress)
  }

  fn encode_inner(
    &self,
    mut out: Option<&mut Vec<u8>>,
    start: usize,
    cmap: &mut Option<CompressionMap>,
    compress: bool,
  ) -> usize {
    let mut written = 0usize;
    for (i, label) in self.labels.iter().enumerate() {
      if compress {
        if let Some(cmap) = cmap.as_mut() {
          let key = suffix_key(&self.labels[i..]);
          if let Some(ptr) = cmap.find(&key) {
            let ptr = COMPRESSION_POINTER_MASK | ptr;
            if let Some(out) = out.as_mut() {
              out.extend_from_slice(&ptr.to_be_bytes());
            }
            return written + 2;
          }

          let off = start + written;
          if off < MAX_COMPRESSION_OFFSET {
            cmap.insert(key, off as u16);
          }
        }
      }

      if let Some(out) = out.as_mut() {
        out.push(label.as_bytes().len() as u8);
        out.extend_from_slice(label.as_bytes());
      }
      written += 1 + label.as_bytes().len();
    }

    if let Some(out) = out {
      out.push(0);
    }
    written + 1
  }

  /// Decodes a name starting at `off`, following compression pointers.
  ///
  /// Returns the name and the offset of the first byte after it in the
  /// original stream (after the first pointer, if any were followed).
  pub fn decode(msg: &[u8], off: usize) -> Result<(Self, usize), ProtoError> {
    let mut labels = Vec::new();
    let mut off1 = 0;
    let lenmsg = msg.len();
    let mut off = off;
    let mut wire_len = 0usize;
    let mut ptr = 0; // number of pointers followed

    loop {
      if off >= lenmsg {
        return Err(ProtoError::ShortBuffer);
      }

      let c = msg[off];
      off += 1;

      match c & 0xC0 {
        0x00 => {
          if c == 0x00 {
            // end of name
            break;
          }

          let label_len = c as usize;
          if off + label_len > lenmsg {
            return Err(ProtoError::ShortBuffer);
          }

          wire_len += label_len + 1;
          if wire_len + 1 > MAX_DOMAIN_NAME_WIRE_OCTETS {
            return Err(ProtoError::MalformedName);
          }

          labels.push(Label::new(&msg[off..off + label_len])?);
          off += label_len;
        }
        0xC0 => {
          // pointer to somewhere else in msg.
          // remember location after first ptr,
          // since that's how many bytes we consumed
          if off >= lenmsg {
            return Err(ProtoError::ShortBuffer);
          }

          let c1 = msg[off];
          off += 1;

          if ptr == 0 {
            off1 = off;
          }

          ptr += 1;
          if ptr > MAX_COMPRESSION_POINTERS {
            return Err(ProtoError::MalformedName);
          }

          let target = (((c as usize) ^ 0xC0) << 8) | c1 as usize;
          // pointers may only refer backwards; a self- or forward-pointer
          // can never terminate
          if target >= off - 2 {
            return Err(ProtoError::MalformedName);
          }
          off = target;
        }
        _ => return Err(ProtoError::MalformedName),
      }
    }

    if ptr == 0 {
      off1 = off;
    }

    Ok((Self { labels }, off1))
  }
}

impl fmt::Debug for Name {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(self, f)
  }
}

impl fmt::Display for Name {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.labels.is_empty() {
      return f.write_char('.');
    }
    for label in &self.labels {
      label.fmt(f)?;
      f.write_char('.')?;
    }
    Ok(())
  }
}

impl FromStr for Name {
  type Err = ProtoError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s == "." || s.is_empty() {
      return Ok(Self::ROOT);
    }

    let mut labels = Vec::new();
    for label in s.split_terminator('.') {
      labels.push(label.parse()?);
    }
    Self::from_labels(labels)
  }
}

/// Used to allow an efficient compression map to be shared across the
/// encoding of one message.
///
/// Keys are length-prefixed, case-folded label suffixes; values are offsets
/// from the start of the message. The map is built up during a single
/// encode pass and discarded with it.
#[derive(Debug, Default)]
pub struct CompressionMap {
  map: HashMap<Box<[u8]>, u16>,
}

impl CompressionMap {
  /// Returns an empty map for a fresh encode pass.
  #[inline]
  pub fn new() -> Self {
    Self {
      map: HashMap::new(),
    }
  }

  #[inline]
  fn insert(&mut self, key: Box<[u8]>, pos: u16) {
    self.map.insert(key, pos);
  }

  #[inline]
  fn find(&self, key: &[u8]) -> Option<u16> {
    self.map.get(key).copied()
  }
}

fn suffix_key(labels: &[Label]) -> Box<[u8]> {
  let mut key = Vec::with_capacity(labels.iter().map(|l| l.as_bytes().len() + 1).sum());
  for label in labels {
    key.push(label.as_bytes().len() as u8);
    key.extend(label.as_bytes().iter().map(|b| b.to_ascii_lowercase()));
  }
  key.into_boxed_slice()
}
