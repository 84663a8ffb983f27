use crate::{
  error::ProtoError,
  name::{CompressionMap, Name},
  record::RecordType,
  CLASS_TOP_BIT, DNS_CLASS_IN,
};

// qtype(2) + qclass(2)
const QUESTION_ENCODED_WITHOUT_NAME_SIZE: usize = 4;

/// A DNS question.
///
/// The top bit of the qclass field is the unicast-response bit of RFC 6762
/// section 5.4; it is stripped on decode and reapplied on encode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Question {
  name: Name,
  ty: RecordType,
  class: u16,
  unicast_response: bool,
}

impl Question {
  /// Creates a new IN-class question.
  pub fn new(name: Name, ty: RecordType) -> Self {
    Self {
      name,
      ty,
      class: DNS_CLASS_IN,
      unicast_response: false,
    }
  }

  /// Sets the unicast-response bit.
  #[inline]
  pub fn with_unicast_response(mut self, unicast_response: bool) -> Self {
    self.unicast_response = unicast_response;
    self
  }

  /// Returns the name being queried.
  #[inline]
  pub const fn name(&self) -> &Name {
    &self.name
  }

  /// Returns the query type.
  #[inline]
  pub const fn ty(&self) -> RecordType {
    self.ty
  }

  /// Returns the query class, without the unicast-response bit.
  #[inline]
  pub const fn class(&self) -> u16 {
    self.class
  }

  /// Returns whether a unicast response is requested.
  #[inline]
  pub const fn unicast_response(&self) -> bool {
    self.unicast_response
  }

  /// The bytes this question occupies when encoded at message offset `off`
  /// under the given coder state.
  pub fn encoded_len(&self, off: usize, cmap: &mut Option<CompressionMap>) -> usize {
    self.name.encoded_len(off, cmap, true) + QUESTION_ENCODED_WITHOUT_NAME_SIZE
  }

  pub(crate) fn encode(&self, buf: &mut Vec<u8>, cmap: &mut Option<CompressionMap>) {
    self.name.encode(buf, cmap, true);
    buf.extend_from_slice(&u16::from(self.ty).to_be_bytes());
    let class = if self.unicast_response {
      self.class | CLASS_TOP_BIT
    } else {
      self.class
    };
    buf.extend_from_slice(&class.to_be_bytes());
  }

  /// Decodes one question, returning `None` (but still consuming the
  /// bytes) for query types the codec does not model.
  pub(crate) fn decode(msg: &[u8], off: usize) -> Result<(Option<Self>, usize), ProtoError> {
    let (name, off) = Name::decode(msg, off)?;
    if msg.len() < off + QUESTION_ENCODED_WITHOUT_NAME_SIZE {
      return Err(ProtoError::ShortBuffer);
    }

    let ty = u16::from_be_bytes([msg[off], msg[off + 1]]);
    let raw_class = u16::from_be_bytes([msg[off + 2], msg[off + 3]]);
    let off = off + QUESTION_ENCODED_WITHOUT_NAME_SIZE;

    let ty = match RecordType::try_from(ty) {
      Ok(ty) => ty,
      Err(_) => return Ok((None, off)),
    };

    Ok((
      Some(Self {
        name,
        ty,
        class: raw_class & !CLASS_TOP_BIT,
        unicast_response: raw_class & CLASS_TOP_BIT != 0,
      }),
      off,
    ))
  }
}
