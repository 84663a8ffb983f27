use core::cell::Cell;

use smallvec_wrapper::OneOrMore;

use crate::{
  error::ProtoError, name::CompressionMap, question::Question, record::Record, tiebreak,
  MESSAGE_HEADER_SIZE,
};

const QR_BIT: u16 = 1 << 15;
const OPCODE_SHIFT: u16 = 11;
const OPCODE_MASK: u16 = 0xF;
const AA_BIT: u16 = 1 << 10;
const TC_BIT: u16 = 1 << 9;
const RD_BIT: u16 = 1 << 8;
const RA_BIT: u16 = 1 << 7;
const Z_BIT: u16 = 1 << 6;
const AD_BIT: u16 = 1 << 5;
const CD_BIT: u16 = 1 << 4;
const RCODE_MASK: u16 = 0xF;

/// The flags word of the DNS message header.
///
/// ```text
///   0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |QR|   Opcode  |AA|TC|RD|RA| Z|AD|CD|   RCODE   |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Flags {
  response: bool,
  opcode: u8,
  authoritative: bool,
  truncated: bool,
  recursion_desired: bool,
  recursion_available: bool,
  zero: bool,
  authenticated_data: bool,
  checking_disabled: bool,
  response_code: u8,
}

impl Flags {
  /// Returns an all-zero flags word, i.e. a standard query.
  #[inline]
  pub const fn new() -> Self {
    Self {
      response: false,
      opcode: 0,
      authoritative: false,
      truncated: false,
      recursion_desired: false,
      recursion_available: false,
      zero: false,
      authenticated_data: false,
      checking_disabled: false,
      response_code: 0,
    }
  }

  /// Returns whether the QR bit is set.
  #[inline]
  pub const fn response(&self) -> bool {
    self.response
  }

  /// Sets the QR bit.
  #[inline]
  pub fn set_response(&mut self, response: bool) -> &mut Self {
    self.response = response;
    self
  }

  /// Returns the opcode.
  #[inline]
  pub const fn opcode(&self) -> u8 {
    self.opcode
  }

  /// Returns whether the AA bit is set.
  #[inline]
  pub const fn authoritative(&self) -> bool {
    self.authoritative
  }

  /// Sets the AA bit.
  #[inline]
  pub fn set_authoritative(&mut self, authoritative: bool) -> &mut Self {
    self.authoritative = authoritative;
    self
  }

  /// Returns whether the TC bit is set.
  #[inline]
  pub const fn truncated(&self) -> bool {
    self.truncated
  }

  /// Sets the TC bit.
  #[inline]
  pub fn set_truncated(&mut self, truncated: bool) -> &mut Self {
    self.truncated = truncated;
    self
  }

  /// Returns the response code.
  #[inline]
  pub const fn response_code(&self) -> u8 {
    self.response_code
  }

  /// Packs the flags into their wire representation.
  pub const fn to_u16(self) -> u16 {
    let mut bits = ((self.opcode as u16) & OPCODE_MASK) << OPCODE_SHIFT;
    bits |= (self.response_code as u16) & RCODE_MASK;
    if self.response {
      bits |= QR_BIT;
    }
    if self.authoritative {
      bits |= AA_BIT;
    }
    if self.truncated {
      bits |= TC_BIT;
    }
    if self.recursion_desired {
      bits |= RD_BIT;
    }
    if self.recursion_available {
      bits |= RA_BIT;
    }
    if self.zero {
      bits |= Z_BIT;
    }
    if self.authenticated_data {
      bits |= AD_BIT;
    }
    if self.checking_disabled {
      bits |= CD_BIT;
    }
    bits
  }

  /// Unpacks a wire flags word.
  pub const fn from_u16(bits: u16) -> Self {
    Self {
      response: bits & QR_BIT != 0,
      opcode: ((bits >> OPCODE_SHIFT) & OPCODE_MASK) as u8,
      authoritative: bits & AA_BIT != 0,
      truncated: bits & TC_BIT != 0,
      recursion_desired: bits & RD_BIT != 0,
      recursion_available: bits & RA_BIT != 0,
      zero: bits & Z_BIT != 0,
      authenticated_data: bits & AD_BIT != 0,
      checking_disabled: bits & CD_BIT != 0,
      response_code: (bits & RCODE_MASK) as u8,
    }
  }
}

/// A DNS message: the fixed header plus the four record sections.
///
/// The section counts of the header are derived from the section lengths at
/// encode time. A message keeps two length figures: a cheap uncompressed
/// upper bound maintained incrementally as records are added, and the real
/// compressed length, computed on demand with a fresh coder and cached
/// until the next mutation.
#[derive(Debug, Clone)]
pub struct Message {
  id: u16,
  flags: Flags,
  questions: Vec<Question>,
  answers: Vec<Record>,
  authorities: Vec<Record>,
  additionals: Vec<Record>,
  /// Encode the SRV target uncompressed for legacy resolvers
  /// (RFC 6762 section 6.7).
  legacy_unicast: bool,
  estimate: usize,
  real_len: Cell<Option<usize>>,
}

impl PartialEq for Message {
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
      && self.flags == other.flags
      && self.questions == other.questions
      && self.answers == other.answers
      && self.authorities == other.authorities
      && self.additionals == other.additionals
  }
}

impl Eq for Message {}

impl Message {
  /// Creates an empty message.
  pub fn new(id: u16, flags: Flags) -> Self {
    Self {
      id,
      flags,
      questions: Vec::new(),
      answers: Vec::new(),
      authorities: Vec::new(),
      additionals: Vec::new(),
      legacy_unicast: false,
      estimate: 0,
      real_len: Cell::new(None),
    }
  }

  /// Returns the message id.
  #[inline]
  pub const fn id(&self) -> u16 {
    self.id
  }

  /// Returns the header flags.
  #[inline]
  pub const fn flags(&self) -> &Flags {
    &self.flags
  }

  /// Returns the question section.
  #[inline]
  pub fn questions(&self) -> &[Question] {
    &self.questions
  }

  /// Returns the answer section.
  #[inline]
  pub fn answers(&self) -> &[Record] {
    &self.answers
  }

  /// Returns the authority section.
  #[inline]
  pub fn authorities(&self) -> &[Record] {
    &self.authorities
  }

  /// Returns the additional section.
  #[inline]
  pub fn additionals(&self) -> &[Record] {
    &self.additionals
  }

  /// Returns whether the message uses the legacy-unicast encoding.
  #[inline]
  pub const fn legacy_unicast(&self) -> bool {
    self.legacy_unicast
  }

  /// Switches the message to the legacy-unicast encoding.
  pub fn set_legacy_unicast(&mut self, legacy_unicast: bool) {
    self.legacy_unicast = legacy_unicast;
    self.real_len.set(None);
  }

  /// Sets the TC bit.
  pub fn set_truncated(&mut self, truncated: bool) {
    self.flags.set_truncated(truncated);
  }

  /// Appends a question.
  pub fn add_question(&mut self, question: Question) {
    self.estimate += question.encoded_len(0, &mut None);
    self.real_len.set(None);
    self.questions.push(question);
  }

  /// Appends an answer record.
  pub fn add_answer(&mut self, record: Record) {
    self.estimate += record.uncompressed_len();
    self.real_len.set(None);
    self.answers.push(record);
  }

  /// Appends an authority record.
  pub fn add_authority(&mut self, record: Record) {
    self.estimate += record.uncompressed_len();
    self.real_len.set(None);
    self.authorities.push(record);
  }

  /// Appends an additional record.
  pub fn add_additional(&mut self, record: Record) {
    self.estimate += record.uncompressed_len();
    self.real_len.set(None);
    self.additionals.push(record);
  }

  fn pop_answer(&mut self) -> Option<Record> {
    let record = self.answers.pop()?;
    self.estimate -= record.uncompressed_len();
    self.real_len.set(None);
    Some(record)
  }

  /// An upper bound on the encoded length, maintained incrementally: the
  /// header plus the uncompressed wire length of every section entry.
  #[inline]
  pub fn estimated_len(&self) -> usize {
    MESSAGE_HEADER_SIZE + self.estimate
  }

  /// The real encoded length under compression.
  ///
  /// Computed with a fresh coder and cached until the next mutation.
  pub fn encoded_len(&self) -> usize {
    if let Some(len) = self.real_len.get() {
      return len;
    }

    let len = self.wire_encode().len();
    self.real_len.set(Some(len));
    len
  }

  /// Encodes the whole message.
  pub fn encode(&self) -> Vec<u8> {
    let buf = self.wire_encode();
    self.real_len.set(Some(buf.len()));
    buf
  }

  fn wire_encode(&self) -> Vec<u8> {
    let mut buf = Vec::with_capacity(self.estimated_len());
    buf.extend_from_slice(&self.id.to_be_bytes());
    buf.extend_from_slice(&self.flags.to_u16().to_be_bytes());
    buf.extend_from_slice(&(self.questions.len() as u16).to_be_bytes());
    buf.extend_from_slice(&(self.answers.len() as u16).to_be_bytes());
    buf.extend_from_slice(&(self.authorities.len() as u16).to_be_bytes());
    buf.extend_from_slice(&(self.additionals.len() as u16).to_be_bytes());

    let mut cmap = Some(CompressionMap::new());
    for question in &self.questions {
      question.encode(&mut buf, &mut cmap);
    }
    for record in &self.answers {
      record.encode(&mut buf, &mut cmap, self.legacy_unicast);
    }
    for record in &self.authorities {
      record.encode(&mut buf, &mut cmap, self.legacy_unicast);
    }
    for record in &self.additionals {
      record.encode(&mut buf, &mut cmap, self.legacy_unicast);
    }
    buf
  }

  /// Decodes a message.
  ///
  /// Questions and records with types the codec does not model are skipped.
  /// Bytes left over after all header-counted entries is an error: the
  /// datagram is not a DNS message.
  pub fn decode(src: &[u8]) -> Result<Self, ProtoError> {
    if src.len() < MESSAGE_HEADER_SIZE {
      return Err(ProtoError::ShortBuffer);
    }

    let id = u16::from_be_bytes([src[0], src[1]]);
    let flags = Flags::from_u16(u16::from_be_bytes([src[2], src[3]]));
    let qdcount = u16::from_be_bytes([src[4], src[5]]);
    let ancount = u16::from_be_bytes([src[6], src[7]]);
    let nscount = u16::from_be_bytes([src[8], src[9]]);
    let arcount = u16::from_be_bytes([src[10], src[11]]);

    let mut msg = Message::new(id, flags);
    let mut off = MESSAGE_HEADER_SIZE;

    for _ in 0..qdcount {
      let (question, next) = Question::decode(src, off)?;
      if let Some(question) = question {
        msg.questions.push(question);
      }
      off = next;
    }

    for section in 0..3 {
      let count = match section {
        0 => ancount,
        1 => nscount,
        _ => arcount,
      };
      for _ in 0..count {
        let (record, next) = Record::decode(src, off)?;
        match record {
          Some(record) => match section {
            0 => msg.answers.push(record),
            1 => msg.authorities.push(record),
            _ => msg.additionals.push(record),
          },
          None => {
            #[cfg(feature = "tracing")]
            tracing::trace!(off, "mdns message: skipping record with unmodeled type");
          }
        }
        off = next;
      }
    }

    if off != src.len() {
      return Err(ProtoError::TrailingGarbage);
    }

    msg.estimate = msg.recompute_estimate();
    Ok(msg)
  }

  fn recompute_estimate(&self) -> usize {
    self
      .questions
      .iter()
      .map(|q| q.encoded_len(0, &mut None))
      .sum::<usize>()
      + self
        .answers
        .iter()
        .chain(self.authorities.iter())
        .chain(self.additionals.iter())
        .map(|r| r.uncompressed_len())
        .sum::<usize>()
  }

  /// Merges `other` into this message if the headers are compatible (same
  /// id, QR, opcode and rcode via byte-equal flags) and the merged message
  /// still fits in `cap` bytes.
  ///
  /// On success the sections are concatenated and the legacy-unicast flags
  /// are ORed. Returns whether the merge happened; on `false`, `self` is
  /// unchanged.
  pub fn try_combine(&mut self, other: &Message, cap: usize) -> bool {
    if self.id != other.id || self.flags.to_u16() != other.flags.to_u16() {
      return false;
    }

    let mut merged = self.clone();
    for question in &other.questions {
      merged.add_question(question.clone());
    }
    for record in &other.answers {
      merged.add_answer(record.clone());
    }
    for record in &other.authorities {
      merged.add_authority(record.clone());
    }
    for record in &other.additionals {
      merged.add_additional(record.clone());
    }
    merged.legacy_unicast |= other.legacy_unicast;

    if merged.encoded_len() > cap {
      return false;
    }

    *self = merged;
    true
  }

  /// Builds the datagrams for an outgoing query with known-answer
  /// suppression (RFC 6762 section 7.1/7.2).
  ///
  /// All questions go into the first packet; known answers are appended in
  /// ascending size order and spill into TC-chained continuation packets
  /// when the cap is reached. A single answer larger than the whole cap is
  /// emitted alone in its own packet (RFC 6762 section 17).
  pub fn build_queries(
    id: u16,
    questions: Vec<Question>,
    mut known_answers: Vec<Record>,
    cap: usize,
  ) -> Result<OneOrMore<Message>, ProtoError> {
    let mut primary = Message::new(id, Flags::new());
    for question in questions {
      primary.add_question(question);
    }
    if primary.encoded_len() > cap {
      return Err(ProtoError::QuerySectionTooLarge(cap));
    }

    known_answers.sort_by_key(|r| r.uncompressed_len());

    let mut packets = OneOrMore::new();
    packets.push(primary);

    for answer in known_answers {
      loop {
        let current = packets.last_mut().expect("at least the primary packet");

        if current.estimated_len() + answer.uncompressed_len() <= cap {
          current.add_answer(answer);
          break;
        }

        // the estimate is pessimistic; the compressed form may still fit
        current.add_answer(answer.clone());
        if current.encoded_len() <= cap {
          break;
        }
        current.pop_answer();

        if current.questions.is_empty() && current.answers.is_empty() {
          // a lone record above the cap is sent anyway and the OS
          // fragments the datagram (RFC 6762 section 17)
          current.add_answer(answer);
          packets.push(Message::new(id, Flags::new()));
          break;
        }

        packets.push(Message::new(id, Flags::new()));
      }
    }

    // the oversize path can leave an unused trailing packet behind
    if packets.len() > 1 {
      let empty = {
        let last = &packets[packets.len() - 1];
        last.questions.is_empty() && last.answers.is_empty()
      };
      if empty {
        packets.pop();
      }
    }

    let last = packets.len() - 1;
    for packet in packets.iter_mut().take(last) {
      packet.set_truncated(true);
    }

    Ok(packets)
  }

  /// Builds a probe query: the questions plus every record the prober
  /// intends to publish in the authority section, sorted canonically
  /// (RFC 6762 section 8.1/8.2).
  ///
  /// Probes are never split; an oversize probe is an error.
  pub fn build_probe(
    id: u16,
    questions: Vec<Question>,
    mut authorities: Vec<Record>,
    cap: usize,
  ) -> Result<Message, ProtoError> {
    tiebreak::sort_canonical(&mut authorities);

    let mut msg = Message::new(id, Flags::new());
    for question in questions {
      msg.add_question(question);
    }
    for record in authorities {
      msg.add_authority(record);
    }

    if msg.encoded_len() > cap {
      return Err(ProtoError::ProbeTooLarge(cap));
    }
    Ok(msg)
  }

  /// Builds a response message with the AA bit set.
  ///
  /// `legacy_unicast_id` mirrors the id of a legacy query and switches the
  /// message to the legacy-unicast encoding; multicast responses use id 0
  /// (RFC 6762 section 18.1).
  ///
  /// An oversize response is an error unless it consists of exactly one
  /// answer record (RFC 6762 section 17); callers must decompose the
  /// record set themselves.
  pub fn build_response(
    answers: Vec<Record>,
    additionals: Vec<Record>,
    legacy_unicast_id: Option<u16>,
    cap: usize,
  ) -> Result<Message, ProtoError> {
    let mut flags = Flags::new();
    flags.set_response(true).set_authoritative(true);

    let mut msg = Message::new(legacy_unicast_id.unwrap_or(0), flags);
    msg.legacy_unicast = legacy_unicast_id.is_some();

    let oversize_exempt = answers.len() == 1 && additionals.is_empty();
    for record in answers {
      msg.add_answer(record);
    }
    for record in additionals {
      msg.add_additional(record);
    }

    if msg.encoded_len() > cap && !oversize_exempt {
      return Err(ProtoError::ResponseTooLarge(cap));
    }
    Ok(msg)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    name::Name,
    rdata::{RecordData, Srv, Txt},
    record::RecordType,
    DEFAULT_UDP_PAYLOAD_SIZE,
  };

  fn name(s: &str) -> Name {
    s.parse().unwrap()
  }

  fn ptr(owner: &str, target: &str) -> Record {
    Record::from_rdata(name(owner), 4500, RecordData::PTR(name(target)))
  }

  fn response_with(answers: Vec<Record>) -> Message {
    Message::build_response(answers, Vec::new(), None, DEFAULT_UDP_PAYLOAD_SIZE).unwrap()
  }

  #[test]
  fn round_trip() {
    let mut flags = Flags::new();
    flags.set_response(true).set_authoritative(true);
    let mut msg = Message::new(0, flags);
    msg.add_answer(ptr("_hap._tcp.local", "Living Room._hap._tcp.local"));
    msg.add_answer(
      Record::from_rdata(
        name("Living Room._hap._tcp.local"),
        120,
        RecordData::SRV(Srv::new(0, 0, 51826, name("box.local"))),
      )
      .with_cache_flush(true),
    );
    msg.add_additional(Record::from_rdata(
      name("box.local"),
      120,
      RecordData::A([192, 168, 1, 7].into()),
    ));

    let wire = msg.encode();
    // header counts match the section sizes
    assert_eq!(u16::from_be_bytes([wire[6], wire[7]]), 2);
    assert_eq!(u16::from_be_bytes([wire[10], wire[11]]), 1);

    let decoded = Message::decode(&wire).unwrap();
    assert_eq!(decoded, msg);
    assert_eq!(decoded.estimated_len(), msg.estimated_len());
  }

  #[test]
  fn compression_is_deterministic() {
    let msg = response_with(vec![
      ptr("_hap._tcp.local", "A._hap._tcp.local"),
      ptr("_hap._tcp.local", "B._hap._tcp.local"),
    ]);

    let wire = msg.encode();
    let rewire = Message::decode(&wire).unwrap().encode();
    assert_eq!(wire.len(), rewire.len());
    assert_eq!(wire, rewire);
  }

  #[test]
  fn shared_suffix_becomes_pointer() {
    let first = ptr("_hap._tcp.local", "Living Room._hap._tcp.local");
    let second = ptr("_hap._tcp.local", "Kitchen._hap._tcp.local");
    let msg = response_with(vec![first, second]);

    // first record: full owner name, then "Living Room" + pointer;
    // second record: pointer owner, then "Kitchen" + pointer
    let owner_len = name("_hap._tcp.local").wire_len();
    let first_len = owner_len + 10 + (1 + 11 + 2);
    let second_len = 2 + 10 + (1 + 7 + 2);
    assert_eq!(
      msg.encoded_len(),
      MESSAGE_HEADER_SIZE + first_len + second_len
    );

    let decoded = Message::decode(&msg.encode()).unwrap();
    assert_eq!(decoded.answers(), msg.answers());
  }

  #[test]
  fn estimate_never_underestimates() {
    let msg = response_with(vec![
      ptr("_hap._tcp.local", "A._hap._tcp.local"),
      ptr("_hap._tcp.local", "B._hap._tcp.local"),
    ]);
    assert!(msg.estimated_len() >= msg.encoded_len());
  }

  #[test]
  fn length_cache_invalidated_by_mutation() {
    let mut msg = response_with(vec![ptr("_hap._tcp.local", "A._hap._tcp.local")]);
    let before = msg.encoded_len();
    msg.add_answer(ptr("_hap._tcp.local", "B._hap._tcp.local"));
    assert!(msg.encoded_len() > before);
  }

  fn known_answer(i: usize) -> Record {
    // a 36-byte single-label name makes each record exactly 50 wire bytes
    let label = format!("ka{:03}{}", i, "x".repeat(29));
    Record::from_rdata(
      Name::from_labels([label.parse().unwrap()]).unwrap(),
      120,
      RecordData::A([10, 0, 0, 1].into()),
    )
  }

  #[test]
  fn known_answer_splitting() {
    let question = Question::new(name("query.local"), RecordType::PTR);
    let answers: Vec<_> = (0..300).map(known_answer).collect();
    assert!(answers.iter().all(|a| a.uncompressed_len() == 50));

    let packets =
      Message::build_queries(0, vec![question], answers.clone(), DEFAULT_UDP_PAYLOAD_SIZE)
        .unwrap();

    assert!(packets.len() >= 11);
    for (i, packet) in packets.iter().enumerate() {
      assert!(packet.encoded_len() <= DEFAULT_UDP_PAYLOAD_SIZE);
      assert_eq!(packet.flags().truncated(), i != packets.len() - 1);
    }
    assert_eq!(packets[0].questions().len(), 1);

    // all answers survive, in ascending-size order (here: input order)
    let emitted: Vec<_> = packets.iter().flat_map(|p| p.answers().iter()).collect();
    assert_eq!(emitted.len(), answers.len());
    for (got, want) in emitted.iter().zip(answers.iter()) {
      assert!(got.data_eq(want));
    }
  }

  #[test]
  fn query_section_too_large() {
    let questions = (0..200)
      .map(|i| {
        Question::new(
          Name::from_labels([format!("q{:03}{}", i, "y".repeat(20)).parse().unwrap()]).unwrap(),
          RecordType::ANY,
        )
      })
      .collect();

    assert_eq!(
      Message::build_queries(0, questions, Vec::new(), 1440).unwrap_err(),
      ProtoError::QuerySectionTooLarge(1440)
    );
  }

  #[test]
  fn oversize_single_answer_is_emitted_alone() {
    let big = Record::from_rdata(
      name("big.local"),
      120,
      RecordData::TXT(Txt::new(vec![vec![b'x'; 200]; 10]).unwrap()),
    );
    let small = known_answer(0);
    let cap = 600;
    assert!(big.uncompressed_len() > cap);

    let packets =
      Message::build_queries(0, Vec::new(), vec![small.clone(), big.clone()], cap).unwrap();

    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0].answers().len(), 1);
    assert!(packets[0].answers()[0].data_eq(&small));
    assert!(packets[1].answers()[0].data_eq(&big));
    assert!(packets[1].encoded_len() > cap);
  }

  #[test]
  fn probe_too_large_is_not_split() {
    let questions = vec![Question::new(name("box.local"), RecordType::ANY)];
    let authorities = (0..100).map(known_answer).collect();
    assert_eq!(
      Message::build_probe(0, questions, authorities, 1440).unwrap_err(),
      ProtoError::ProbeTooLarge(1440)
    );
  }

  #[test]
  fn response_sets_aa_and_legacy_id() {
    let multicast = response_with(vec![known_answer(0)]);
    assert_eq!(multicast.id(), 0);
    assert!(multicast.flags().response());
    assert!(multicast.flags().authoritative());
    assert!(!multicast.legacy_unicast());

    let legacy =
      Message::build_response(vec![known_answer(0)], Vec::new(), Some(0x1234), 1440).unwrap();
    assert_eq!(legacy.id(), 0x1234);
    assert!(legacy.legacy_unicast());
  }

  #[test]
  fn response_too_large() {
    let answers: Vec<_> = (0..40).map(known_answer).collect();
    assert_eq!(
      Message::build_response(answers, Vec::new(), None, 600).unwrap_err(),
      ProtoError::ResponseTooLarge(600)
    );

    // the single-record carve-out still applies
    let big = Record::from_rdata(
      name("big.local"),
      120,
      RecordData::TXT(Txt::new(vec![vec![b'x'; 200]; 10]).unwrap()),
    );
    assert!(Message::build_response(vec![big], Vec::new(), None, 600).is_ok());
  }

  #[test]
  fn combine_concatenates_compatible_packets() {
    let mut a = response_with(vec![known_answer(0)]);
    let b = response_with(vec![known_answer(1)]);
    assert!(a.try_combine(&b, DEFAULT_UDP_PAYLOAD_SIZE));
    assert_eq!(a.answers().len(), 2);

    // a query does not combine with a response
    let query = Message::new(0, Flags::new());
    assert!(!a.try_combine(&query, DEFAULT_UDP_PAYLOAD_SIZE));

    // combining must respect the cap
    let mut c = response_with(vec![known_answer(2)]);
    let d = response_with((3..30).map(known_answer).collect());
    assert!(!c.try_combine(&d, 600));
    assert_eq!(c.answers().len(), 1);
  }
}
