/// The errors raised by the codec and the packet builders.
///
/// Decode-side variants mean the offending datagram should be dropped and
/// the caller carries on. Builder-side variants are programmer or
/// configuration errors and are fatal to the operation that raised them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum ProtoError {
  /// A domain name could not be decoded: a compression pointer points
  /// forward or to itself, the pointer chain is too long, a label length
  /// byte uses the reserved `0b01`/`0b10` prefix, or the decoded name
  /// exceeds 255 wire octets.
  #[error("malformed domain name")]
  MalformedName,
  /// A resource record's rdata does not match its declared type or length.
  #[error("malformed resource record")]
  MalformedRecord,
  /// The buffer ended before the structure was complete.
  #[error("buffer too short")]
  ShortBuffer,
  /// Bytes remained after every header-counted section was decoded.
  #[error("trailing bytes after message")]
  TrailingGarbage,
  /// The question section alone exceeds the UDP payload cap, so the query
  /// cannot be split into conforming datagrams.
  #[error("query section does not fit in {0} bytes")]
  QuerySectionTooLarge(usize),
  /// A probe query (questions plus all proposed records) exceeds the UDP
  /// payload cap. Probes are never split.
  #[error("probe query does not fit in {0} bytes")]
  ProbeTooLarge(usize),
  /// A response exceeds the UDP payload cap and does not qualify for the
  /// single-record oversize carve-out of RFC 6762 section 17.
  #[error("response does not fit in {0} bytes")]
  ResponseTooLarge(usize),
  /// A label is empty or longer than 63 bytes.
  #[error("invalid label of {0} bytes")]
  InvalidLabel(usize),
  /// A name's wire form exceeds 255 octets.
  #[error("domain name too long")]
  NameTooLong,
  /// Record data that cannot be represented on the wire, e.g. a TXT string
  /// over 255 bytes or TXT rdata over 65535 bytes.
  #[error("invalid rdata")]
  InvalidRdata,
}
