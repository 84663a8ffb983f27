#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(unexpected_cfgs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]

/// The error type for the wire protocol engine
pub mod error;

/// Domain names, labels and the compression coder
pub mod name;

/// DNS questions
pub mod question;

/// Typed resource records
pub mod record;

/// Record data variants
pub mod rdata;

/// DNS messages, header flags and the packet builders
pub mod message;

/// Canonical record ordering and simultaneous-probe tiebreaking
pub mod tiebreak;

pub use error::ProtoError;
pub use message::{Flags, Message};
pub use name::{CompressionMap, Label, Name};
pub use question::Question;
pub use rdata::{Nsec, RecordData, Srv, Txt};
pub use record::{Record, RecordType, UnknownRecordType, UnknownRecordTypeStr};
pub use tiebreak::TiebreakResult;

/// The size of the fixed DNS message header.
pub const MESSAGE_HEADER_SIZE: usize = 12;

/// Default UDP payload cap for outgoing packets.
///
/// See RFC 6762 section 17: a conservative value that fits inside a
/// 1500-byte Ethernet frame with IP and UDP headers to spare.
pub const DEFAULT_UDP_PAYLOAD_SIZE: usize = 1440;

/// The DNS class used by everything mDNS sends (Internet).
pub const DNS_CLASS_IN: u16 = 1;

/// Top bit of the class field: cache-flush in records, unicast-response in
/// questions (RFC 6762 sections 10.2 and 5.4).
pub const CLASS_TOP_BIT: u16 = 1 << 15;

pub(crate) const MAX_DOMAIN_NAME_WIRE_OCTETS: usize = 255;
pub(crate) const MAX_LABEL_LEN: usize = 63;
pub(crate) const MAX_COMPRESSION_POINTERS: usize = 128;
pub(crate) const MAX_COMPRESSION_OFFSET: usize = 2 << 13;
pub(crate) const COMPRESSION_POINTER_MASK: u16 = 0xC000;
