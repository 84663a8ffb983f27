#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(unexpected_cfgs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(docsrs, allow(unused_attributes))]


use std::{
  io,
  net::{Ipv4Addr, Ipv6Addr},
};

pub use beacon_proto as proto;
pub use beacon_proto::{
  Flags, Message, Name, ProtoError, Question, Record, RecordData, RecordType, Srv, TiebreakResult,
  Txt, DEFAULT_UDP_PAYLOAD_SIZE,
};

pub use iprobe as netprobe;
pub use smol_str::{format_smolstr, SmolStr};

const IPV4_MDNS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
const IPV6_MDNS: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);
const MDNS_PORT: u16 = 5353;

/// The three-probe uniqueness check of RFC 6762 section 8
pub mod probe;

/// The delayed, coalescing response queue of RFC 6762 section 6
pub mod queue;

/// The responder processing loop
pub mod responder;

/// The service record set published by a responder
pub mod service;

/// The multicast transport facade and its socket implementation
pub mod transport;

mod utils;

pub use probe::{ProbeError, Prober};
pub use queue::ResponseQueue;
pub use responder::Responder;
pub use service::{Service, ServiceBuilder};
pub use transport::{Destination, InterfaceId, NetTransport, Transport};

/// The options for a [`Responder`].
#[derive(Clone, Debug)]
pub struct ResponderOptions {
  pub(crate) ipv4_interface: Option<Ipv4Addr>,
  pub(crate) ipv6_interface: Option<u32>,
  pub(crate) udp_payload_size: usize,
  pub(crate) log_empty_responses: bool,
}

impl Default for ResponderOptions {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl ResponderOptions {
  /// Returns a new instance of [`ResponderOptions`].
  #[inline]
  pub const fn new() -> Self {
    Self {
      ipv4_interface: None,
      ipv6_interface: None,
      udp_payload_size: DEFAULT_UDP_PAYLOAD_SIZE,
      log_empty_responses: false,
    }
  }

  /// Returns the IPv4 interface to bind the multicast listener to.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use beacon_mdns::ResponderOptions;
  /// use std::net::Ipv4Addr;
  ///
  /// let opts = ResponderOptions::new().with_ipv4_interface(Ipv4Addr::new(192, 168, 1, 1));
  /// assert_eq!(opts.ipv4_interface(), Some(&Ipv4Addr::new(192, 168, 1, 1)));
  /// ```
  #[inline]
  pub const fn ipv4_interface(&self) -> Option<&Ipv4Addr> {
    self.ipv4_interface.as_ref()
  }

  /// Sets the IPv4 interface to bind the multicast listener to.
  #[inline]
  pub fn with_ipv4_interface(mut self, iface: Ipv4Addr) -> Self {
    self.ipv4_interface = Some(iface);
    self
  }

  /// Returns the IPv6 interface to bind the multicast listener to.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use beacon_mdns::ResponderOptions;
  ///
  /// let opts = ResponderOptions::new().with_ipv6_interface(1);
  /// assert_eq!(opts.ipv6_interface(), Some(1));
  /// ```
  #[inline]
  pub const fn ipv6_interface(&self) -> Option<u32> {
    self.ipv6_interface
  }

  /// Sets the IPv6 interface to bind the multicast listener to.
  #[inline]
  pub fn with_ipv6_interface(mut self, index: u32) -> Self {
    self.ipv6_interface = Some(index);
    self
  }

  /// Returns the UDP payload cap for outgoing packets.
  ///
  /// Defaults to [`DEFAULT_UDP_PAYLOAD_SIZE`].
  ///
  /// ## Example
  ///
  /// ```rust
  /// use beacon_mdns::ResponderOptions;
  ///
  /// let opts = ResponderOptions::new().with_udp_payload_size(9000);
  /// assert_eq!(opts.udp_payload_size(), 9000);
  /// ```
  #[inline]
  pub const fn udp_payload_size(&self) -> usize {
    self.udp_payload_size
  }

  /// Sets the UDP payload cap for outgoing packets.
  #[inline]
  pub fn with_udp_payload_size(mut self, udp_payload_size: usize) -> Self {
    self.udp_payload_size = udp_payload_size;
    self
  }

  /// Sets whether the responder should log an informative message when
  /// there is an mDNS query for which it has no response.
  ///
  /// Default is `false`.
  #[inline]
  pub fn with_log_empty_responses(mut self, log_empty_responses: bool) -> Self {
    self.log_empty_responses = log_empty_responses;
    self
  }

  /// Returns whether the responder logs queries it has no response for.
  #[inline]
  pub const fn log_empty_responses(&self) -> bool {
    self.log_empty_responses
  }
}

/// Types for `tokio` runtime
#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
pub mod tokio {
  pub use agnostic_net::{runtime::tokio::TokioRuntime as Runtime, tokio::Net};

  /// A responder that runs on the `tokio` runtime.
  pub type Responder = super::Responder<super::NetTransport<Net>, Runtime>;
}

/// Types for `smol` runtime
#[cfg(feature = "smol")]
#[cfg_attr(docsrs, doc(cfg(feature = "smol")))]
pub mod smol {
  pub use agnostic_net::{runtime::smol::SmolRuntime as Runtime, smol::Net};

  /// A responder that runs on the `smol` runtime.
  pub type Responder = super::Responder<super::NetTransport<Net>, Runtime>;
}

/// Types for `async-std` runtime
#[cfg(feature = "async-std")]
#[cfg_attr(docsrs, doc(cfg(feature = "async-std")))]
pub mod async_std {
  pub use agnostic_net::{async_std::Net, runtime::async_std::AsyncStdRuntime as Runtime};

  /// A responder that runs on the `async-std` runtime.
  pub type Responder = super::Responder<super::NetTransport<Net>, Runtime>;
}

pub use agnostic_net as net;

/// Returns `true` if a domain name is a fully qualified domain name.
#[inline]
pub fn is_fqdn(s: &str) -> bool {
  let len = s.len();
  if s.is_empty() || !s.ends_with('.') {
    return false;
  }

  let s = &s[..len - 1];

  if s.is_empty() || !s.ends_with('\\') {
    return true;
  }

  // Count backslashes at the end
  let last_non_backslash = s.rfind(|c| c != '\\').unwrap_or(0);

  (len - last_non_backslash) % 2 == 0
}

fn invalid_input_err<E>(e: E) -> io::Error
where
  E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
  io::Error::new(io::ErrorKind::InvalidInput, e)
}
