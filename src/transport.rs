use core::{fmt, future::Future};
use std::{io, net::SocketAddr};

use agnostic_net::{Net, UdpSocket};
use iprobe::{ipv4, ipv6};
use smallvec_wrapper::TinyVec;

use crate::{
  utils::{multicast_udp4_socket, multicast_udp6_socket},
  ResponderOptions, IPV4_MDNS, IPV6_MDNS, MDNS_PORT,
};

// Receive buffers are sized for the largest packet RFC 6762 section 17
// allows on the local link, not for our own outgoing cap.
const MAX_PAYLOAD_SIZE: usize = 9000;

/// Identifies the link a datagram arrived on or leaves from.
///
/// The responder binds one multicast socket per address family, so an
/// interface here is one of the two sockets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterfaceId {
  /// The IPv4 multicast socket.
  V4,
  /// The IPv6 multicast socket.
  V6,
}

impl fmt::Display for InterfaceId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::V4 => f.write_str("v4"),
      Self::V6 => f.write_str("v6"),
    }
  }
}

/// Where an outgoing datagram goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
  /// The mDNS multicast group of the interface's address family.
  Multicast,
  /// A single host, used for legacy-unicast responses (RFC 6762
  /// section 6.7).
  Unicast(SocketAddr),
}

/// The abstract multicast send/receive contract the responder core runs
/// against.
///
/// Transports are expected to be lossy and unordered; all correctness
/// obligations live in the layers above. Send completion doubles as the
/// acknowledgement callers sequence their timers on.
pub trait Transport: Send + Sync + 'static {
  /// The interfaces this transport is bound on.
  fn interfaces(&self) -> TinyVec<InterfaceId>;

  /// Sends one datagram out of `interface`.
  fn send(
    &self,
    bytes: &[u8],
    interface: InterfaceId,
    dest: Destination,
  ) -> impl Future<Output = io::Result<()>> + Send;

  /// Awaits the next inbound datagram on any bound interface.
  fn recv(&self) -> impl Future<Output = io::Result<(InterfaceId, SocketAddr, Vec<u8>)>> + Send;
}

/// The socket-backed [`Transport`]: one multicast UDP socket per address
/// family, joined to the mDNS groups.
pub struct NetTransport<N: Net> {
  v4: Option<N::UdpSocket>,
  v6: Option<N::UdpSocket>,
}

impl<N: Net> NetTransport<N> {
  /// Binds the multicast sockets selected by the options.
  ///
  /// An address family that cannot be bound is logged and skipped; failing
  /// to bind both is an error.
  pub fn bind(opts: &ResponderOptions) -> io::Result<Self> {
    let v4 = if ipv4() {
      match multicast_udp4_socket(opts.ipv4_interface, MDNS_PORT)
        .and_then(<N::UdpSocket as TryFrom<_>>::try_from)
      {
        Ok(conn) => Some(conn),
        Err(e) => {
          tracing::error!(err=%e, "mdns responder: failed to bind to IPv4");
          None
        }
      }
    } else {
      None
    };

    let v6 = if ipv6() {
      match multicast_udp6_socket(opts.ipv6_interface, MDNS_PORT)
        .and_then(<N::UdpSocket as TryFrom<_>>::try_from)
      {
        Ok(conn) => Some(conn),
        Err(e) => {
          tracing::error!(err=%e, "mdns responder: failed to bind to IPv6");
          None
        }
      }
    } else {
      None
    };

    if v4.is_none() && v6.is_none() {
      return Err(io::Error::new(
        io::ErrorKind::InvalidInput,
        "no multicast listeners could be started",
      ));
    }

    Ok(Self { v4, v6 })
  }

  fn socket(&self, interface: InterfaceId) -> io::Result<&N::UdpSocket> {
    match interface {
      InterfaceId::V4 => self.v4.as_ref(),
      InterfaceId::V6 => self.v6.as_ref(),
    }
    .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "interface not bound"))
  }
}

impl<N: Net> Transport for NetTransport<N> {
  fn interfaces(&self) -> TinyVec<InterfaceId> {
    let mut interfaces = TinyVec::new();
    if self.v4.is_some() {
      interfaces.push(InterfaceId::V4);
    }
    if self.v6.is_some() {
      interfaces.push(InterfaceId::V6);
    }
    interfaces
  }

  async fn send(&self, bytes: &[u8], interface: InterfaceId, dest: Destination) -> io::Result<()> {
    let conn = self.socket(interface)?;
    let dest: SocketAddr = match (dest, interface) {
      (Destination::Unicast(addr), _) => addr,
      (Destination::Multicast, InterfaceId::V4) => (IPV4_MDNS, MDNS_PORT).into(),
      (Destination::Multicast, InterfaceId::V6) => (IPV6_MDNS, MDNS_PORT).into(),
    };

    conn.send_to(bytes, dest).await.map(|_| ())
  }

  async fn recv(&self) -> io::Result<(InterfaceId, SocketAddr, Vec<u8>)> {
    match (&self.v4, &self.v6) {
      (Some(v4), Some(v6)) => {
        let mut buf4 = vec![0; MAX_PAYLOAD_SIZE];
        let mut buf6 = vec![0; MAX_PAYLOAD_SIZE];
        enum Which {
          V4(io::Result<(usize, SocketAddr)>),
          V6(io::Result<(usize, SocketAddr)>),
        }

        let outcome = {
          let recv4 = v4.recv_from(&mut buf4);
          let recv6 = v6.recv_from(&mut buf6);
          futures::pin_mut!(recv4);
          futures::pin_mut!(recv6);

          match futures::future::select(recv4, recv6).await {
            futures::future::Either::Left((res, _)) => Which::V4(res),
            futures::future::Either::Right((res, _)) => Which::V6(res),
          }
        };

        match outcome {
          Which::V4(res) => res.map(|(len, addr)| {
            buf4.truncate(len);
            (InterfaceId::V4, addr, buf4)
          }),
          Which::V6(res) => res.map(|(len, addr)| {
            buf6.truncate(len);
            (InterfaceId::V6, addr, buf6)
          }),
        }
      }
      (Some(v4), None) => {
        let mut buf = vec![0; MAX_PAYLOAD_SIZE];
        let (len, addr) = v4.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((InterfaceId::V4, addr, buf))
      }
      (None, Some(v6)) => {
        let mut buf = vec![0; MAX_PAYLOAD_SIZE];
        let (len, addr) = v6.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((InterfaceId::V6, addr, buf))
      }
      (None, None) => Err(io::Error::new(
        io::ErrorKind::NotConnected,
        "no multicast listeners bound",
      )),
    }
  }
}
