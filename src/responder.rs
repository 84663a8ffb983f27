use core::marker::PhantomData;
use std::{
  io,
  net::SocketAddr,
  sync::{
    atomic::{AtomicBool, Ordering},
    RwLock,
  },
  time::{Duration, Instant},
};

use agnostic_net::{
  runtime::{AsyncSpawner, RuntimeLite},
  Net,
};
use async_channel::{Receiver, Sender};
use atomic_refcell::AtomicRefCell;
use futures::{stream::FuturesUnordered, FutureExt, StreamExt as _};
use smallvec_wrapper::SmallVec;
use triomphe::Arc;

use beacon_proto::{Message, Name, Record, RecordType};

use crate::{
  invalid_input_err,
  probe::{self, ProbeError, ProbeReaction, Prober},
  queue::{self, ResponseQueue},
  service::Service,
  transport::{Destination, InterfaceId, NetTransport, Transport},
  ResponderOptions, MDNS_PORT,
};

/// Gap between the two announcements of a freshly claimed record set
/// (RFC 6762 section 8.3).
const ANNOUNCE_INTERVAL: Duration = Duration::from_secs(1);

/// A decoded inbound datagram, as handed to an active prober.
struct Inbound {
  message: Message,
}

struct Shared<T> {
  service: RwLock<Service>,
  transport: T,
  opts: ResponderOptions,
  /// The send side of the running probe's inbound feed, if one is active.
  probe_slot: RwLock<Option<Sender<Inbound>>>,
  /// A host must not answer for a record set it is still probing for
  /// (RFC 6762 section 8.1).
  verified: AtomicBool,
}

impl<T> Shared<T> {
  fn service(&self) -> std::sync::RwLockReadGuard<'_, Service> {
    self.service.read().expect("service lock poisoned")
  }
}

/// An mDNS responder: answers queries for one [`Service`], drives its name
/// probe, and paces multicast responses through the response queue.
///
/// All packet handling runs on a single spawned processor task; probing
/// runs on the caller's task and talks to the processor through channels.
pub struct Responder<T, R>
where
  T: Transport,
  R: RuntimeLite,
{
  shared: Arc<Shared<T>>,
  handles: AtomicRefCell<FuturesUnordered<<R::Spawner as AsyncSpawner>::JoinHandle<()>>>,
  shutdown_tx: Sender<()>,
  shutdown_rx: Receiver<()>,
  _m: PhantomData<R>,
}

impl<T, R> Drop for Responder<T, R>
where
  T: Transport,
  R: RuntimeLite,
{
  fn drop(&mut self) {
    self.shutdown_tx.close();
  }
}

impl<N: Net> Responder<NetTransport<N>, N::Runtime> {
  /// Creates a responder bound to the multicast sockets selected by the
  /// options.
  pub async fn new(service: Service, opts: ResponderOptions) -> io::Result<Self> {
    let transport = NetTransport::<N>::bind(&opts)?;
    Self::with_transport(service, opts, transport).await
  }
}

impl<T, R> Responder<T, R>
where
  T: Transport,
  R: RuntimeLite,
{
  /// Creates a responder on an already-bound transport.
  pub async fn with_transport(
    service: Service,
    opts: ResponderOptions,
    transport: T,
  ) -> io::Result<Self> {
    let (shutdown_tx, shutdown_rx) = async_channel::bounded::<()>(1);

    let shared = Arc::new(Shared {
      service: RwLock::new(service),
      transport,
      opts,
      probe_slot: RwLock::new(None),
      verified: AtomicBool::new(true),
    });

    let handles = FuturesUnordered::new();
    let processor = Processor::<T, R> {
      shared: shared.clone(),
      shutdown_rx: shutdown_rx.clone(),
      _m: PhantomData,
    };
    handles.push(<R as RuntimeLite>::Spawner::spawn(processor.process()));

    Ok(Self {
      shared,
      handles: AtomicRefCell::new(handles),
      shutdown_tx,
      shutdown_rx,
      _m: PhantomData,
    })
  }

  /// Returns the options of the responder.
  #[inline]
  pub fn options(&self) -> &ResponderOptions {
    &self.shared.opts
  }

  /// Returns the currently claimed fully qualified instance name.
  pub fn fqdn(&self) -> Name {
    self.shared.service().fqdn().clone()
  }

  /// Returns the current instance label, including any conflict suffix.
  pub fn instance(&self) -> smol_str::SmolStr {
    self.shared.service().instance().clone()
  }

  /// Runs the three-probe uniqueness check for the service name
  /// (RFC 6762 section 8.1), renaming and restarting on conflicts.
  ///
  /// Resolves once the name is claimed; fails after sixty seconds of
  /// probing without success.
  pub async fn probe(&self) -> Result<(), ProbeError> {
    let (tx, rx) = async_channel::unbounded();
    *self
      .shared
      .probe_slot
      .write()
      .expect("probe slot lock poisoned") = Some(tx);
    self.shared.verified.store(false, Ordering::Release);

    let result = self.probe_inner(&rx).await;

    if result.is_ok() {
      self.shared.verified.store(true, Ordering::Release);
    }
    *self
      .shared
      .probe_slot
      .write()
      .expect("probe slot lock poisoned") = None;
    result
  }

  async fn probe_inner(&self, rx: &Receiver<Inbound>) -> Result<(), ProbeError> {
    let deadline = Instant::now() + probe::PROBE_TIMEOUT;
    let mut prober = {
      let service = self.shared.service();
      Prober::new(
        service.fqdn().clone(),
        service.hostname().clone(),
        service.records().into_iter().collect(),
      )
    };
    let mut initial_delay = probe::random_initial_delay();

    'round: loop {
      match self.probe_wait(&prober, rx, initial_delay, deadline).await? {
        WaitEvent::Elapsed => {}
        WaitEvent::Conflict => {
          self.rename(&mut prober)?;
          initial_delay = Duration::ZERO;
          continue 'round;
        }
        WaitEvent::LostTiebreak => {
          self.backoff(deadline).await?;
          prober.reset();
          initial_delay = Duration::ZERO;
          continue 'round;
        }
      }

      while !prober.is_complete() {
        let message = prober.probe_message(self.shared.opts.udp_payload_size)?;
        self.send_all(&message.encode(), "probe").await;
        prober.record_sent();

        // the next probe's timer (and the final verdict) is armed only
        // once this probe's send has completed
        match self
          .probe_wait(&prober, rx, probe::PROBE_INTERVAL, deadline)
          .await?
        {
          WaitEvent::Elapsed => {}
          WaitEvent::Conflict => {
            self.rename(&mut prober)?;
            initial_delay = Duration::ZERO;
            continue 'round;
          }
          WaitEvent::LostTiebreak => {
            self.backoff(deadline).await?;
            prober.reset();
            initial_delay = Duration::ZERO;
            continue 'round;
          }
        }
      }

      tracing::info!(name=%prober.fqdn(), "mdns responder: name claimed");
      return Ok(());
    }
  }

  /// Waits for `dur`, feeding inbound packets to the prober as they
  /// arrive.
  async fn probe_wait(
    &self,
    prober: &Prober,
    rx: &Receiver<Inbound>,
    dur: Duration,
    deadline: Instant,
  ) -> Result<WaitEvent, ProbeError> {
    let until = Instant::now() + dur;

    loop {
      let now = Instant::now();
      if now >= deadline {
        return Err(ProbeError::Timeout);
      }
      if now >= until {
        return Ok(WaitEvent::Elapsed);
      }
      let sleep_for = (until - now).min(deadline - now);

      let shutdown = self.shutdown_rx.recv().fuse();
      let inbound = rx.recv().fuse();
      let timer = R::sleep(sleep_for).fuse();
      futures::pin_mut!(shutdown, inbound, timer);

      futures::select! {
        _ = shutdown => return Err(ProbeError::Shutdown),
        res = inbound => match res {
          Ok(inbound) => match prober.evaluate(&inbound.message) {
            ProbeReaction::None => continue,
            ProbeReaction::Conflict => return Ok(WaitEvent::Conflict),
            ProbeReaction::LostTiebreak => return Ok(WaitEvent::LostTiebreak),
          },
          Err(_) => return Err(ProbeError::Shutdown),
        },
        _ = timer => continue,
      }
    }
  }

  /// The one-second pause after a lost tiebreak, ignoring inbound
  /// traffic.
  async fn backoff(&self, deadline: Instant) -> Result<(), ProbeError> {
    let now = Instant::now();
    let sleep_for = probe::TIEBREAK_BACKOFF.min(deadline.saturating_duration_since(now));

    let shutdown = self.shutdown_rx.recv().fuse();
    let timer = R::sleep(sleep_for).fuse();
    futures::pin_mut!(shutdown, timer);

    futures::select! {
      _ = shutdown => return Err(ProbeError::Shutdown),
      _ = timer => {}
    }

    if Instant::now() >= deadline {
      return Err(ProbeError::Timeout);
    }
    Ok(())
  }

  fn rename(&self, prober: &mut Prober) -> Result<(), ProbeError> {
    let mut service = self.shared.service.write().expect("service lock poisoned");
    service.increment_name().map_err(ProbeError::Rename)?;
    tracing::info!(name=%service.fqdn(), "mdns responder: name conflict, renamed");
    prober.restart(
      service.fqdn().clone(),
      service.records().into_iter().collect(),
    );
    Ok(())
  }

  /// Multicasts the full record set as an unsolicited response, twice,
  /// one second apart (RFC 6762 section 8.3). Call after a successful
  /// [`Responder::probe`].
  pub async fn announce(&self) -> io::Result<()> {
    let records: Vec<Record> = {
      self
        .shared
        .service()
        .announcement_records()
        .into_iter()
        .collect()
    };
    let message =
      Message::build_response(records, Vec::new(), None, self.shared.opts.udp_payload_size)
        .map_err(invalid_input_err)?;
    let bytes = message.encode();

    for round in 0..2 {
      if round > 0 {
        let shutdown = self.shutdown_rx.recv().fuse();
        let timer = R::sleep(ANNOUNCE_INTERVAL).fuse();
        futures::pin_mut!(shutdown, timer);
        futures::select! {
          _ = shutdown => return Ok(()),
          _ = timer => {}
        }
      }
      self.send_all(&bytes, "announcement").await;
    }
    Ok(())
  }

  async fn send_all(&self, bytes: &[u8], what: &str) {
    for interface in self.shared.transport.interfaces() {
      if let Err(e) = self
        .shared
        .transport
        .send(bytes, interface, Destination::Multicast)
        .await
      {
        tracing::error!(err=%e, interface=%interface, "mdns responder: failed to send {what}");
      }
    }
  }

  /// Shuts down the responder: stops the processor and discards every
  /// queued response.
  ///
  /// This method is concurrent safe and can be called multiple times, but
  /// only the first call will have an effect.
  pub async fn shutdown(&self) {
    if !self.shutdown_tx.close() {
      return;
    }

    let mut handles = core::mem::take(&mut *self.handles.borrow_mut());
    while handles.next().await.is_some() {}
  }
}

enum WaitEvent {
  Elapsed,
  Conflict,
  LostTiebreak,
}

struct Processor<T, R>
where
  T: Transport,
  R: RuntimeLite,
{
  shared: Arc<Shared<T>>,
  shutdown_rx: Receiver<()>,
  _m: PhantomData<R>,
}

impl<T, R> Processor<T, R>
where
  T: Transport,
  R: RuntimeLite,
{
  async fn process(self) {
    let mut queue = ResponseQueue::new(self.shared.opts.udp_payload_size);

    loop {
      let deadline = queue.next_deadline();
      let shutdown = self.shutdown_rx.recv().fuse();
      let recv = self.shared.transport.recv().fuse();
      let timer = async move {
        match deadline {
          Some(at) => {
            let now = Instant::now();
            if at > now {
              let _ = R::sleep(at - now).await;
            }
          }
          None => futures::future::pending::<()>().await,
        }
      }
      .fuse();
      futures::pin_mut!(shutdown, recv, timer);

      futures::select! {
        _ = shutdown => {
          queue.drain();
          tracing::info!("mdns responder: shutting down packet processor");
          return;
        }
        res = recv => match res {
          Ok((interface, from, data)) => {
            self.handle_datagram(&mut queue, interface, from, &data).await;
          }
          Err(e) => {
            tracing::error!(err=%e, "mdns responder: failed to receive packet");
          }
        },
        _ = timer => self.flush_due(&mut queue).await,
      }
    }
  }

  async fn handle_datagram(
    &self,
    queue: &mut ResponseQueue,
    interface: InterfaceId,
    from: SocketAddr,
    data: &[u8],
  ) {
    tracing::trace!(from=%from, interface=%interface, len=data.len(), "mdns responder: received packet");

    let message = match Message::decode(data) {
      Ok(message) => message,
      Err(e) => {
        tracing::error!(from=%from, err=%e, "mdns responder: failed to decode packet");
        return;
      }
    };

    // an active probe sees everything, responses included
    {
      let slot = self
        .shared
        .probe_slot
        .read()
        .expect("probe slot lock poisoned");
      if let Some(tx) = slot.as_ref() {
        let _ = tx.try_send(Inbound {
          message: message.clone(),
        });
      }
    }

    if message.flags().response() {
      return;
    }

    self.handle_query(queue, interface, from, message).await;
  }

  async fn handle_query(
    &self,
    queue: &mut ResponseQueue,
    interface: InterfaceId,
    from: SocketAddr,
    query: Message,
  ) {
    if !self.shared.verified.load(Ordering::Acquire) {
      // still probing: the record set may not be answered for yet
      return;
    }

    if query.flags().opcode() != 0 {
      // "In both multicast query and multicast response messages, the OPCODE MUST
      // be zero on transmission (only standard queries are currently supported
      // over multicast).  Multicast DNS messages received with an OPCODE other
      // than zero MUST be silently ignored."
      tracing::error!(opcode = %query.flags().opcode(), "mdns responder: received query with non-zero OpCode");
      return;
    }

    if query.flags().response_code() != 0 {
      // "In both multicast query and multicast response messages, the Response
      // Code MUST be zero on transmission.  Multicast DNS messages received with
      // non-zero Response Codes MUST be silently ignored."
      tracing::error!(rcode = %query.flags().response_code(), "mdns responder: received query with non-zero response code");
      return;
    }

    if query.flags().truncated() {
      // TODO(queue): hold the reply until the continuation packets with
      // the remaining known answers have arrived (RFC 6762 section 7.2)
      tracing::error!("mdns responder: support for queries with the truncated bit set is not implemented");
      return;
    }

    let mut answers: SmallVec<Record> = SmallVec::new();
    let mut additionals: SmallVec<Record> = SmallVec::new();
    {
      let service = self.shared.service();
      for question in query.questions() {
        let (ans, add) = service.answers(question);
        answers.extend(ans);
        additionals.extend(add);
      }
    }

    // known-answer suppression: the querier told us what it already has
    // (RFC 6762 section 7.1)
    answers.retain(|answer| {
      !query
        .answers()
        .iter()
        .any(|known| known.data_eq(answer) && known.ttl() >= answer.ttl() / 2)
    });

    if answers.is_empty() {
      if self.shared.opts.log_empty_responses {
        let questions: SmallVec<String> = query
          .questions()
          .iter()
          .map(|q| q.name().to_string())
          .collect();
        tracing::info!(
          "mdns responder: no responses for query with questions: {}",
          questions.join(", ")
        );
      }
      return;
    }

    let cap = self.shared.opts.udp_payload_size;
    let legacy = from.port() != MDNS_PORT;

    // unique records carry the cache-flush bit, but only in real mDNS
    // responses (RFC 6762 section 6.7)
    let answers: Vec<Record> = answers
      .into_iter()
      .map(|record| {
        let unique = !matches!(record.ty(), RecordType::PTR);
        record.with_cache_flush(unique && !legacy)
      })
      .collect();
    let additionals: Vec<Record> = additionals
      .into_iter()
      .map(|record| {
        let unique = !matches!(record.ty(), RecordType::PTR);
        record.with_cache_flush(unique && !legacy)
      })
      .collect();

    if legacy {
      // legacy queriers get an immediate unicast reply with the id
      // mirrored (RFC 6762 section 6.7)
      match Message::build_response(answers, additionals, Some(query.id()), cap) {
        Ok(response) => {
          let bytes = response.encode();
          if let Err(e) = self
            .shared
            .transport
            .send(&bytes, interface, Destination::Unicast(from))
            .await
          {
            tracing::error!(from=%from, err=%e, "mdns responder: failed to send unicast response");
          }
        }
        Err(e) => {
          tracing::error!(from=%from, err=%e, "mdns responder: failed to build unicast response");
        }
      }
      return;
    }

    match Message::build_response(answers, additionals, None, cap) {
      Ok(response) => {
        queue.enqueue_at(response, interface, Instant::now(), queue::random_delay());
      }
      Err(e) => {
        tracing::error!(from=%from, err=%e, "mdns responder: failed to build response");
      }
    }
  }

  async fn flush_due(&self, queue: &mut ResponseQueue) {
    let now = Instant::now();
    while let Some(entry) = queue.pop_due(now) {
      let (packet, interface) = entry.into_parts();
      let bytes = packet.encode();
      tracing::trace!(interface=%interface, len=bytes.len(), "mdns responder: sending response");
      if let Err(e) = self
        .shared
        .transport
        .send(&bytes, interface, Destination::Multicast)
        .await
      {
        tracing::error!(err=%e, interface=%interface, "mdns responder: failed to send response");
      }
    }
  }
}
