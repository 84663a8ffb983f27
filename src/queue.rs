use std::{
  collections::VecDeque,
  time::{Duration, Instant},
};

use beacon_proto::Message;
use rand::Rng;

use crate::transport::InterfaceId;

/// Lower bound of the random response delay (RFC 6762 section 6).
pub const RESPONSE_DELAY_MIN_MS: u64 = 20;
/// Upper bound of the random response delay (RFC 6762 section 6).
pub const RESPONSE_DELAY_MAX_MS: u64 = 120;

/// A response may be held back by merging, but never longer than this
/// after it was first created.
pub const MAX_DELAY: Duration = Duration::from_millis(500);

/// Picks the uniform random delay applied to a freshly queued response.
pub fn random_delay() -> Duration {
  Duration::from_millis(rand::thread_rng().gen_range(RESPONSE_DELAY_MIN_MS..RESPONSE_DELAY_MAX_MS))
}

/// A response waiting for its send timer.
#[derive(Debug)]
pub struct QueuedResponse {
  packet: Message,
  interface: InterfaceId,
  created: Instant,
  scheduled: Instant,
  cancelled: bool,
}

impl QueuedResponse {
  /// Returns the packet to transmit.
  #[inline]
  pub const fn packet(&self) -> &Message {
    &self.packet
  }

  /// Returns the interface the packet leaves from.
  #[inline]
  pub const fn interface(&self) -> InterfaceId {
    self.interface
  }

  /// Returns when the earliest merged-in response was created.
  #[inline]
  pub const fn created(&self) -> Instant {
    self.created
  }

  /// Returns the scheduled send time.
  #[inline]
  pub const fn scheduled(&self) -> Instant {
    self.scheduled
  }

  /// Consumes the entry, returning its packet and interface.
  #[inline]
  pub fn into_parts(self) -> (Message, InterfaceId) {
    (self.packet, self.interface)
  }
}

/// The outgoing response queue of one responder (RFC 6762 section 6).
///
/// Every multicast response is held for a small random delay; while it
/// waits, responses with combinable headers are coalesced into the
/// later-scheduled packet so fewer datagrams hit the link. The queue is
/// plain state: the owning
/// event loop supplies the clock and the random delays, and sleeps until
/// [`ResponseQueue::next_deadline`].
#[derive(Debug)]
pub struct ResponseQueue {
  cap: usize,
  entries: VecDeque<QueuedResponse>,
}

impl ResponseQueue {
  /// Creates an empty queue whose merged packets may not exceed `cap`
  /// bytes.
  pub fn new(cap: usize) -> Self {
    Self {
      cap,
      entries: VecDeque::new(),
    }
  }

  /// Returns the number of pending (non-cancelled) responses.
  pub fn len(&self) -> usize {
    self.entries.iter().filter(|e| !e.cancelled).count()
  }

  /// Returns whether no responses are pending.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Queues `packet` for transmission at `now + delay`.
  ///
  /// The new entry first tries to merge with the most recently queued
  /// pending packet on the same interface: the headers must be
  /// combinable and the merge may not hold the earlier packet back past
  /// [`MAX_DELAY`] from its creation. Record sets merge into whichever
  /// of the two packets is scheduled later — with random delays the
  /// newcomer is not necessarily that one — and the later packet keeps
  /// its timer. The earlier one is cancelled (or, when the newcomer
  /// loses, never queued), and the survivor inherits the earliest
  /// creation time so the total-delay cap keeps applying to the oldest
  /// data.
  pub fn enqueue_at(
    &mut self,
    packet: Message,
    interface: InterfaceId,
    now: Instant,
    delay: Duration,
  ) {
    let mut entry = QueuedResponse {
      packet,
      interface,
      created: now,
      scheduled: now + delay,
      cancelled: false,
    };

    if let Some(prev) = self
      .entries
      .iter_mut()
      .rev()
      .find(|e| !e.cancelled && e.interface == interface)
    {
      let earliest = prev.created.min(entry.created);
      let later = prev.scheduled.max(entry.scheduled);
      // the in-a-timely-manner check comes first: a merge that would sit
      // past the cap is not attempted at all
      if later.saturating_duration_since(earliest) <= MAX_DELAY {
        if entry.scheduled >= prev.scheduled {
          if entry.packet.try_combine(&prev.packet, self.cap) {
            entry.created = earliest;
            prev.cancelled = true;
          }
        } else if prev.packet.try_combine(&entry.packet, self.cap) {
          prev.created = earliest;
          return;
        }
      }
    }

    self.entries.push_back(entry);
  }

  /// The earliest scheduled send time among pending responses.
  pub fn next_deadline(&self) -> Option<Instant> {
    self
      .entries
      .iter()
      .filter(|e| !e.cancelled)
      .map(|e| e.scheduled)
      .min()
  }

  /// Removes and returns the due response with the earliest scheduled
  /// time, if any. Cancelled entries are discarded, never returned.
  pub fn pop_due(&mut self, now: Instant) -> Option<QueuedResponse> {
    self.entries.retain(|e| !e.cancelled);

    let idx = self
      .entries
      .iter()
      .enumerate()
      .filter(|(_, e)| e.scheduled <= now)
      .min_by_key(|(_, e)| e.scheduled)
      .map(|(idx, _)| idx)?;
    self.entries.remove(idx)
  }

  /// Discards every pending response.
  pub fn drain(&mut self) {
    self.entries.clear();
  }
}
