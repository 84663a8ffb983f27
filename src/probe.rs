use std::time::Duration;

use beacon_proto::{
  tiebreak::{compare_record_sets, sort_canonical, TiebreakResult},
  Message, Name, ProtoError, Question, Record, RecordType,
};
use rand::Rng;

/// Gap between successive probes (RFC 6762 section 8.1).
pub const PROBE_INTERVAL: Duration = Duration::from_millis(250);
/// Number of probes sent before the name is considered won.
pub const PROBE_COUNT: u8 = 3;
/// Upper bound of the random wait before the first probe.
pub const PROBE_INITIAL_DELAY_MAX_MS: u64 = 250;
/// Probing that has not succeeded after this long fails.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(60);
/// Back-off after losing a simultaneous-probe tiebreak (RFC 6762
/// section 8.2): the winner should have finished probing by then.
pub const TIEBREAK_BACKOFF: Duration = Duration::from_secs(1);

/// Picks the uniform random wait before the first probe.
pub fn random_initial_delay() -> Duration {
  Duration::from_millis(rand::thread_rng().gen_range(0..PROBE_INITIAL_DELAY_MAX_MS))
}

/// Errors that end a probe attempt.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProbeError {
  /// Probing did not succeed within [`PROBE_TIMEOUT`]; the service stays
  /// unannounced.
  #[error("probing did not finish within {}s", PROBE_TIMEOUT.as_secs())]
  Timeout,
  /// The responder was shut down while probing.
  #[error("responder shut down while probing")]
  Shutdown,
  /// The probe query could not be built, e.g. the record set does not fit
  /// the UDP payload cap.
  #[error(transparent)]
  Proto(#[from] ProtoError),
  /// The conflict rename produced an unusable instance name.
  #[error("failed to pick a new instance name")]
  Rename(#[source] std::io::Error),
}

/// What the prober concluded from one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeReaction {
  /// Nothing relevant; keep waiting.
  None,
  /// Someone already owns the name (or defends it): rename and restart.
  Conflict,
  /// A simultaneous prober with a smaller record set was seen: back off
  /// for [`TIEBREAK_BACKOFF`], then restart with the same name.
  LostTiebreak,
}

/// The per-service probing state machine (RFC 6762 section 8.1/8.2).
///
/// The prober itself owns no timers; the responder event loop feeds it
/// inbound messages via [`Prober::evaluate`], tells it about sent probes
/// via [`Prober::record_sent`], and reads [`Prober::is_complete`] after
/// each probe interval.
#[derive(Debug)]
pub struct Prober {
  fqdn: Name,
  hostname: Name,
  /// The records to be published, canonically sorted for tiebreaking.
  records: Vec<Record>,
  sent_probes: u8,
}

impl Prober {
  /// Creates a prober for a service claiming `fqdn` on host `hostname`,
  /// publishing `records`.
  pub fn new(fqdn: Name, hostname: Name, mut records: Vec<Record>) -> Self {
    sort_canonical(&mut records);
    Self {
      fqdn,
      hostname,
      records,
      sent_probes: 0,
    }
  }

  /// Returns the name being claimed.
  #[inline]
  pub const fn fqdn(&self) -> &Name {
    &self.fqdn
  }

  /// Returns the proposed records, canonically sorted.
  #[inline]
  pub fn records(&self) -> &[Record] {
    &self.records
  }

  /// Returns how many probes have been sent in the current round.
  #[inline]
  pub const fn sent_probes(&self) -> u8 {
    self.sent_probes
  }

  /// Notes that one probe query has been handed to the transport.
  #[inline]
  pub fn record_sent(&mut self) {
    self.sent_probes += 1;
  }

  /// Returns whether all probes of the current round are out.
  #[inline]
  pub fn is_complete(&self) -> bool {
    self.sent_probes >= PROBE_COUNT
  }

  /// Restarts probing under a new name after a conflict rename. Counters
  /// reset; the next probe goes out without a fresh random initial wait.
  pub fn restart(&mut self, fqdn: Name, mut records: Vec<Record>) {
    sort_canonical(&mut records);
    self.fqdn = fqdn;
    self.records = records;
    self.sent_probes = 0;
  }

  /// Resets the probe counter for a same-name restart after a lost
  /// tiebreak.
  pub fn reset(&mut self) {
    self.sent_probes = 0;
  }

  /// The probe query: ANY questions for the service name and the host
  /// name, both requesting unicast responses, with every proposed record
  /// in the authority section.
  pub fn probe_message(&self, cap: usize) -> Result<Message, ProtoError> {
    let questions = vec![
      Question::new(self.fqdn.clone(), RecordType::ANY).with_unicast_response(true),
      Question::new(self.hostname.clone(), RecordType::ANY).with_unicast_response(true),
    ];
    Message::build_probe(0, questions, self.records.clone(), cap)
  }

  /// Judges one inbound message.
  ///
  /// Everything is ignored until the first probe of the current round has
  /// been sent. A response answering for our names is a conflict. A
  /// simultaneous probe query for our names triggers the tiebreak of
  /// RFC 6762 section 8.2; a query claiming our name with an empty
  /// authority section is treated as a conflict.
  pub fn evaluate(&self, msg: &Message) -> ProbeReaction {
    if self.sent_probes == 0 {
      return ProbeReaction::None;
    }

    if msg.flags().response() {
      let conflicting = msg
        .answers()
        .iter()
        .chain(msg.additionals().iter())
        .any(|r| self.matches_our_names(r.name()));
      return if conflicting {
        ProbeReaction::Conflict
      } else {
        ProbeReaction::None
      };
    }

    let probes_us = msg
      .questions()
      .iter()
      .any(|q| self.matches_our_names(q.name()));
    if !probes_us {
      return ProbeReaction::None;
    }

    if msg.authorities().is_empty() {
      return ProbeReaction::Conflict;
    }

    let mut theirs = msg.authorities().to_vec();
    sort_canonical(&mut theirs);
    match compare_record_sets(&self.records, &theirs) {
      // identical sets mean we are hearing our own probe
      TiebreakResult::NoConflict | TiebreakResult::HostWins => ProbeReaction::None,
      TiebreakResult::OpponentWins => ProbeReaction::LostTiebreak,
    }
  }

  fn matches_our_names(&self, name: &Name) -> bool {
    name.eq_ignore_case(&self.fqdn) || name.eq_ignore_case(&self.hostname)
  }
}
