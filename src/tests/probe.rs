use beacon_proto::{
  Flags, Message, Name, Question, Record, RecordData, RecordType, DEFAULT_UDP_PAYLOAD_SIZE,
};

use crate::probe::{ProbeReaction, Prober};
use crate::tests::make_service;

fn make_prober() -> Prober {
  let service = make_service();
  Prober::new(
    service.fqdn().clone(),
    service.hostname().clone(),
    service.records().into_iter().collect(),
  )
}

fn conflict_response(name: &Name) -> Message {
  let mut flags = Flags::new();
  flags.set_response(true).set_authoritative(true);
  let mut msg = Message::new(0, flags);
  msg.add_answer(Record::from_rdata(
    name.clone(),
    120,
    RecordData::A([10, 0, 0, 99].into()),
  ));
  msg
}

fn opponent_probe(question: &Name, authorities: Vec<Record>) -> Message {
  let mut msg = Message::new(0, Flags::new());
  msg.add_question(Question::new(question.clone(), RecordType::ANY).with_unicast_response(true));
  for record in authorities {
    msg.add_authority(record);
  }
  msg
}

fn opponent_address(last_octet: u8) -> Record {
  let service = make_service();
  Record::from_rdata(
    service.hostname().clone(),
    120,
    RecordData::A([192, 168, 0, last_octet].into()),
  )
}

#[test]
fn ignores_everything_before_first_probe() {
  let prober = make_prober();
  let msg = conflict_response(prober.fqdn());
  assert_eq!(prober.evaluate(&msg), ProbeReaction::None);
}

#[test]
fn response_for_our_name_is_a_conflict() {
  let mut prober = make_prober();
  prober.record_sent();

  assert_eq!(
    prober.evaluate(&conflict_response(&prober.fqdn().clone())),
    ProbeReaction::Conflict
  );
  // matching is case-insensitive
  assert_eq!(
    prober.evaluate(&conflict_response(
      &"LIVING ROOM._HAP._TCP.LOCAL".parse().unwrap()
    )),
    ProbeReaction::Conflict
  );
  // the host name is defended too, including via additionals
  let mut via_additionals = Message::new(0, *conflict_response(prober.fqdn()).flags());
  via_additionals.add_additional(Record::from_rdata(
    "testhost.local".parse().unwrap(),
    120,
    RecordData::A([10, 0, 0, 99].into()),
  ));
  assert_eq!(prober.evaluate(&via_additionals), ProbeReaction::Conflict);

  // answers for unrelated names are not
  assert_eq!(
    prober.evaluate(&conflict_response(&"other._hap._tcp.local".parse().unwrap())),
    ProbeReaction::None
  );
}

#[test]
fn probe_query_without_authorities_is_a_conflict() {
  let mut prober = make_prober();
  prober.record_sent();

  let msg = opponent_probe(prober.fqdn(), Vec::new());
  assert_eq!(prober.evaluate(&msg), ProbeReaction::Conflict);
}

#[test]
fn tiebreak_loss_and_win() {
  let mut prober = make_prober();
  prober.record_sent();

  // the opponent's first authority record compares smaller: we lose
  let losing = opponent_probe(&prober.fqdn().clone(), vec![opponent_address(3)]);
  assert_eq!(prober.evaluate(&losing), ProbeReaction::LostTiebreak);

  // an opponent with larger data is simply ignored
  let winning = opponent_probe(&prober.fqdn().clone(), vec![opponent_address(250)]);
  assert_eq!(prober.evaluate(&winning), ProbeReaction::None);
}

#[test]
fn own_probe_is_no_conflict() {
  let mut prober = make_prober();
  prober.record_sent();

  // a query carrying exactly our record set is our own multicast loop
  let echo = opponent_probe(&prober.fqdn().clone(), prober.records().to_vec());
  assert_eq!(prober.evaluate(&echo), ProbeReaction::None);
}

#[test]
fn queries_for_other_names_are_ignored() {
  let mut prober = make_prober();
  prober.record_sent();

  let msg = opponent_probe(&"other._hap._tcp.local".parse().unwrap(), Vec::new());
  assert_eq!(prober.evaluate(&msg), ProbeReaction::None);
}

#[test]
fn restart_and_reset_counters() {
  let mut prober = make_prober();
  prober.record_sent();
  prober.record_sent();
  assert_eq!(prober.sent_probes(), 2);
  assert!(!prober.is_complete());

  let renamed: Name = "Living Room (2)._hap._tcp.local".parse().unwrap();
  prober.restart(renamed.clone(), prober.records().to_vec());
  assert_eq!(prober.sent_probes(), 0);
  assert!(prober.fqdn().eq_ignore_case(&renamed));

  prober.record_sent();
  prober.record_sent();
  prober.record_sent();
  assert!(prober.is_complete());
  prober.reset();
  assert_eq!(prober.sent_probes(), 0);
}

#[test]
fn probe_message_shape() {
  let prober = make_prober();
  let msg = prober.probe_message(DEFAULT_UDP_PAYLOAD_SIZE).unwrap();

  assert_eq!(msg.id(), 0);
  assert!(!msg.flags().response());
  assert_eq!(msg.questions().len(), 2);
  for question in msg.questions() {
    assert_eq!(question.ty(), RecordType::ANY);
    assert!(question.unicast_response());
  }
  assert!(msg.questions()[0].name().eq_ignore_case(prober.fqdn()));
  assert!(msg.questions()[1]
    .name()
    .eq_ignore_case(&"testhost.local".parse().unwrap()));

  // the authority section carries the whole proposed record set, in
  // canonical order
  assert_eq!(msg.authorities().len(), prober.records().len());
  for (got, want) in msg.authorities().iter().zip(prober.records().iter()) {
    assert!(got.data_eq(want));
  }

  assert!(msg.encoded_len() <= DEFAULT_UDP_PAYLOAD_SIZE);
}
