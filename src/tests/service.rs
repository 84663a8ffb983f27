use beacon_proto::{Name, Question, RecordType};

use crate::tests::{make_service, make_service_with_instance};
use crate::ServiceBuilder;

#[test]
fn derived_names() {
  let service = make_service();
  assert!(service
    .fqdn()
    .eq_ignore_case(&"Living Room._hap._tcp.local".parse().unwrap()));
  assert!(service
    .service_name()
    .eq_ignore_case(&"_hap._tcp.local".parse().unwrap()));
  assert!(service
    .hostname()
    .eq_ignore_case(&"testhost.local".parse().unwrap()));
  assert_eq!(service.port(), 51826);
}

#[test]
fn instance_label_may_contain_dots() {
  let service = make_service_with_instance("Box v2.1");
  // the instance is one label, not split at the dot
  assert_eq!(service.fqdn().labels().len(), 4);
  assert_eq!(service.fqdn().labels()[0].as_bytes(), b"Box v2.1");
}

#[test]
fn publish_record_set() {
  let service = make_service();
  let records = service.records();

  // enum PTR, service PTR, SRV, TXT, A, AAAA
  assert_eq!(records.len(), 6);
  let ptrs = records
    .iter()
    .filter(|r| r.ty() == RecordType::PTR)
    .count();
  assert_eq!(ptrs, 2);

  // announcements flush everything this host owns exclusively
  for record in service.announcement_records().iter() {
    assert_eq!(record.cache_flush(), record.ty() != RecordType::PTR);
  }
}

#[test]
fn subtype_records_and_answers() {
  let service = ServiceBuilder::new("Printer".into(), "_ipp._tcp".into())
    .with_hostname("printhost".into())
    .with_port(631)
    .with_ip("10.0.0.9".parse().unwrap())
    .with_subtype("_color".into())
    .finalize()
    .unwrap();

  let records = service.records();
  assert_eq!(
    records
      .iter()
      .filter(|r| r.ty() == RecordType::PTR)
      .count(),
    3
  );

  let subtype: Name = "_color._sub._ipp._tcp.local".parse().unwrap();
  let (answers, additionals) = service.answers(&Question::new(subtype, RecordType::PTR));
  assert_eq!(answers.len(), 1);
  assert!(!additionals.is_empty());
}

#[test]
fn answers_by_question() {
  let service = make_service();

  let (answers, additionals) = service.answers(&Question::new(
    "_hap._tcp.local".parse().unwrap(),
    RecordType::PTR,
  ));
  assert_eq!(answers.len(), 1);
  assert_eq!(answers[0].ty(), RecordType::PTR);
  // SRV + TXT + A + AAAA ride along as additionals
  assert_eq!(additionals.len(), 4);

  let (answers, _) = service.answers(&Question::new(
    "Living Room._hap._tcp.local".parse().unwrap(),
    RecordType::SRV,
  ));
  assert_eq!(answers.len(), 1);
  assert_eq!(answers[0].ty(), RecordType::SRV);

  let (answers, _) = service.answers(&Question::new(
    "testhost.local".parse().unwrap(),
    RecordType::A,
  ));
  assert_eq!(answers.len(), 1);

  let (answers, _) = service.answers(&Question::new(
    "testhost.local".parse().unwrap(),
    RecordType::ANY,
  ));
  assert_eq!(answers.len(), 2);

  let (answers, _) = service.answers(&Question::new(
    "unrelated.local".parse().unwrap(),
    RecordType::ANY,
  ));
  assert!(answers.is_empty());
}

#[test]
fn rename_suffix_strictly_increases() {
  let mut service = make_service();
  assert_eq!(service.instance().as_str(), "Living Room");

  service.increment_name().unwrap();
  assert_eq!(service.instance().as_str(), "Living Room (2)");
  assert!(service
    .fqdn()
    .eq_ignore_case(&"Living Room (2)._hap._tcp.local".parse().unwrap()));

  service.increment_name().unwrap();
  assert_eq!(service.instance().as_str(), "Living Room (3)");
}

#[test]
fn builder_requires_port_and_hostname() {
  let err = ServiceBuilder::new("X".into(), "_x._tcp".into())
    .with_hostname("host".into())
    .finalize()
    .unwrap_err();
  assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);

  let err = ServiceBuilder::new("X".into(), "_x._tcp".into())
    .with_port(80)
    .finalize()
    .unwrap_err();
  assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}
