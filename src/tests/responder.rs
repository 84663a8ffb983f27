#![cfg(feature = "tokio")]

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use agnostic_net::runtime::tokio::TokioRuntime;
use beacon_proto::{Flags, Message, Question, Record, RecordData, RecordType};

use crate::{
  probe::ProbeError,
  tests::{make_service, tokio_run, ChannelTransport, ChannelTransportHandle},
  transport::{Destination, InterfaceId},
  Responder, ResponderOptions,
};

type TestResponder = Responder<ChannelTransport, TokioRuntime>;

fn querier_addr() -> SocketAddr {
  "192.168.0.50:5353".parse().unwrap()
}

fn legacy_addr() -> SocketAddr {
  "192.168.0.50:40000".parse().unwrap()
}

async fn new_responder() -> (TestResponder, ChannelTransportHandle) {
  let (transport, handle) = ChannelTransport::new();
  let responder = TestResponder::with_transport(make_service(), ResponderOptions::new(), transport)
    .await
    .unwrap();
  (responder, handle)
}

fn query(name: &str, ty: RecordType, id: u16) -> Vec<u8> {
  let mut msg = Message::new(id, Flags::new());
  msg.add_question(Question::new(name.parse().unwrap(), ty));
  msg.encode()
}

fn conflict_response(name: &str) -> Vec<u8> {
  let mut flags = Flags::new();
  flags.set_response(true).set_authoritative(true);
  let mut msg = Message::new(0, flags);
  msg.add_answer(Record::from_rdata(
    name.parse().unwrap(),
    120,
    RecordData::A([10, 0, 0, 99].into()),
  ));
  msg.encode()
}

async fn recv_within(
  handle: &ChannelTransportHandle,
  dur: Duration,
) -> (InterfaceId, Destination, Vec<u8>) {
  tokio::time::timeout(dur, handle.out_rx.recv())
    .await
    .expect("expected an outgoing packet")
    .expect("transport closed")
}

async fn expect_silence(handle: &ChannelTransportHandle, dur: Duration) {
  assert!(
    tokio::time::timeout(dur, handle.out_rx.recv()).await.is_err(),
    "expected no outgoing packet"
  );
}

#[test]
fn query_gets_delayed_multicast_response() {
  tokio_run(async {
    let (responder, handle) = new_responder().await;

    let start = Instant::now();
    handle
      .in_tx
      .send((
        InterfaceId::V4,
        querier_addr(),
        query("_hap._tcp.local", RecordType::PTR, 0),
      ))
      .await
      .unwrap();

    let (interface, dest, bytes) = recv_within(&handle, Duration::from_secs(1)).await;
    let elapsed = start.elapsed();
    // the random per-response delay of RFC 6762 section 6
    assert!(elapsed >= Duration::from_millis(18), "sent after {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(450), "sent after {elapsed:?}");

    assert_eq!(interface, InterfaceId::V4);
    assert_eq!(dest, Destination::Multicast);

    let response = Message::decode(&bytes).unwrap();
    assert_eq!(response.id(), 0);
    assert!(response.flags().response());
    assert!(response.flags().authoritative());
    assert_eq!(response.answers().len(), 1);
    assert_eq!(response.answers()[0].ty(), RecordType::PTR);
    // shared records never carry the cache-flush bit
    assert!(!response.answers()[0].cache_flush());
    assert_eq!(response.additionals().len(), 4);
    assert!(response.additionals().iter().all(|r| r.cache_flush()));

    responder.shutdown().await;
  });
}

#[test]
fn legacy_query_gets_immediate_unicast_response() {
  tokio_run(async {
    let (responder, handle) = new_responder().await;

    let start = Instant::now();
    handle
      .in_tx
      .send((
        InterfaceId::V4,
        legacy_addr(),
        query("_hap._tcp.local", RecordType::PTR, 0x1234),
      ))
      .await
      .unwrap();

    let (_, dest, bytes) = recv_within(&handle, Duration::from_millis(500)).await;
    assert!(start.elapsed() < Duration::from_millis(100));
    assert_eq!(dest, Destination::Unicast(legacy_addr()));

    let response = Message::decode(&bytes).unwrap();
    // id mirrored from the legacy query, cache-flush suppressed
    assert_eq!(response.id(), 0x1234);
    assert!(response.answers().iter().all(|r| !r.cache_flush()));
    assert!(response.additionals().iter().all(|r| !r.cache_flush()));

    responder.shutdown().await;
  });
}

#[test]
fn back_to_back_queries_coalesce_into_one_packet() {
  tokio_run(async {
    let (responder, handle) = new_responder().await;

    handle
      .in_tx
      .send((
        InterfaceId::V4,
        querier_addr(),
        query("_hap._tcp.local", RecordType::PTR, 0),
      ))
      .await
      .unwrap();
    handle
      .in_tx
      .send((
        InterfaceId::V4,
        querier_addr(),
        query("testhost.local", RecordType::A, 0),
      ))
      .await
      .unwrap();

    let (_, _, bytes) = recv_within(&handle, Duration::from_secs(1)).await;
    let response = Message::decode(&bytes).unwrap();
    let types: Vec<_> = response.answers().iter().map(|r| r.ty()).collect();
    assert!(types.contains(&RecordType::PTR));
    assert!(types.contains(&RecordType::A));

    // both replies left in the same datagram
    expect_silence(&handle, Duration::from_millis(700)).await;

    responder.shutdown().await;
  });
}

#[test]
fn known_answers_suppress_the_response() {
  tokio_run(async {
    let (responder, handle) = new_responder().await;

    let mut msg = Message::new(0, Flags::new());
    msg.add_question(Question::new(
      "_hap._tcp.local".parse().unwrap(),
      RecordType::PTR,
    ));
    msg.add_answer(Record::from_rdata(
      "_hap._tcp.local".parse().unwrap(),
      4500,
      RecordData::PTR("Living Room._hap._tcp.local".parse().unwrap()),
    ));

    handle
      .in_tx
      .send((InterfaceId::V4, querier_addr(), msg.encode()))
      .await
      .unwrap();

    expect_silence(&handle, Duration::from_millis(400)).await;

    responder.shutdown().await;
  });
}

#[test]
fn malformed_datagrams_are_dropped_not_fatal() {
  tokio_run(async {
    let (responder, handle) = new_responder().await;

    handle
      .in_tx
      .send((InterfaceId::V4, querier_addr(), vec![0xFF, 0x00, 0xAB]))
      .await
      .unwrap();

    handle
      .in_tx
      .send((
        InterfaceId::V4,
        querier_addr(),
        query("_hap._tcp.local", RecordType::PTR, 0),
      ))
      .await
      .unwrap();

    let (_, _, bytes) = recv_within(&handle, Duration::from_secs(1)).await;
    assert!(Message::decode(&bytes).unwrap().flags().response());

    responder.shutdown().await;
  });
}

#[test]
fn probe_sends_three_paced_probes() {
  tokio_run(async {
    let (responder, handle) = new_responder().await;

    let started = Instant::now();
    let collector = async {
      let mut times = Vec::new();
      for _ in 0..3 {
        let (_, dest, bytes) = handle.out_rx.recv().await.unwrap();
        times.push(Instant::now());
        assert_eq!(dest, Destination::Multicast);

        let probe = Message::decode(&bytes).unwrap();
        assert!(!probe.flags().response());
        assert_eq!(probe.questions().len(), 2);
        assert!(probe
          .questions()
          .iter()
          .all(|q| q.ty() == RecordType::ANY && q.unicast_response()));
        assert!(!probe.authorities().is_empty());
      }
      times
    };

    let (result, times) = futures::join!(responder.probe(), collector);
    result.unwrap();

    // the initial wait is random in [0, 250) ms
    assert!(times[0] - started <= Duration::from_millis(450));
    // probes are spaced by one probe interval
    for pair in times.windows(2) {
      let gap = pair[1] - pair[0];
      assert!(gap >= Duration::from_millis(249), "probe gap {gap:?}");
      assert!(gap <= Duration::from_millis(450), "probe gap {gap:?}");
    }
    // success is reported only after the final interval passed quietly
    assert!(started.elapsed() >= (times[2] - started) + Duration::from_millis(249));

    responder.shutdown().await;
  });
}

#[test]
fn probe_conflict_renames_and_restarts_immediately() {
  tokio_run(async {
    let (responder, handle) = new_responder().await;

    let driver = async {
      let mut sends = Vec::new();
      for _ in 0..2 {
        let (_, _, bytes) = handle.out_rx.recv().await.unwrap();
        sends.push((Instant::now(), bytes));
      }

      // someone answers for the name right after probe #2
      handle
        .in_tx
        .send((
          InterfaceId::V4,
          querier_addr(),
          conflict_response("Living Room._hap._tcp.local"),
        ))
        .await
        .unwrap();

      for _ in 0..3 {
        let (_, _, bytes) = handle.out_rx.recv().await.unwrap();
        sends.push((Instant::now(), bytes));
      }
      sends
    };

    let (result, sends) = futures::join!(responder.probe(), driver);
    result.unwrap();

    // two probes for the old name, three for the new one
    assert_eq!(sends.len(), 5);

    // the restart skips the random initial wait
    let restart_gap = sends[2].0 - sends[1].0;
    assert!(restart_gap < Duration::from_millis(200), "{restart_gap:?}");

    let renamed = Message::decode(&sends[2].1).unwrap();
    let expected: beacon_proto::Name = "Living Room (2)._hap._tcp.local".parse().unwrap();
    assert!(renamed.questions()[0].name().eq_ignore_case(&expected));
    assert_eq!(responder.instance().as_str(), "Living Room (2)");

    responder.shutdown().await;
  });
}

#[test]
fn lost_tiebreak_backs_off_and_keeps_the_name() {
  tokio_run(async {
    let (responder, handle) = new_responder().await;

    let driver = async {
      let (_, _, first) = handle.out_rx.recv().await.unwrap();
      let after_first = Instant::now();

      // a simultaneous prober for the same name whose first record data
      // compares smaller than ours
      let mut opponent = Message::new(0, Flags::new());
      opponent.add_question(
        Question::new(
          "Living Room._hap._tcp.local".parse().unwrap(),
          RecordType::ANY,
        )
        .with_unicast_response(true),
      );
      opponent.add_authority(Record::from_rdata(
        "testhost.local".parse().unwrap(),
        120,
        RecordData::A([192, 168, 0, 3].into()),
      ));
      handle
        .in_tx
        .send((InterfaceId::V4, querier_addr(), opponent.encode()))
        .await
        .unwrap();

      let (_, _, second) = handle.out_rx.recv().await.unwrap();
      let after_second = Instant::now();

      // let the remaining probes drain so the probe can resolve
      for _ in 0..2 {
        handle.out_rx.recv().await.unwrap();
      }

      (first, second, after_second - after_first)
    };

    let (result, (first, second, gap)) = futures::join!(responder.probe(), driver);
    result.unwrap();

    // we paused for the loser's one-second back-off
    assert!(gap >= Duration::from_millis(999), "{gap:?}");
    assert!(gap <= Duration::from_millis(1600), "{gap:?}");

    // and restarted with the same, un-renamed name
    let expected: beacon_proto::Name = "Living Room._hap._tcp.local".parse().unwrap();
    let first = Message::decode(&first).unwrap();
    let second = Message::decode(&second).unwrap();
    assert!(first.questions()[0].name().eq_ignore_case(&expected));
    assert!(second.questions()[0].name().eq_ignore_case(&expected));
    assert_eq!(responder.instance().as_str(), "Living Room");

    responder.shutdown().await;
  });
}

#[test]
fn announce_sends_the_flushed_record_set_twice() {
  tokio_run(async {
    let (responder, handle) = new_responder().await;

    let collector = async {
      let mut packets = Vec::new();
      for _ in 0..2 {
        let (_, dest, bytes) = handle.out_rx.recv().await.unwrap();
        assert_eq!(dest, Destination::Multicast);
        packets.push((Instant::now(), Message::decode(&bytes).unwrap()));
      }
      packets
    };

    let (result, packets) = futures::join!(responder.announce(), collector);
    result.unwrap();

    let gap = packets[1].0 - packets[0].0;
    assert!(gap >= Duration::from_millis(990), "{gap:?}");

    for (_, message) in &packets {
      assert!(message.flags().response());
      assert!(message.flags().authoritative());
      assert!(message
        .answers()
        .iter()
        .all(|r| r.cache_flush() == (r.ty() != RecordType::PTR)));
    }

    responder.shutdown().await;
  });
}

#[test]
fn shutdown_silences_the_responder() {
  tokio_run(async {
    let (responder, handle) = new_responder().await;
    responder.shutdown().await;

    let _ = handle
      .in_tx
      .send((
        InterfaceId::V4,
        querier_addr(),
        query("_hap._tcp.local", RecordType::PTR, 0),
      ))
      .await;

    expect_silence(&handle, Duration::from_millis(400)).await;

    // probing after shutdown fails fast
    assert!(matches!(
      responder.probe().await,
      Err(ProbeError::Shutdown)
    ));
  });
}
