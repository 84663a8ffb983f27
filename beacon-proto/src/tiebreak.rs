use core::cmp::Ordering;

use crate::record::Record;

/// The outcome of a simultaneous-probe tiebreak (RFC 6762 section 8.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiebreakResult {
  /// Our record set compares smaller; keep probing and ignore the
  /// opponent.
  HostWins,
  /// The opponent's record set compares smaller; stop probing and back
  /// off.
  OpponentWins,
  /// The record sets are identical, i.e. the "opponent" is this host's own
  /// traffic.
  NoConflict,
}

/// Canonical record ordering: class (without the cache-flush bit), then
/// type, then the canonical rdata bytes (uncompressed, names lowercased).
pub fn canonical_cmp(a: &Record, b: &Record) -> Ordering {
  a.class()
    .cmp(&b.class())
    .then_with(|| u16::from(a.ty()).cmp(&u16::from(b.ty())))
    .then_with(|| a.canonical_rdata().cmp(&b.canonical_rdata()))
}

/// Sorts records into the canonical order. Probing record sets must be
/// sorted this way before any tiebreak compare.
pub fn sort_canonical(records: &mut [Record]) {
  records.sort_by(canonical_cmp);
}

/// Runs the pairwise lexicographic comparison between two canonically
/// sorted record sets.
///
/// Records are compared as (class, type, canonical rdata) byte strings; the
/// first difference decides, and the holder of the smaller byte wins. When
/// one set is a strict prefix of the other the shorter set wins, keeping
/// the outcome total for any pair of non-equal sets.
pub fn compare_record_sets(ours: &[Record], theirs: &[Record]) -> TiebreakResult {
  for (our, their) in ours.iter().zip(theirs.iter()) {
    match record_key(our).cmp(&record_key(their)) {
      Ordering::Equal => continue,
      Ordering::Less => return TiebreakResult::HostWins,
      Ordering::Greater => return TiebreakResult::OpponentWins,
    }
  }

  match ours.len().cmp(&theirs.len()) {
    Ordering::Equal => TiebreakResult::NoConflict,
    Ordering::Less => TiebreakResult::HostWins,
    Ordering::Greater => TiebreakResult::OpponentWins,
  }
}

fn record_key(record: &Record) -> Vec<u8> {
  let mut key = Vec::new();
  key.extend_from_slice(&record.class().to_be_bytes());
  key.extend_from_slice(&u16::from(record.ty()).to_be_bytes());
  key.extend_from_slice(&record.canonical_rdata());
  key
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    name::Name,
    rdata::{RecordData, Srv, Txt},
  };

  fn name(s: &str) -> Name {
    s.parse().unwrap()
  }

  fn a(last_octet: u8) -> Record {
    Record::from_rdata(
      name("box.local"),
      120,
      RecordData::A([192, 168, 1, last_octet].into()),
    )
  }

  fn full_set(last_octet: u8) -> Vec<Record> {
    let mut records = vec![
      Record::from_rdata(
        name("Box._hap._tcp.local"),
        120,
        RecordData::SRV(Srv::new(0, 0, 51826, name("box.local"))),
      ),
      Record::from_rdata(
        name("Box._hap._tcp.local"),
        4500,
        RecordData::TXT(Txt::from_strings(["md=Box"]).unwrap()),
      ),
      a(last_octet),
    ];
    sort_canonical(&mut records);
    records
  }

  #[test]
  fn sort_orders_by_type_then_rdata() {
    let records = full_set(7);
    // A (1) < TXT (16) < SRV (33)
    let types: Vec<_> = records.iter().map(|r| u16::from(r.ty())).collect();
    assert_eq!(types, [1, 16, 33]);

    let mut addresses = vec![a(9), a(2)];
    sort_canonical(&mut addresses);
    assert_eq!(addresses[0].canonical_rdata()[3], 2);
  }

  #[test]
  fn canonical_rdata_lowercases_names() {
    let upper = Record::from_rdata(
      name("Box._hap._tcp.local"),
      120,
      RecordData::SRV(Srv::new(0, 0, 80, name("BOX.local"))),
    );
    let lower = Record::from_rdata(
      name("Box._hap._tcp.local"),
      120,
      RecordData::SRV(Srv::new(0, 0, 80, name("box.local"))),
    );
    assert_eq!(upper.canonical_rdata(), lower.canonical_rdata());
  }

  #[test]
  fn equal_sets_are_no_conflict() {
    assert_eq!(
      compare_record_sets(&full_set(7), &full_set(7)),
      TiebreakResult::NoConflict
    );
  }

  #[test]
  fn first_differing_byte_decides() {
    let ours = full_set(7);
    let theirs = full_set(3);
    assert_eq!(compare_record_sets(&ours, &theirs), TiebreakResult::OpponentWins);
    assert_eq!(compare_record_sets(&theirs, &ours), TiebreakResult::HostWins);
  }

  #[test]
  fn prefix_set_wins() {
    let ours = full_set(7);
    let theirs = ours[..2].to_vec();
    assert_eq!(compare_record_sets(&ours, &theirs), TiebreakResult::OpponentWins);
    assert_eq!(compare_record_sets(&theirs, &ours), TiebreakResult::HostWins);
  }

  #[test]
  fn totality() {
    let sets = [full_set(1), full_set(2), full_set(1)[..1].to_vec()];
    for (i, a) in sets.iter().enumerate() {
      for (j, b) in sets.iter().enumerate() {
        let forward = compare_record_sets(a, b);
        let backward = compare_record_sets(b, a);
        if i == j {
          assert_eq!(forward, TiebreakResult::NoConflict);
        } else {
          assert_ne!(forward, TiebreakResult::NoConflict);
          match forward {
            TiebreakResult::HostWins => assert_eq!(backward, TiebreakResult::OpponentWins),
            TiebreakResult::OpponentWins => assert_eq!(backward, TiebreakResult::HostWins),
            TiebreakResult::NoConflict => unreachable!(),
          }
        }
      }
    }
  }
}
