use core::error::Error;
use std::{
  io,
  net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs},
};

use beacon_proto::{Label, Name, Question, Record, RecordData, RecordType, Srv, Txt};
use smallvec_wrapper::{SmallVec, TinyVec};
use smol_str::{format_smolstr, SmolStr};

use crate::invalid_input_err;

/// Time-to-live of host-specific records (SRV, A, AAAA).
const DEFAULT_TTL: u32 = 120;
/// Time-to-live of shared records (PTR, TXT).
const DEFAULT_LONG_TTL: u32 = 4500;

/// The error of the service
#[derive(Debug, thiserror::Error)]
enum ServiceError {
  /// Service port is missing
  #[error("missing service port")]
  PortNotFound,
  /// Host name is missing
  #[error("missing host name")]
  HostnameNotFound,
  /// Cannot determine the host ip addresses for the host name
  #[error("could not determine the host ip addresses for {hostname}: {error}")]
  IpNotFound {
    /// the host name
    hostname: SmolStr,
    /// the error
    #[source]
    error: Box<dyn Error + Send + Sync + 'static>,
  },
}

/// A builder for creating a new [`Service`].
pub struct ServiceBuilder {
  instance: SmolStr,
  service: SmolStr,
  domain: Option<SmolStr>,
  hostname: Option<SmolStr>,
  port: Option<u16>,
  ipv4s: TinyVec<Ipv4Addr>,
  ipv6s: TinyVec<Ipv6Addr>,
  txt: TinyVec<SmolStr>,
  subtypes: TinyVec<SmolStr>,
  ttl: u32,
  srv_priority: u16,
  srv_weight: u16,
}

impl ServiceBuilder {
  /// Returns a new ServiceBuilder with default values.
  pub fn new(instance: SmolStr, service: SmolStr) -> Self {
    Self {
      instance,
      service,
      domain: None,
      hostname: None,
      port: None,
      ipv4s: TinyVec::new(),
      ipv6s: TinyVec::new(),
      txt: TinyVec::new(),
      subtypes: TinyVec::new(),
      ttl: DEFAULT_TTL,
      srv_priority: 10,
      srv_weight: 1,
    }
  }

  /// Gets the current instance name.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use beacon_mdns::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("Living Room".into(), "_hap._tcp".into());
  /// assert_eq!(builder.instance().as_str(), "Living Room");
  /// ```
  pub fn instance(&self) -> &SmolStr {
    &self.instance
  }

  /// Gets the current service name.
  pub fn service(&self) -> &SmolStr {
    &self.service
  }

  /// Gets the current domain.
  pub fn domain(&self) -> Option<&SmolStr> {
    self.domain.as_ref()
  }

  /// Sets the domain for the service.
  ///
  /// If blank, assumes `local`.
  pub fn with_domain(mut self, domain: SmolStr) -> Self {
    self.domain = Some(domain);
    self
  }

  /// Gets the current host name.
  pub fn hostname(&self) -> Option<&SmolStr> {
    self.hostname.as_ref()
  }

  /// Sets the host name the service's SRV record points at.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use beacon_mdns::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("Living Room".into(), "_hap._tcp".into())
  ///   .with_hostname("testhost".into());
  /// ```
  pub fn with_hostname(mut self, hostname: SmolStr) -> Self {
    self.hostname = Some(hostname);
    self
  }

  /// Gets the TTL of the host records.
  ///
  /// Defaults to `120` seconds.
  pub fn ttl(&self) -> u32 {
    self.ttl
  }

  /// Sets the TTL for the host records.
  pub fn with_ttl(mut self, ttl: u32) -> Self {
    self.ttl = ttl;
    self
  }

  /// Gets the priority for the SRV record.
  ///
  /// Defaults to `10`.
  pub fn srv_priority(&self) -> u16 {
    self.srv_priority
  }

  /// Sets the priority for the SRV record.
  pub fn with_srv_priority(mut self, priority: u16) -> Self {
    self.srv_priority = priority;
    self
  }

  /// Gets the weight for the SRV record.
  ///
  /// Defaults to `1`.
  pub fn srv_weight(&self) -> u16 {
    self.srv_weight
  }

  /// Sets the weight for the SRV record.
  pub fn with_srv_weight(mut self, weight: u16) -> Self {
    self.srv_weight = weight;
    self
  }

  /// Gets the current port.
  pub fn port(&self) -> Option<u16> {
    self.port
  }

  /// Sets the port for the service.
  pub fn with_port(mut self, port: u16) -> Self {
    self.port = Some(port);
    self
  }

  /// Gets the current IPv4 addresses.
  pub fn ipv4s(&self) -> &[Ipv4Addr] {
    &self.ipv4s
  }

  /// Gets the current IPv6 addresses.
  pub fn ipv6s(&self) -> &[Ipv6Addr] {
    &self.ipv6s
  }

  /// Pushes an IP address to the list of IP addresses.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use beacon_mdns::ServiceBuilder;
  /// use std::net::IpAddr;
  ///
  /// let builder = ServiceBuilder::new("Living Room".into(), "_hap._tcp".into())
  ///   .with_ip(IpAddr::V4("192.168.0.1".parse().unwrap()));
  /// ```
  pub fn with_ip(mut self, ip: IpAddr) -> Self {
    match ip {
      IpAddr::V4(ip) => self.ipv4s.push(ip),
      IpAddr::V6(ip) => self.ipv6s.push(ip),
    }
    self
  }

  /// Gets the current TXT records.
  pub fn txt_records(&self) -> &[SmolStr] {
    &self.txt
  }

  /// Pushes a TXT record to the list of TXT records.
  ///
  /// ## Example
  ///
  /// ```rust
  /// use beacon_mdns::ServiceBuilder;
  ///
  /// let builder = ServiceBuilder::new("Living Room".into(), "_hap._tcp".into())
  ///   .with_txt_record("md=Beacon".into());
  /// ```
  pub fn with_txt_record(mut self, txt: SmolStr) -> Self {
    self.txt.push(txt);
    self
  }

  /// Gets the registered service subtypes.
  pub fn subtypes(&self) -> &[SmolStr] {
    &self.subtypes
  }

  /// Registers a service subtype, e.g. `_printer` (RFC 6763 section 7.1).
  pub fn with_subtype(mut self, subtype: SmolStr) -> Self {
    self.subtypes.push(subtype);
    self
  }

  /// Finalize the builder and try to create a new [`Service`].
  pub fn finalize(self) -> io::Result<Service> {
    let domain = match self.domain {
      Some(domain) => SmolStr::new(domain.trim_matches('.')),
      None => "local".into(),
    };

    let hostname = match self.hostname {
      Some(hostname) if !hostname.is_empty() => SmolStr::new(hostname.trim_matches('.')),
      _ => return Err(invalid_input_err(ServiceError::HostnameNotFound)),
    };

    let port = match self.port {
      None | Some(0) => return Err(invalid_input_err(ServiceError::PortNotFound)),
      Some(port) => port,
    };

    let service_name: Name = format_smolstr!("{}.{}", self.service.trim_matches('.'), domain)
      .parse()
      .map_err(invalid_input_err)?;
    let enum_name: Name = format_smolstr!("_services._dns-sd._udp.{}", domain)
      .parse()
      .map_err(invalid_input_err)?;
    let hostname_name: Name = format_smolstr!("{}.{}", hostname, domain)
      .parse()
      .map_err(invalid_input_err)?;
    let fqdn = service_name
      .child(Label::new(self.instance.as_str()).map_err(invalid_input_err)?)
      .map_err(invalid_input_err)?;

    let mut subtype_names = TinyVec::new();
    for subtype in &self.subtypes {
      subtype_names.push(
        format_smolstr!(
          "{}._sub.{}.{}",
          subtype.trim_matches('.'),
          self.service.trim_matches('.'),
          domain
        )
        .parse::<Name>()
        .map_err(invalid_input_err)?,
      );
    }

    let (ipv4s, ipv6s) = if self.ipv4s.is_empty() && self.ipv6s.is_empty() {
      // no addresses given: fall back to resolving the host name
      let tmp_hostname = format_smolstr!("{}.{}:{}", hostname, domain, port);

      let mut ipv4s = TinyVec::new();
      let mut ipv6s = TinyVec::new();
      tmp_hostname
        .as_str()
        .to_socket_addrs()
        .map_err(|e| {
          invalid_input_err(ServiceError::IpNotFound {
            hostname: tmp_hostname,
            error: e.into(),
          })
        })?
        .for_each(|addr| match addr.ip() {
          IpAddr::V4(ip) => ipv4s.push(ip),
          IpAddr::V6(ip) => ipv6s.push(ip),
        });

      (ipv4s, ipv6s)
    } else {
      (self.ipv4s, self.ipv6s)
    };

    Ok(Service {
      instance: self.instance.clone(),
      base_instance: self.instance,
      name_suffix: 1,
      service: self.service,
      domain,
      fqdn,
      service_name,
      enum_name,
      hostname: hostname_name,
      subtype_names,
      port,
      ttl: self.ttl,
      srv_priority: self.srv_priority,
      srv_weight: self.srv_weight,
      ipv4s,
      ipv6s,
      txt: Txt::from_strings(self.txt.iter()).map_err(invalid_input_err)?,
    })
  }
}

/// A named service instance and the record set it publishes.
#[derive(Debug)]
pub struct Service {
  /// Current instance label, including any conflict suffix.
  instance: SmolStr,
  /// Instance label as originally registered.
  base_instance: SmolStr,
  /// 1 for the unnumbered name; conflicts bump it to 2, 3, ...
  name_suffix: u32,
  /// Service name (e.g. "_hap._tcp")
  service: SmolStr,
  /// If blank, assumes "local"
  domain: SmolStr,
  /// Fully qualified instance name
  fqdn: Name,
  /// Fully qualified service name
  service_name: Name,
  /// _services._dns-sd._udp.<domain>
  enum_name: Name,
  /// Host machine DNS name
  hostname: Name,
  /// <subtype>._sub.<service>.<domain>, one per registered subtype
  subtype_names: TinyVec<Name>,
  port: u16,
  ttl: u32,
  srv_priority: u16,
  srv_weight: u16,
  ipv4s: TinyVec<Ipv4Addr>,
  ipv6s: TinyVec<Ipv6Addr>,
  txt: Txt,
}

impl Service {
  /// Returns the current instance label, including any conflict suffix.
  #[inline]
  pub const fn instance(&self) -> &SmolStr {
    &self.instance
  }

  /// Returns the service of the mdns service.
  #[inline]
  pub const fn service(&self) -> &SmolStr {
    &self.service
  }

  /// Returns the domain of the mdns service.
  #[inline]
  pub const fn domain(&self) -> &SmolStr {
    &self.domain
  }

  /// Returns the fully qualified instance name.
  #[inline]
  pub const fn fqdn(&self) -> &Name {
    &self.fqdn
  }

  /// Returns the fully qualified host name.
  #[inline]
  pub const fn hostname(&self) -> &Name {
    &self.hostname
  }

  /// Returns the fully qualified service name.
  #[inline]
  pub const fn service_name(&self) -> &Name {
    &self.service_name
  }

  /// Returns the port of the mdns service.
  #[inline]
  pub const fn port(&self) -> u16 {
    self.port
  }

  /// Returns the TTL of the host records.
  #[inline]
  pub const fn ttl(&self) -> u32 {
    self.ttl
  }

  /// Returns the IPv4 addresses of the mdns service.
  #[inline]
  pub fn ipv4s(&self) -> &[Ipv4Addr] {
    &self.ipv4s
  }

  /// Returns the IPv6 addresses of the mdns service.
  #[inline]
  pub fn ipv6s(&self) -> &[Ipv6Addr] {
    &self.ipv6s
  }

  /// Returns the TXT record data of the mdns service.
  #[inline]
  pub const fn txt(&self) -> &Txt {
    &self.txt
  }

  /// Picks the next instance name after a probe conflict: `Foo` becomes
  /// `Foo (2)`, then `Foo (3)`, and so on. The numeric suffix strictly
  /// increases across renames.
  pub fn increment_name(&mut self) -> io::Result<()> {
    self.name_suffix += 1;
    self.instance = format_smolstr!("{} ({})", self.base_instance, self.name_suffix);
    let label = Label::new(self.instance.as_str()).map_err(invalid_input_err)?;
    self.fqdn = self
      .service_name
      .child(label)
      .map_err(invalid_input_err)?;
    Ok(())
  }

  /// Every record the service publishes: the enumeration, service and
  /// subtype pointers plus the instance's SRV, TXT and address records.
  ///
  /// This is also the record set a prober attaches to its probe queries.
  pub fn records(&self) -> SmallVec<Record> {
    let mut records = SmallVec::new();
    records.push(Record::from_rdata(
      self.enum_name.clone(),
      DEFAULT_LONG_TTL,
      RecordData::PTR(self.service_name.clone()),
    ));
    records.push(Record::from_rdata(
      self.service_name.clone(),
      DEFAULT_LONG_TTL,
      RecordData::PTR(self.fqdn.clone()),
    ));
    for subtype in &self.subtype_names {
      records.push(Record::from_rdata(
        subtype.clone(),
        DEFAULT_LONG_TTL,
        RecordData::PTR(self.fqdn.clone()),
      ));
    }
    records.push(self.srv_record());
    records.push(self.txt_record());
    records.extend(self.address_records());
    records
  }

  /// The publish set with the cache-flush bit on every record this host
  /// owns exclusively, as sent in announcements (RFC 6762 section 8.3).
  pub fn announcement_records(&self) -> SmallVec<Record> {
    self
      .records()
      .into_iter()
      .map(|record| {
        let unique = !matches!(record.ty(), RecordType::PTR);
        record.with_cache_flush(unique)
      })
      .collect()
  }

  /// Answers and additionals for one inbound question.
  pub(crate) fn answers(&self, question: &Question) -> (SmallVec<Record>, SmallVec<Record>) {
    let qn = question.name();
    let qt = question.ty();
    let mut answers = SmallVec::new();
    let mut additionals = SmallVec::new();

    if qn.eq_ignore_case(&self.enum_name) {
      if matches!(qt, RecordType::PTR | RecordType::ANY) {
        answers.push(Record::from_rdata(
          self.enum_name.clone(),
          DEFAULT_LONG_TTL,
          RecordData::PTR(self.service_name.clone()),
        ));
      }
    } else if qn.eq_ignore_case(&self.service_name) {
      if matches!(qt, RecordType::PTR | RecordType::ANY) {
        answers.push(Record::from_rdata(
          self.service_name.clone(),
          DEFAULT_LONG_TTL,
          RecordData::PTR(self.fqdn.clone()),
        ));
        additionals.push(self.srv_record());
        additionals.push(self.txt_record());
        additionals.extend(self.address_records());
      }
    } else if let Some(subtype) = self
      .subtype_names
      .iter()
      .find(|name| qn.eq_ignore_case(name))
    {
      if matches!(qt, RecordType::PTR | RecordType::ANY) {
        answers.push(Record::from_rdata(
          subtype.clone(),
          DEFAULT_LONG_TTL,
          RecordData::PTR(self.fqdn.clone()),
        ));
        additionals.push(self.srv_record());
        additionals.push(self.txt_record());
        additionals.extend(self.address_records());
      }
    } else if qn.eq_ignore_case(&self.fqdn) {
      match qt {
        RecordType::ANY => {
          answers.push(self.srv_record());
          answers.push(self.txt_record());
          additionals.extend(self.address_records());
        }
        RecordType::SRV => {
          answers.push(self.srv_record());
          additionals.extend(self.address_records());
        }
        RecordType::TXT => {
          answers.push(self.txt_record());
        }
        _ => {}
      }
    } else if qn.eq_ignore_case(&self.hostname) {
      if matches!(qt, RecordType::A | RecordType::ANY) {
        answers.extend(
          self
            .ipv4s
            .iter()
            .map(|ip| Record::from_rdata(self.hostname.clone(), self.ttl, RecordData::A(*ip))),
        );
      }
      if matches!(qt, RecordType::AAAA | RecordType::ANY) {
        answers.extend(
          self
            .ipv6s
            .iter()
            .map(|ip| Record::from_rdata(self.hostname.clone(), self.ttl, RecordData::AAAA(*ip))),
        );
      }
    }

    (answers, additionals)
  }

  fn srv_record(&self) -> Record {
    Record::from_rdata(
      self.fqdn.clone(),
      self.ttl,
      RecordData::SRV(Srv::new(
        self.srv_priority,
        self.srv_weight,
        self.port,
        self.hostname.clone(),
      )),
    )
  }

  fn txt_record(&self) -> Record {
    Record::from_rdata(
      self.fqdn.clone(),
      DEFAULT_LONG_TTL,
      RecordData::TXT(self.txt.clone()),
    )
  }

  fn address_records(&self) -> SmallVec<Record> {
    let mut records = SmallVec::new();
    records.extend(
      self
        .ipv4s
        .iter()
        .map(|ip| Record::from_rdata(self.hostname.clone(), self.ttl, RecordData::A(*ip))),
    );
    records.extend(
      self
        .ipv6s
        .iter()
        .map(|ip| Record::from_rdata(self.hostname.clone(), self.ttl, RecordData::AAAA(*ip))),
    );
    records
  }
}
