// Raw text -> Packet parsing and validation
//
// Line format: "src_ip:src_port->dst_ip:dst_port|size|latency"
// e.g. "192.168.1.1:5000->10.0.0.1:80|1024|12.5"

use crate::packet::{Packet, Protocol};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("missing '{0}' separator")]
    MissingSeparator(&'static str),
    #[error("bad endpoint '{0}', expected ip:port")]
    BadEndpoint(String),
    #[error("bad port '{0}'")]
    BadPort(String),
    #[error("bad size '{0}'")]
    BadSize(String),
    #[error("bad latency '{0}'")]
    BadLatency(String),
    #[error("packet failed validation: {0}")]
    Invalid(&'static str),
}

pub type PacketCallback = Box<dyn Fn(&Packet) + Send + Sync>;

#[derive(Default)]
pub struct PacketProcessor {
    callbacks: Vec<PacketCallback>,
}

impl fmt::Debug for PacketProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketProcessor")
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

fn parse_endpoint(part: &str) -> Result<(String, u16), ParseError> {
    let (ip, port) = part
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| ParseError::BadEndpoint(part.to_string()))?;
    let port = port
        .trim()
        .parse::<u16>()
        .map_err(|_| ParseError::BadPort(port.to_string()))?;
    Ok((ip.trim().to_string(), port))
}

// Four 1-3 digit octets, each <= 255. Leading zeros are accepted ("192.168.01.1").
fn is_valid_ip(ip: &str) -> bool {
    let octets: Vec<&str> = ip.split('.').collect();
    octets.len() == 4
        && octets.iter().all(|o| {
            (1..=3).contains(&o.len()) && o.bytes().all(|b| b.is_ascii_digit()) && o.parse::<u8>().is_ok()
        })
}

impl PacketProcessor {
    pub fn new() -> Self {
        Default::default()
    }

    /// Parses one raw line. Protocol is derived from the destination port.
    pub fn parse_packet(&self, raw: &str) -> Result<Packet, ParseError> {
        let (src_part, rest) = raw.split_once("->").ok_or(ParseError::MissingSeparator("->"))?;
        let mut fields = rest.splitn(3, '|');
        let dst_part = fields.next().unwrap_or_default();
        let size_str = fields.next().ok_or(ParseError::MissingSeparator("|"))?;
        let latency_str = fields.next().ok_or(ParseError::MissingSeparator("|"))?;

        let (src_ip, src_port) = parse_endpoint(src_part)?;
        let (dst_ip, dst_port) = parse_endpoint(dst_part)?;
        let size_bytes = size_str
            .trim()
            .parse::<u32>()
            .map_err(|_| ParseError::BadSize(size_str.to_string()))?;
        let latency_ms = latency_str
            .trim()
            .parse::<f64>()
            .map_err(|_| ParseError::BadLatency(latency_str.to_string()))?;

        Ok(Packet::new(
            src_ip,
            dst_ip,
            src_port,
            dst_port,
            self.detect_protocol(dst_port),
            size_bytes,
            latency_ms,
        ))
    }

    pub fn validate(&self, packet: &Packet) -> Result<(), ParseError> {
        if packet.src_ip.is_empty() || packet.dst_ip.is_empty() {
            return Err(ParseError::Invalid("empty address"));
        }
        if !is_valid_ip(&packet.src_ip) || !is_valid_ip(&packet.dst_ip) {
            return Err(ParseError::Invalid("address is not dotted-quad IPv4"));
        }
        if packet.size_bytes == 0 {
            return Err(ParseError::Invalid("zero size"));
        }
        if packet.latency_ms.is_nan() || packet.latency_ms < 0.0 {
            return Err(ParseError::Invalid("negative latency"));
        }
        Ok(())
    }

    pub fn is_valid_packet(&self, packet: &Packet) -> bool {
        self.validate(packet).is_ok()
    }

    pub fn detect_protocol(&self, port: u16) -> Protocol {
        match port {
            80 | 443 | 8080 => Protocol::Tcp,
            53 | 67 | 68 => Protocol::Udp,
            0 => Protocol::Icmp,
            p if p < 1024 => Protocol::Tcp,
            _ => Protocol::Unknown,
        }
    }

    /// Parses and validates in one step.
    pub fn process_line(&self, raw: &str) -> Result<Packet, ParseError> {
        let packet = self.parse_packet(raw)?;
        self.validate(&packet)?;
        Ok(packet)
    }

    pub fn on_packet_processed<F>(&mut self, callback: F)
    where
        F: Fn(&Packet) + Send + Sync + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Keeps the valid packets in input order, firing callbacks for each.
    pub fn process_batch<S: AsRef<str>>(&self, raw_packets: &[S]) -> Vec<Packet> {
        let mut result = Vec::with_capacity(raw_packets.len());
        for raw in raw_packets {
            match self.process_line(raw.as_ref()) {
                Ok(packet) => {
                    for callback in &self.callbacks {
                        callback(&packet);
                    }
                    result.push(packet);
                }
                Err(e) => log::debug!("Dropping line {:?}: {}", raw.as_ref(), e),
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_parse_valid_line() {
        let processor = PacketProcessor::new();
        let packet = processor.parse_packet("192.168.1.1:5000->10.0.0.1:80|1024|12.5").unwrap();
        assert_eq!(packet.src_ip, "192.168.1.1");
        assert_eq!(packet.src_port, 5000);
        assert_eq!(packet.dst_ip, "10.0.0.1");
        assert_eq!(packet.dst_port, 80);
        assert_eq!(packet.size_bytes, 1024);
        assert_eq!(packet.latency_ms, 12.5);
        assert_eq!(packet.protocol, Protocol::Tcp);
    }

    #[test]
    fn test_parse_errors() {
        let processor = PacketProcessor::new();
        assert_eq!(processor.parse_packet("garbage"), Err(ParseError::MissingSeparator("->")));
        assert_eq!(processor.parse_packet("1.1.1.1:1->2.2.2.2:2|10"), Err(ParseError::MissingSeparator("|")));
        assert!(matches!(processor.parse_packet("1.1.1.1->2.2.2.2:2|10|1"), Err(ParseError::BadEndpoint(_))));
        assert!(matches!(processor.parse_packet("1.1.1.1:99999->2.2.2.2:2|10|1"), Err(ParseError::BadPort(_))));
        assert!(matches!(processor.parse_packet("1.1.1.1:1->2.2.2.2:2|abc|1"), Err(ParseError::BadSize(_))));
        assert!(matches!(processor.parse_packet("1.1.1.1:1->2.2.2.2:2|10|fast"), Err(ParseError::BadLatency(_))));
    }

    #[test]
    fn test_validation() {
        let processor = PacketProcessor::new();
        let good = Packet::new("192.168.1.1", "10.0.0.1", 1, 80, Protocol::Tcp, 10, 1.0);
        assert!(processor.is_valid_packet(&good));

        let bad_ip = Packet { src_ip: "999.1.1.1".into(), ..good.clone() };
        assert!(!processor.is_valid_packet(&bad_ip));
        let empty = Packet { dst_ip: String::new(), ..good.clone() };
        assert!(!processor.is_valid_packet(&empty));
        let zero = Packet { size_bytes: 0, ..good.clone() };
        assert!(!processor.is_valid_packet(&zero));
        let negative = Packet { latency_ms: -1.0, ..good };
        assert_eq!(processor.validate(&negative), Err(ParseError::Invalid("negative latency")));
    }

    #[test]
    fn test_dotted_quad_octets() {
        assert!(is_valid_ip("192.168.1.1"));
        assert!(is_valid_ip("192.168.01.1"));
        assert!(is_valid_ip("000.0.0.255"));
        assert!(!is_valid_ip("999.1.1.1"));
        assert!(!is_valid_ip("1.2.3"));
        assert!(!is_valid_ip("1.2.3.4.5"));
        assert!(!is_valid_ip("1..3.4"));
        assert!(!is_valid_ip("0001.2.3.4"));
        assert!(!is_valid_ip("+1.2.3.4"));

        let processor = PacketProcessor::new();
        let packet = processor.process_line("192.168.01.1:5000->10.0.0.1:80|64|1.0").unwrap();
        assert_eq!(packet.src_ip, "192.168.01.1");
    }

    #[test]
    fn test_detect_protocol() {
        let processor = PacketProcessor::new();
        assert_eq!(processor.detect_protocol(443), Protocol::Tcp);
        assert_eq!(processor.detect_protocol(53), Protocol::Udp);
        assert_eq!(processor.detect_protocol(0), Protocol::Icmp);
        assert_eq!(processor.detect_protocol(22), Protocol::Tcp);
        assert_eq!(processor.detect_protocol(9999), Protocol::Unknown);
    }

    #[test]
    fn test_process_batch_filters_and_calls_back() {
        let mut processor = PacketProcessor::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        processor.on_packet_processed(move |_| {
            seen_clone.fetch_add(1, Ordering::SeqCst);
        });

        let lines = [
            "192.168.1.1:5000->10.0.0.1:80|1024|12.5",
            "not a packet",
            "192.168.1.2:5001->10.0.0.2:9999|512|3.0",
            "192.168.1.3:5002->10.0.0.3:53|0|3.0",
        ];
        let packets = processor.process_batch(&lines[..]);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].src_ip, "192.168.1.1");
        assert_eq!(packets[1].protocol, Protocol::Unknown);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
