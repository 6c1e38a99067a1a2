//! Host identities and socket endpoints

use std::net::{IpAddr, SocketAddr};

use crate::features::trace_source::MachineRecord;
use crate::shared::models::HostData;

/// Host payload for a machine described by the trace
pub fn host_data(machine: &MachineRecord, is_analysis_host: bool) -> HostData {
    HostData {
        address: machine.address.trim().to_string(),
        hostname: machine.hostname.trim().to_string(),
        domain: machine.domain.trim().to_string(),
        is_analysis_host,
    }
}

/// Remote end of a connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub address: String,
    pub port: Option<u16>,
}

impl Endpoint {
    /// From separate address and port arguments, or from a single
    /// `address:port` (`[v6]:port`) string
    pub fn parse(address: &str, port: Option<u64>) -> Option<Self> {
        let address = address.trim();
        if address.is_empty() {
            return None;
        }
        if let Ok(socket) = address.parse::<SocketAddr>() {
            return Some(Self {
                address: socket.ip().to_string(),
                port: Some(socket.port()),
            });
        }
        let address = match address.parse::<IpAddr>() {
            Ok(ip) => ip.to_string(),
            Err(_) => address.to_string(),
        };
        Some(Self {
            address,
            port: port.and_then(|p| u16::try_from(p).ok()),
        })
    }

    pub fn to_host_data(&self) -> HostData {
        HostData {
            address: self.address.clone(),
            hostname: String::new(),
            domain: String::new(),
            is_analysis_host: false,
        }
    }
}

/// Host payload for a name looked up through DNS
pub fn resolved_host(name: &str) -> Option<HostData> {
    let name = name.trim().trim_end_matches('.');
    if name.is_empty() {
        return None;
    }
    let data = match name.parse::<IpAddr>() {
        Ok(ip) => HostData {
            address: ip.to_string(),
            hostname: String::new(),
            domain: String::new(),
            is_analysis_host: false,
        },
        Err(_) => HostData {
            address: String::new(),
            hostname: name.to_lowercase(),
            domain: String::new(),
            is_analysis_host: false,
        },
    };
    Some(data)
}
