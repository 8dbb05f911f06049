//! Minimal DNS message codec for DNS-over-HTTPS lookups
//!
//! Only what a single A/AAAA query needs: encoding one question and pulling
//! the first matching address out of the answer section.

use crate::error::{PlatformError, Result};
use gcheck_core::strategy::IpVersion;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// A record
pub const TYPE_A: u16 = 1;
/// AAAA record
pub const TYPE_AAAA: u16 = 28;

const CLASS_IN: u16 = 1;
const HEADER_LEN: usize = 12;
const FLAG_RD: u16 = 0x0100;
const MAX_LABEL: usize = 63;

/// Record type matching an IP family
pub fn query_type(version: IpVersion) -> u16 {
    match version {
        IpVersion::V4 => TYPE_A,
        IpVersion::V6 => TYPE_AAAA,
    }
}

/// Encode a recursive query for one name
pub fn encode_query(id: u16, host: &str, qtype: u16) -> Result<Vec<u8>> {
    let mut msg = Vec::with_capacity(HEADER_LEN + host.len() + 6);
    msg.extend_from_slice(&id.to_be_bytes());
    msg.extend_from_slice(&FLAG_RD.to_be_bytes());
    msg.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    msg.extend_from_slice(&[0; 6]); // AN, NS, AR

    for label in host.trim_end_matches('.').split('.') {
        if label.is_empty() || label.len() > MAX_LABEL {
            return Err(PlatformError::Dns(format!("invalid host name '{host}'")));
        }
        msg.push(label.len() as u8);
        msg.extend_from_slice(label.as_bytes());
    }
    msg.push(0);
    msg.extend_from_slice(&qtype.to_be_bytes());
    msg.extend_from_slice(&CLASS_IN.to_be_bytes());
    Ok(msg)
}

/// First address of type `qtype` in the answer section
pub fn first_address(msg: &[u8], qtype: u16) -> Result<Option<IpAddr>> {
    if msg.len() < HEADER_LEN {
        return Err(truncated());
    }
    let rcode = msg[3] & 0x0f;
    if rcode != 0 {
        return Err(PlatformError::Dns(format!("server answered with rcode {rcode}")));
    }
    let qdcount = read_u16(msg, 4)?;
    let ancount = read_u16(msg, 6)?;

    let mut pos = HEADER_LEN;
    for _ in 0..qdcount {
        pos = skip_name(msg, pos)? + 4;
    }

    for _ in 0..ancount {
        pos = skip_name(msg, pos)?;
        let rtype = read_u16(msg, pos)?;
        let rdlength = usize::from(read_u16(msg, pos + 8)?);
        let start = pos + 10;
        let rdata = msg.get(start..start + rdlength).ok_or_else(truncated)?;
        pos = start + rdlength;

        if rtype != qtype {
            continue;
        }
        match (rtype, rdata.len()) {
            (TYPE_A, 4) => {
                let octets: [u8; 4] = rdata.try_into().map_err(|_| truncated())?;
                return Ok(Some(IpAddr::V4(Ipv4Addr::from(octets))));
            }
            (TYPE_AAAA, 16) => {
                let octets: [u8; 16] = rdata.try_into().map_err(|_| truncated())?;
                return Ok(Some(IpAddr::V6(Ipv6Addr::from(octets))));
            }
            _ => {}
        }
    }

    Ok(None)
}

/// Position right after the name starting at `pos`
fn skip_name(msg: &[u8], mut pos: usize) -> Result<usize> {
    loop {
        let len = *msg.get(pos).ok_or_else(truncated)?;
        match len {
            0 => return Ok(pos + 1),
            // Compression pointer ends the name
            l if l & 0xc0 == 0xc0 => return Ok(pos + 2),
            l => pos += 1 + usize::from(l),
        }
    }
}

fn read_u16(msg: &[u8], pos: usize) -> Result<u16> {
    msg.get(pos..pos + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(truncated)
}

fn truncated() -> PlatformError {
    PlatformError::Dns("truncated message".into())
}
