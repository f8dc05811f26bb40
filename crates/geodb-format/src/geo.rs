//! Logical snapshot schema and its encoding
//!
//! A snapshot file is a single `Geo` message: the two range tables plus
//! reserved catalogue sections. Decoders skip unknown fields, so adding
//! sections later does not break older readers.

use crate::error::FormatError;
use crate::wire::{Reader, Writer, WIRE_LEN, WIRE_VARINT};

/// One IPv4 range with its location payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ipv4Range {
    pub from: u32,
    pub to: u32,
    pub country_id: u32,
    pub state_id: u32,
    pub city_id: u32,
    pub country_key: String,
    pub state_key: String,
    pub city_name: String,
}

/// One IPv6 range with its location payload
///
/// Addresses are stored as big-endian (hi, lo) u64 halves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ipv6Range {
    pub from_hi: u64,
    pub from_lo: u64,
    pub to_hi: u64,
    pub to_lo: u64,
    pub country_id: u32,
    pub state_id: u32,
    pub city_id: u32,
    pub country_key: String,
    pub state_key: String,
    pub city_name: String,
}

/// Catalogue row for the reserved countries/states/cities sections
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogueEntry {
    pub id: u32,
    /// Owning entity id; 0 for countries
    pub parent_id: u32,
    pub key: String,
    pub name: String,
    pub name_en: String,
    pub weight: u32,
}

/// The whole snapshot message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Geo {
    pub ipsv4: Vec<Ipv4Range>,
    pub ipsv6: Vec<Ipv6Range>,
    pub countries: Vec<CatalogueEntry>,
    pub states: Vec<CatalogueEntry>,
    pub cities: Vec<CatalogueEntry>,
}

// Geo field numbers
const F_IPSV4: u32 = 1;
const F_IPSV6: u32 = 2;
const F_COUNTRIES: u32 = 3;
const F_STATES: u32 = 4;
const F_CITIES: u32 = 5;

impl Ipv4Range {
    fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(1, self.from);
        w.put_u32(2, self.to);
        w.put_u32(3, self.country_id);
        w.put_u32(4, self.state_id);
        w.put_u32(5, self.city_id);
        w.put_str(6, &self.country_key);
        w.put_str(7, &self.state_key);
        w.put_str(8, &self.city_name);
        w.into_bytes()
    }

    fn decode(buf: &[u8]) -> Result<Self, FormatError> {
        let mut r = Reader::new(buf);
        let mut out = Self::default();
        while !r.is_empty() {
            let (field, wire_type) = r.tag()?;
            match (field, wire_type) {
                (1, WIRE_VARINT) => out.from = r.varint()? as u32,
                (2, WIRE_VARINT) => out.to = r.varint()? as u32,
                (3, WIRE_VARINT) => out.country_id = r.varint()? as u32,
                (4, WIRE_VARINT) => out.state_id = r.varint()? as u32,
                (5, WIRE_VARINT) => out.city_id = r.varint()? as u32,
                (6, WIRE_LEN) => out.country_key = r.str()?.to_string(),
                (7, WIRE_LEN) => out.state_key = r.str()?.to_string(),
                (8, WIRE_LEN) => out.city_name = r.str()?.to_string(),
                (_, t) => r.skip(t)?,
            }
        }
        Ok(out)
    }
}

impl Ipv6Range {
    fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u64(1, self.from_hi);
        w.put_u64(2, self.from_lo);
        w.put_u64(3, self.to_hi);
        w.put_u64(4, self.to_lo);
        w.put_u32(5, self.country_id);
        w.put_u32(6, self.state_id);
        w.put_u32(7, self.city_id);
        w.put_str(8, &self.country_key);
        w.put_str(9, &self.state_key);
        w.put_str(10, &self.city_name);
        w.into_bytes()
    }

    fn decode(buf: &[u8]) -> Result<Self, FormatError> {
        let mut r = Reader::new(buf);
        let mut out = Self::default();
        while !r.is_empty() {
            let (field, wire_type) = r.tag()?;
            match (field, wire_type) {
                (1, WIRE_VARINT) => out.from_hi = r.varint()?,
                (2, WIRE_VARINT) => out.from_lo = r.varint()?,
                (3, WIRE_VARINT) => out.to_hi = r.varint()?,
                (4, WIRE_VARINT) => out.to_lo = r.varint()?,
                (5, WIRE_VARINT) => out.country_id = r.varint()? as u32,
                (6, WIRE_VARINT) => out.state_id = r.varint()? as u32,
                (7, WIRE_VARINT) => out.city_id = r.varint()? as u32,
                (8, WIRE_LEN) => out.country_key = r.str()?.to_string(),
                (9, WIRE_LEN) => out.state_key = r.str()?.to_string(),
                (10, WIRE_LEN) => out.city_name = r.str()?.to_string(),
                (_, t) => r.skip(t)?,
            }
        }
        Ok(out)
    }
}

impl CatalogueEntry {
    fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.put_u32(1, self.id);
        w.put_u32(2, self.parent_id);
        w.put_str(3, &self.key);
        w.put_str(4, &self.name);
        w.put_str(5, &self.name_en);
        w.put_u32(6, self.weight);
        w.into_bytes()
    }

    fn decode(buf: &[u8]) -> Result<Self, FormatError> {
        let mut r = Reader::new(buf);
        let mut out = Self::default();
        while !r.is_empty() {
            let (field, wire_type) = r.tag()?;
            match (field, wire_type) {
                (1, WIRE_VARINT) => out.id = r.varint()? as u32,
                (2, WIRE_VARINT) => out.parent_id = r.varint()? as u32,
                (3, WIRE_LEN) => out.key = r.str()?.to_string(),
                (4, WIRE_LEN) => out.name = r.str()?.to_string(),
                (5, WIRE_LEN) => out.name_en = r.str()?.to_string(),
                (6, WIRE_VARINT) => out.weight = r.varint()? as u32,
                (_, t) => r.skip(t)?,
            }
        }
        Ok(out)
    }
}

impl Geo {
    /// Serialize the message to its wire form
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut w = Writer::new();
        for range in &self.ipsv4 {
            w.put_message(F_IPSV4, &range.encode());
        }
        for range in &self.ipsv6 {
            w.put_message(F_IPSV6, &range.encode());
        }
        for entry in &self.countries {
            w.put_message(F_COUNTRIES, &entry.encode());
        }
        for entry in &self.states {
            w.put_message(F_STATES, &entry.encode());
        }
        for entry in &self.cities {
            w.put_message(F_CITIES, &entry.encode());
        }
        w.into_bytes()
    }

    /// Parse a message from its wire form
    pub fn decode(buf: &[u8]) -> Result<Self, FormatError> {
        let mut r = Reader::new(buf);
        let mut out = Self::default();
        while !r.is_empty() {
            let (field, wire_type) = r.tag()?;
            match (field, wire_type) {
                (F_IPSV4, WIRE_LEN) => out.ipsv4.push(Ipv4Range::decode(r.bytes()?)?),
                (F_IPSV6, WIRE_LEN) => out.ipsv6.push(Ipv6Range::decode(r.bytes()?)?),
                (F_COUNTRIES, WIRE_LEN) => out.countries.push(CatalogueEntry::decode(r.bytes()?)?),
                (F_STATES, WIRE_LEN) => out.states.push(CatalogueEntry::decode(r.bytes()?)?),
                (F_CITIES, WIRE_LEN) => out.cities.push(CatalogueEntry::decode(r.bytes()?)?),
                (_, t) => r.skip(t)?,
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Writer;

    fn sample() -> Geo {
        Geo {
            ipsv4: vec![
                Ipv4Range {
                    from: 0x0A000000,
                    to: 0x0AFFFFFF,
                    country_id: 1,
                    state_id: 2,
                    city_id: 3,
                    country_key: "USA".into(),
                    state_key: "CA".into(),
                    city_name: "San Jose".into(),
                },
                Ipv4Range {
                    from: 0,
                    to: 0,
                    ..Default::default()
                },
            ],
            ipsv6: vec![Ipv6Range {
                from_hi: 0x2001_0db8_0000_0000,
                from_lo: 0,
                to_hi: 0x2001_0db8_ffff_ffff,
                to_lo: u64::MAX,
                country_id: 7,
                state_id: 0,
                city_id: 0,
                country_key: "DEU".into(),
                state_key: String::new(),
                city_name: String::new(),
            }],
            countries: vec![CatalogueEntry {
                id: 1,
                parent_id: 0,
                key: "US".into(),
                name: "United States".into(),
                name_en: "United States".into(),
                weight: 1,
            }],
            states: vec![],
            cities: vec![],
        }
    }

    #[test]
    fn round_trip() {
        let geo = sample();
        let bytes = geo.encode_to_vec();
        assert_eq!(Geo::decode(&bytes).unwrap(), geo);
    }

    #[test]
    fn empty_message() {
        let geo = Geo::default();
        let bytes = geo.encode_to_vec();
        assert!(bytes.is_empty());
        assert_eq!(Geo::decode(&[]).unwrap(), geo);
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let mut w = Writer::new();
        // Future section with field number 9
        w.put_message(9, b"whatever");
        w.put_u32(10, 42);
        let mut bytes = w.into_bytes();
        bytes.extend_from_slice(&sample().encode_to_vec());
        assert_eq!(Geo::decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn truncated_message_fails() {
        let bytes = sample().encode_to_vec();
        assert!(Geo::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn non_utf8_label_fails() {
        let mut inner = Writer::new();
        inner.put_u32(1, 1);
        let mut body = inner.into_bytes();
        // country_key (field 6) carrying invalid UTF-8
        body.push((6 << 3) | 2);
        body.push(2);
        body.extend_from_slice(&[0xff, 0xfe]);
        let mut w = Writer::new();
        w.put_message(super::F_IPSV4, &body);
        assert!(matches!(
            Geo::decode(&w.into_bytes()),
            Err(FormatError::InvalidString(_))
        ));
    }
}
