//! Geodb Snapshot Container Format
//!
//! This crate defines the on-disk container for geodb snapshots: a single
//! tagged, length-prefixed `Geo` message holding the IPv4/IPv6 range tables
//! and the reserved catalogue sections.
//!
//! # Architectural Separation
//!
//! - **geodb-format**: owns tags, varints and section encoding; pure
//!   bytes-in/bytes-out, no I/O, no logging
//! - **geodb**: owns the in-memory index built from a decoded `Geo` and the
//!   file handling around it
//!
//! # Wire Shape
//!
//! ```text
//! Geo
//! ├─ ipsv4     (field 1, repeated message)  from/to/ids/labels
//! ├─ ipsv6     (field 2, repeated message)  hi-lo halves/ids/labels
//! ├─ countries (field 3, reserved)
//! ├─ states    (field 4, reserved)
//! └─ cities    (field 5, reserved)
//! ```
//!
//! Scalars are varints, strings and nested messages are length-delimited.
//! Decoders skip unknown fields, so the reserved sections (and anything
//! added after them) never break older readers.

pub mod error;
mod geo;
mod wire;

pub use error::FormatError;
pub use geo::{CatalogueEntry, Geo, Ipv4Range, Ipv6Range};
