//! lehrpool-core: wire format, catalog types and configuration.
//! The download client and the CLI both depend on this crate.

pub mod catalog;
pub mod config;
pub mod error;
pub mod wire;

pub use catalog::{ImageDetails, ImageSpecifics, ImageVersionDetails, TransferTicket};
pub use error::ErrorKind;
pub use wire::{ByteRange, KeyValue, WireError};
