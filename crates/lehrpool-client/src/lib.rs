//! lehrpool-client: streaming image downloads from a bwLehrpool image server.
//!
//! [`ImageDownload`] turns the chunked range protocol into a plain
//! [`std::io::Read`]. [`SessionHandler`] talks to the master server to obtain
//! the [`lehrpool_core::TransferTicket`] a download needs.

pub mod download;
pub mod error;
pub mod session;

pub use download::{ChunkWindow, DownloadOptions, ImageDownload, SaveReport, StreamState, TcpDownload};
pub use error::DownloadError;
pub use session::{MasterEndpoint, MasterError, MasterServer, SessionError, SessionHandler};
