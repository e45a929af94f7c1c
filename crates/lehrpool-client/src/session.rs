//! Session handling against the master server.
//!
//! The master server is reached through a [`MasterServer`] implementation
//! the caller constructs and hands over. A [`SessionHandler`] owns that
//! client for its whole life; there is no process-wide instance, so two
//! handlers can talk to two different masters side by side.

use lehrpool_core::catalog::{
    ClientSessionData, ImageDetails, ImageSummary, ImageVersionDetails, TransferInformation,
};
use lehrpool_core::config::MasterConfig;
use lehrpool_core::TransferTicket;

use crate::download::{DownloadOptions, TcpDownload};
use crate::error::DownloadError;

// ── Endpoint ──────────────────────────────────────────────────────────────────

/// Where the master server lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterEndpoint {
    pub hostname: String,
    pub port_ssl: u16,
    pub port_plain: u16,
}

impl MasterEndpoint {
    pub fn new(hostname: impl Into<String>, port_ssl: u16, port_plain: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port_ssl,
            port_plain,
        }
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.hostname.trim().is_empty() {
            return Err(SessionError::InvalidEndpoint("hostname is empty".to_string()));
        }
        if self.hostname.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(SessionError::InvalidEndpoint(format!(
                "hostname {:?} is not a host name",
                self.hostname
            )));
        }
        if self.port_ssl == 0 {
            return Err(SessionError::InvalidEndpoint("ssl port is 0".to_string()));
        }
        if self.port_plain == 0 {
            return Err(SessionError::InvalidEndpoint("plain port is 0".to_string()));
        }
        Ok(())
    }

    /// Address of the RPC endpoint. RPC always goes over TLS.
    pub fn rpc_address(&self) -> String {
        format!("{}:{}", self.hostname, self.port_ssl)
    }
}

impl From<&MasterConfig> for MasterEndpoint {
    fn from(config: &MasterConfig) -> Self {
        Self::new(config.hostname.clone(), config.port_ssl, config.port_plain)
    }
}

// ── Collaborator ──────────────────────────────────────────────────────────────

/// Errors reported by the master server itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MasterError {
    #[error("authorization failed: {0}")]
    Authorization(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("server failed to handle the call: {0}")]
    Invocation(String),
    #[error("rpc transport error: {0}")]
    Transport(String),
}

/// The subset of the master server's RPC interface the client needs.
pub trait MasterServer {
    fn ping(&mut self) -> Result<(), MasterError>;

    fn local_account_login(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<ClientSessionData, MasterError>;

    fn get_public_images(
        &mut self,
        session_id: &str,
        page: i32,
    ) -> Result<Vec<ImageSummary>, MasterError>;

    fn get_image_details(
        &mut self,
        session_id: &str,
        image_base_id: &str,
    ) -> Result<ImageDetails, MasterError>;

    fn download_image(
        &mut self,
        auth_token: &str,
        version_id: &str,
    ) -> Result<TransferInformation, MasterError>;
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid master endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("not logged in")]
    NotAuthenticated,
    #[error(transparent)]
    Master(#[from] MasterError),
    #[error("latest version {version_id} of image {image_base_id} is not in its version list")]
    LatestVersionMissing {
        image_base_id: String,
        version_id: String,
    },
    #[error(transparent)]
    Download(#[from] DownloadError),
}

// ── Handler ───────────────────────────────────────────────────────────────────

/// A logged-in (or about to log in) conversation with one master server.
pub struct SessionHandler<M: MasterServer> {
    client: M,
    endpoint: MasterEndpoint,
    session: Option<ClientSessionData>,
}

impl<M: MasterServer> SessionHandler<M> {
    /// Validate the endpoint and make sure the master answers.
    pub fn connect(endpoint: MasterEndpoint, mut client: M) -> Result<Self, SessionError> {
        endpoint.validate()?;
        client.ping()?;
        tracing::info!(addr = %endpoint.rpc_address(), "connected to master server");
        Ok(Self {
            client,
            endpoint,
            session: None,
        })
    }

    pub fn endpoint(&self) -> &MasterEndpoint {
        &self.endpoint
    }

    pub fn session(&self) -> Option<&ClientSessionData> {
        self.session.as_ref()
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<&ClientSessionData, SessionError> {
        let session = self
            .client
            .local_account_login(username, password)
            .inspect_err(|e| tracing::warn!(username, error = %e, "authentication failed"))?;
        tracing::debug!(satellites = session.satellites.len(), "logged in");
        Ok(&*self.session.insert(session))
    }

    pub fn public_image_list(&mut self, page: i32) -> Result<Vec<ImageSummary>, SessionError> {
        let session_id = self.require_session()?.session_id.clone();
        Ok(self.client.get_public_images(&session_id, page)?)
    }

    pub fn image_details(&mut self, image_base_id: &str) -> Result<ImageDetails, SessionError> {
        let session_id = self.require_session()?.session_id.clone();
        self.client
            .get_image_details(&session_id, image_base_id)
            .inspect_err(|e| tracing::warn!(image_base_id, error = %e, "image details lookup failed"))
            .map_err(SessionError::from)
    }

    pub fn latest_version(&mut self, image_base_id: &str) -> Result<ImageVersionDetails, SessionError> {
        let details = self.image_details(image_base_id)?;
        details
            .latest_version()
            .cloned()
            .ok_or_else(|| SessionError::LatestVersionMissing {
                image_base_id: image_base_id.to_string(),
                version_id: details.latest_version_id.clone(),
            })
    }

    /// Ask the master for a ticket to download the latest version of an image.
    ///
    /// Image data is served by the master host itself, on the plain port
    /// named in the transfer grant. A grant without a port falls back to the
    /// endpoint's plain port.
    pub fn request_download(&mut self, image_base_id: &str) -> Result<TransferTicket, SessionError> {
        let version = self.latest_version(image_base_id)?;
        let auth_token = self.require_session()?.auth_token.clone();
        let mut info = self
            .client
            .download_image(&auth_token, &version.version_id)
            .inspect_err(|e| {
                tracing::warn!(version_id = %version.version_id, error = %e, "download request refused")
            })?;
        if info.plain_port == 0 {
            info.plain_port = self.endpoint.port_plain;
        }
        tracing::debug!(
            image_base_id,
            version_id = %version.version_id,
            port = info.plain_port,
            file_size = version.file_size,
            "transfer granted"
        );
        Ok(TransferTicket::from_transfer(
            self.endpoint.hostname.clone(),
            &info,
            version.file_size,
        ))
    }

    /// Request a ticket and open the download connection in one step.
    pub fn open_download(
        &mut self,
        image_base_id: &str,
        options: &DownloadOptions,
    ) -> Result<TcpDownload, SessionError> {
        let ticket = self.request_download(image_base_id)?;
        Ok(TcpDownload::connect(&ticket, options)?)
    }

    fn require_session(&self) -> Result<&ClientSessionData, SessionError> {
        self.session.as_ref().ok_or(SessionError::NotAuthenticated)
    }
}
