//! Catalog types: what the master server says about images and transfers.
//!
//! These mirror the master server's records closely enough to be decoded
//! from its JSON exports. Only the fields the download path or the CLI
//! actually look at are modelled; anything else in the input is ignored.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{self, IgnoredAny, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Session ───────────────────────────────────────────────────────────────────

/// Returned by a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSessionData {
    /// Identifies the session for catalog queries.
    pub session_id: String,
    /// Authorizes transfer requests.
    pub auth_token: String,
    #[serde(default)]
    pub satellites: Vec<Satellite>,
}

/// A satellite server the user's account is registered with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Satellite {
    pub display_name: String,
    #[serde(default)]
    pub addresses: Vec<String>,
}

// ── Images ────────────────────────────────────────────────────────────────────

/// One row of the public image list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSummary {
    pub image_base_id: String,
    pub image_name: String,
    pub latest_version_id: String,
    /// Size of the latest version in bytes.
    #[serde(default)]
    pub file_size: u64,
}

/// A single uploaded version of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageVersionDetails {
    pub version_id: String,
    /// Unix seconds.
    #[serde(default)]
    pub create_time: i64,
    /// Unix seconds. 0 = never.
    #[serde(default)]
    pub expire_time: i64,
    /// Size of the disk image in bytes.
    pub file_size: u64,
    #[serde(default)]
    pub uploader_id: String,
    #[serde(default)]
    pub is_valid: bool,
}

/// Full details for an image base, including every known version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDetails {
    pub image_base_id: String,
    pub latest_version_id: String,
    pub image_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub virt_id: String,
    #[serde(default)]
    pub versions: Vec<ImageVersionDetails>,
}

impl ImageDetails {
    /// The version `latest_version_id` points at, if the server listed it.
    pub fn latest_version(&self) -> Option<&ImageVersionDetails> {
        self.versions
            .iter()
            .find(|v| v.version_id == self.latest_version_id)
    }
}

// ── Specifics ─────────────────────────────────────────────────────────────────

/// An image together with the version selected for it.
///
/// Encoded in JSON as a two-element array, `[details, version]`.
/// Arrays of any other length are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpecifics {
    pub details: ImageDetails,
    pub version: ImageVersionDetails,
}

impl ImageSpecifics {
    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl Serialize for ImageSpecifics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.details)?;
        tuple.serialize_element(&self.version)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for ImageSpecifics {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SpecificsVisitor;

        impl<'de> Visitor<'de> for SpecificsVisitor {
            type Value = ImageSpecifics;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an array of [image details, image version]")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                let details = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let version = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                let mut extra = 0;
                while seq.next_element::<IgnoredAny>()?.is_some() {
                    extra += 1;
                }
                if extra > 0 {
                    return Err(de::Error::invalid_length(2 + extra, &self));
                }
                Ok(ImageSpecifics { details, version })
            }
        }

        deserializer.deserialize_seq(SpecificsVisitor)
    }
}

// ── Transfers ─────────────────────────────────────────────────────────────────

/// The master server's answer to a download request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInformation {
    /// Opaque token presented to the image server.
    pub token: String,
    /// Plain TCP port of the image server.
    pub plain_port: u16,
    /// TLS port of the image server. 0 = not offered.
    #[serde(default)]
    pub ssl_port: u16,
    /// VM description (e.g. a .vmx) shipped alongside the transfer.
    #[serde(default)]
    pub machine_description: Option<String>,
}

/// Everything needed to open a download connection.
///
/// Immutable for the lifetime of a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferTicket {
    pub host: String,
    pub port: u16,
    pub token: String,
    /// Total size of the image in bytes.
    pub file_size: u64,
}

impl TransferTicket {
    pub fn new(host: impl Into<String>, port: u16, token: impl Into<String>, file_size: u64) -> Self {
        Self {
            host: host.into(),
            port,
            token: token.into(),
            file_size,
        }
    }

    /// Combine a transfer grant with the host it was obtained from.
    pub fn from_transfer(host: impl Into<String>, info: &TransferInformation, file_size: u64) -> Self {
        Self::new(host, info.plain_port, info.token.clone(), file_size)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn from_json(text: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::ReadFailed(path.to_path_buf(), e))?;
        Self::from_json(&text)
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to decode catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
}
