//! Saving a download to disk.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use super::reader::ImageDownload;
use crate::error::DownloadError;

const COPY_BUF: usize = 256 * 1024;

/// What ended up on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReport {
    pub bytes: u64,
    /// BLAKE3 of the written bytes.
    pub digest: [u8; 32],
}

impl SaveReport {
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

impl<R: Read, W: Write> ImageDownload<R, W> {
    /// Stream the whole image into `path`, creating or truncating it.
    ///
    /// A partial file is left in place if the download fails.
    pub fn save_to(&mut self, path: &Path) -> Result<SaveReport, DownloadError> {
        let target = path.display().to_string();
        let storage = |source: io::Error| DownloadError::Storage {
            target: target.clone(),
            source,
        };

        let file = File::create(path).map_err(storage)?;
        let mut out = BufWriter::new(file);
        let report = self.copy_into(&mut out, &target)?;
        let file = out.into_inner().map_err(|e| storage(e.into_error()))?;
        file.sync_all().map_err(storage)?;

        tracing::info!(path = %target, bytes = report.bytes, blake3 = %report.digest_hex(), "image saved");
        Ok(report)
    }

    /// Stream the whole image into any writer.
    pub fn copy_to<O: Write>(&mut self, out: &mut O) -> Result<SaveReport, DownloadError> {
        self.copy_into(out, "output stream")
    }

    fn copy_into<O: Write>(&mut self, out: &mut O, target: &str) -> Result<SaveReport, DownloadError> {
        let storage = |source: io::Error| DownloadError::Storage {
            target: target.to_string(),
            source,
        };

        let mut buf = vec![0u8; COPY_BUF];
        let mut hasher = blake3::Hasher::new();
        let mut bytes = 0u64;
        loop {
            let n = match self.read_chunk(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(DownloadError::Transport { ref source, .. })
                    if source.kind() == io::ErrorKind::Interrupted =>
                {
                    continue
                }
                Err(e) => return Err(e),
            };
            out.write_all(&buf[..n]).map_err(storage)?;
            hasher.update(&buf[..n]);
            bytes += n as u64;
        }
        out.flush().map_err(storage)?;

        if bytes != self.file_size() {
            tracing::warn!(output = target, received = bytes, expected = self.file_size(), "image incomplete");
            return Err(DownloadError::Incomplete {
                received: bytes,
                expected: self.file_size(),
            });
        }
        Ok(SaveReport {
            bytes,
            digest: *hasher.finalize().as_bytes(),
        })
    }
}
