use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use pn_crypto::DEFAULT_CHUNK_SIZE;
use pn_domain::{OperationType, StatusCategory};

use super::require;
use crate::builder::RequestParameters;
use crate::client::{unexpected, Client};
use crate::parser::ParsedData;
use crate::status::Status;

fn io_status(path: &Path, e: std::io::Error) -> Status {
    Status::error(
        OperationType::DownloadFile,
        StatusCategory::Unknown,
        format!("{}: {e}", path.display()),
    )
}

impl Client {
    /// Download a shared file into `destination`, decrypting it when a
    /// crypto module is configured.  Returns the bytes written.
    ///
    /// The body is streamed to a temporary file first; the temporary
    /// file is removed whether or not the copy succeeds.
    pub async fn download_file(
        &self,
        channel: &str,
        file_id: &str,
        file_name: &str,
        destination: impl AsRef<Path>,
    ) -> Result<u64, Status> {
        let op = OperationType::DownloadFile;
        require(op, channel, "channel")?;
        require(op, file_id, "file id")?;
        require(op, file_name, "file name")?;
        let params = RequestParameters::new()
            .path("channel", channel)
            .path("file_id", file_id)
            .path("file_name", file_name);
        let temp = match self.process(op, params).await? {
            ParsedData::File(temp) => temp,
            other => return Err(unexpected(op, other)),
        };

        let destination: PathBuf = destination.as_ref().to_path_buf();
        let crypto = self.engine.shared_crypto();
        let written = tokio::task::spawn_blocking(move || -> Result<u64, Status> {
            let mut reader =
                BufReader::new(File::open(&temp).map_err(|e| io_status(&temp, e))?);
            let mut writer =
                BufWriter::new(File::create(&destination).map_err(|e| io_status(&destination, e))?);
            let written = match crypto {
                Some(crypto) => crypto
                    .decrypt_stream(&mut reader, &mut writer, DEFAULT_CHUNK_SIZE)
                    .map_err(|e| {
                        Status::error(op, StatusCategory::DecryptionError, e.to_string())
                    })?,
                None => std::io::copy(&mut reader, &mut writer)
                    .map_err(|e| io_status(&destination, e))?,
            };
            writer.flush().map_err(|e| io_status(&destination, e))?;
            drop(temp);
            Ok(written)
        })
        .await
        .map_err(|e| Status::error(op, StatusCategory::Unknown, format!("download task: {e}")))??;

        tracing::debug!(channel, file_id, bytes = written, "file downloaded");
        Ok(written)
    }
}
