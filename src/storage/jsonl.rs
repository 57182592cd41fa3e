//! JSON-lines file backend
//!
//! Appends one JSON object per line to a history file. The file is opened in
//! append mode, so successive runs extend the same history.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, trace};

use super::backend::StorageBackend;
use super::error::{StorageError, StorageResult};
use super::schema::UpdateRecord;

pub struct JsonLinesBackend {
    path: PathBuf,
    writer: Option<BufWriter<File>>,

    /// Flush after every record instead of relying on the buffer
    flush_each: bool,
}

impl JsonLinesBackend {
    /// Open (or create) the history file at `path`
    pub async fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        debug!("opened history file {}", path.display());

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            flush_each: true,
        })
    }

    /// Keep records in the write buffer until an explicit flush
    pub fn buffered(mut self) -> Self {
        self.flush_each = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StorageBackend for JsonLinesBackend {
    async fn append(&mut self, record: &UpdateRecord) -> StorageResult<()> {
        let writer = self.writer.as_mut().ok_or(StorageError::Closed)?;

        let mut line = record.to_line()?;
        line.push('\n');

        writer.write_all(line.as_bytes()).await?;
        if self.flush_each {
            writer.flush().await?;
        }

        trace!("appended record for {}", record.device_id);
        Ok(())
    }

    async fn flush(&mut self) -> StorageResult<()> {
        let writer = self.writer.as_mut().ok_or(StorageError::Closed)?;
        writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> StorageResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            writer.into_inner().sync_all().await?;
            debug!("closed history file {}", self.path.display());
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("jsonl: {}", self.path.display())
    }
}
