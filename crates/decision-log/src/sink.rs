use std::path::Path;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::entry::DecisionEntry;

const CHANNEL_BUFFER: usize = 256;

/// Errors opening or writing the decision log.
#[derive(Debug, thiserror::Error)]
pub enum DecisionLogError {
    #[error("failed to create parent directories: {0}")]
    CreateDir(std::io::Error),

    #[error("failed to open decision log file: {0}")]
    OpenFile(std::io::Error),
}

/// Cheap, cloneable handle that submits [`DecisionEntry`] values to a
/// background writer task.
///
/// Entries are serialized as newline-terminated JSON objects and appended to
/// the log file. Decisions are low-rate and security-relevant, so every
/// entry is flushed as soon as it is written. When the last handle is
/// dropped the channel closes and the task exits.
#[derive(Clone)]
pub struct DecisionSink {
    tx: mpsc::Sender<DecisionEntry>,
}

impl DecisionSink {
    /// Open (or create) the log file at `path` in append mode, spawn the
    /// writer task, and return a `(sink, join_handle)` pair.
    pub async fn start(
        path: impl AsRef<Path>,
    ) -> Result<(Self, JoinHandle<()>), DecisionLogError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(DecisionLogError::CreateDir)?;
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(DecisionLogError::OpenFile)?;

        let (tx, rx) = mpsc::channel::<DecisionEntry>(CHANNEL_BUFFER);
        let handle = tokio::spawn(run_writer(file, rx));

        Ok((Self { tx }, handle))
    }

    /// Submit a decision entry. If the writer task has already exited the
    /// entry is dropped with a warning; a decision log failure must never
    /// block or fail the authorization path.
    pub async fn record(&self, entry: DecisionEntry) {
        if self.tx.send(entry).await.is_err() {
            tracing::warn!("decision log writer gone; entry dropped");
        }
    }
}

async fn run_writer(mut file: tokio::fs::File, mut rx: mpsc::Receiver<DecisionEntry>) {
    while let Some(entry) = rx.recv().await {
        let mut line = match serde_json::to_vec(&entry) {
            Ok(line) => line,
            Err(err) => {
                tracing::error!(%err, "failed to serialize decision entry");
                continue;
            }
        };
        line.push(b'\n');

        if let Err(err) = file.write_all(&line).await {
            tracing::error!(%err, "failed to append decision entry");
            continue;
        }
        if let Err(err) = file.flush().await {
            tracing::error!(%err, "failed to flush decision log");
        }
    }
    tracing::debug!("decision log writer shutting down");
}
