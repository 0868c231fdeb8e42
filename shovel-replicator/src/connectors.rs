//! Connectors exchanging messages through JSON-lines files.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shovel::bail;
use shovel::destination::Destination;
use shovel::error::{ErrorKind, ShovelResult};
use shovel::shovel_error;
use shovel::source::Source;
use shovel::types::{DestinationConfig, Message, SourceConfig};
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter, Lines};
use tracing::info;

/// Source replaying the messages of a JSON-lines file, one message per line.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    lines: Arc<tokio::sync::Mutex<Option<Lines<BufReader<File>>>>>,
    line_number: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lines: Arc::new(tokio::sync::Mutex::new(None)),
            line_number: Arc::new(AtomicU64::new(0)),
            finished: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Source for FileSource {
    fn name() -> &'static str {
        "file"
    }

    async fn start(&self, config: &SourceConfig, work_dir: &Path) -> ShovelResult<()> {
        let file = File::open(&self.path).await.map_err(|err| {
            shovel_error!(
                ErrorKind::IoError,
                "Could not open the source messages file",
                self.path.display(),
                source: err
            )
        })?;
        *self.lines.lock().await = Some(BufReader::new(file).lines());

        info!(
            source_id = %config.source_id,
            path = %self.path.display(),
            work_dir = %work_dir.display(),
            "started file source"
        );

        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst) || self.cancelled.load(Ordering::SeqCst)
    }

    async fn attempt_read(&self) -> ShovelResult<Option<Message>> {
        let mut lines = self.lines.lock().await;
        let Some(lines) = lines.as_mut() else {
            bail!(ErrorKind::InvalidState, "File source was not started");
        };

        while let Some(line) = lines.next_line().await? {
            let line_number = self.line_number.fetch_add(1, Ordering::SeqCst) + 1;
            if line.trim().is_empty() {
                continue;
            }

            let message = serde_json::from_str(&line).map_err(|err| {
                shovel_error!(
                    ErrorKind::DeserializationError,
                    "Source emitted an invalid message",
                    format!("line {line_number}"),
                    source: err
                )
            })?;

            return Ok(Some(message));
        }

        self.finished.store(true, Ordering::SeqCst);

        Ok(None)
    }

    fn exit_value(&self) -> ShovelResult<i32> {
        Ok(0)
    }

    async fn close(&self) -> ShovelResult<()> {
        self.lines.lock().await.take();
        self.finished.store(true, Ordering::SeqCst);

        Ok(())
    }

    async fn cancel(&self) -> ShovelResult<()> {
        self.cancelled.store(true, Ordering::SeqCst);

        Ok(())
    }
}

/// Destination appending every accepted message to a JSON-lines file.
///
/// A state is acknowledged once everything written before it was flushed.
#[derive(Debug, Clone)]
pub struct FileDestination {
    path: PathBuf,
    writer: Arc<tokio::sync::Mutex<Option<BufWriter<File>>>>,
    acknowledged: Arc<Mutex<VecDeque<Message>>>,
    end_of_input: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    cancelled: Arc<AtomicBool>,
}

impl FileDestination {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Arc::new(tokio::sync::Mutex::new(None)),
            acknowledged: Arc::new(Mutex::new(VecDeque::new())),
            end_of_input: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock_acknowledged(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.acknowledged
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn flush(&self) -> ShovelResult<()> {
        if let Some(writer) = self.writer.lock().await.as_mut() {
            writer.flush().await?;
        }

        Ok(())
    }
}

impl Destination for FileDestination {
    fn name() -> &'static str {
        "file"
    }

    async fn start(&self, config: &DestinationConfig, work_dir: &Path) -> ShovelResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = File::create(&self.path).await.map_err(|err| {
            shovel_error!(
                ErrorKind::IoError,
                "Could not create the destination messages file",
                self.path.display(),
                source: err
            )
        })?;
        *self.writer.lock().await = Some(BufWriter::new(file));

        info!(
            destination_id = %config.destination_id,
            streams = config.catalog.streams.len(),
            path = %self.path.display(),
            work_dir = %work_dir.display(),
            "started file destination"
        );

        Ok(())
    }

    async fn accept(&self, message: Message) -> ShovelResult<()> {
        let mut line = serde_json::to_vec(&message)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        let Some(writer) = writer.as_mut() else {
            bail!(ErrorKind::InvalidState, "File destination is not open");
        };
        writer.write_all(&line).await?;

        if let Message::State(_) = &message {
            writer.flush().await?;
            self.lock_acknowledged().push_back(message);
        }

        Ok(())
    }

    async fn notify_end_of_input(&self) -> ShovelResult<()> {
        self.flush().await?;
        self.end_of_input.store(true, Ordering::SeqCst);

        Ok(())
    }

    fn is_finished(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) || self.closed.load(Ordering::SeqCst) {
            return true;
        }

        self.end_of_input.load(Ordering::SeqCst) && self.lock_acknowledged().is_empty()
    }

    async fn attempt_read(&self) -> ShovelResult<Option<Message>> {
        Ok(self.lock_acknowledged().pop_front())
    }

    fn exit_value(&self) -> ShovelResult<i32> {
        Ok(0)
    }

    async fn close(&self) -> ShovelResult<()> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.flush().await?;
        }
        self.closed.store(true, Ordering::SeqCst);

        Ok(())
    }

    async fn cancel(&self) -> ShovelResult<()> {
        self.cancelled.store(true, Ordering::SeqCst);

        Ok(())
    }
}
