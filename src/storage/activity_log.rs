use std::{
    future::Future,
    io::{ErrorKind, SeekFrom},
    ops::Deref,
    path::{Path, PathBuf},
};

use anyhow::Result;
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncReadExt, AsyncSeekExt, AsyncWriteExt, BufReader},
    sync::RwLock,
};
use tracing::{debug, warn};

use super::entities::LogRecord;

pub const LOG_FILE_NAME: &str = "activity_log.jsonl";

/// Interface for abstracting storage of finished sessions.
pub trait ActivityLog: Send + Sync {
    /// Appends a record. Returning `Ok` means the record is durable.
    fn append(&self, record: LogRecord) -> impl Future<Output = Result<()>> + Send;

    /// Every record of `owner`, in the order they were appended.
    fn read_all(&self, owner: &str) -> impl Future<Output = Result<Vec<LogRecord>>> + Send;
}

impl<T: Deref + Send + Sync> ActivityLog for T
where
    T::Target: ActivityLog,
{
    fn append(&self, record: LogRecord) -> impl Future<Output = Result<()>> + Send {
        self.deref().append(record)
    }

    fn read_all(&self, owner: &str) -> impl Future<Output = Result<Vec<LogRecord>>> + Send {
        self.deref().read_all(owner)
    }
}

/// The main realization of [ActivityLog]. Keeps one json object per line in a single file.
pub struct JsonLinesLog {
    path: PathBuf,
    // Taken before the file lock. Readers and the writer of this process never wait on each
    // other's file lock, which would block the runtime thread. The file lock covers other
    // processes.
    access: RwLock<()>,
}

impl JsonLinesLog {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            path: dir.join(LOG_FILE_NAME),
            access: RwLock::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append_with_file(file: &mut File, record: &LogRecord) -> Result<()> {
        let mut buffer = Vec::<u8>::new();

        // A crash in the middle of a write can leave a line without its newline. Terminate it so
        // the new record stays readable.
        if !Self::ends_with_newline(file).await? {
            warn!("Log file doesn't end with a new line, previous write was likely cut off");
            buffer.push(b'\n');
        }

        serde_json::to_writer(&mut buffer, record)?;
        buffer.push(b'\n');

        file.write_all(&buffer).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }

    async fn ends_with_newline(file: &mut File) -> Result<bool, std::io::Error> {
        if file.metadata().await?.len() == 0 {
            return Ok(true);
        }
        file.seek(SeekFrom::End(-1)).await?;
        let mut last = [0u8; 1];
        file.read_exact(&mut last).await?;
        Ok(last[0] == b'\n')
    }

    async fn read_inner(&self, owner: &str) -> Result<Vec<LogRecord>, std::io::Error> {
        debug!("Reading {:?} for {owner}", self.path);
        let _guard = self.access.read().await;
        let file = File::open(&self.path).await?;
        file.lock_shared()?;
        let mut lines = BufReader::new(file).lines();
        let mut records = vec![];
        let result = loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break Ok(()),
                Err(e) => break Err(e),
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogRecord>(&line) {
                Ok(record) if record.is_owned_by(owner) => records.push(record),
                Ok(_) => {}
                Err(e) => {
                    // ignore illegal values. Might happen after shutdowns
                    warn!(
                        "During parsing in path {:?} found illegal json string {}:  {e}",
                        self.path, &line
                    )
                }
            }
        };

        lines.into_inner().into_inner().unlock_async().await?;

        result.map(|_| records)
    }
}

impl ActivityLog for JsonLinesLog {
    async fn append(&self, record: LogRecord) -> Result<()> {
        let _guard = self.access.write().await;

        let mut file = File::options()
            .create(true)
            .append(true)
            .read(true)
            .open(&self.path)
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = Self::append_with_file(&mut file, &record).await;
        file.unlock_async().await?;
        debug!("Appended {record:?}");
        result
    }

    async fn read_all(&self, owner: &str) -> Result<Vec<LogRecord>> {
        match self.read_inner(owner).await {
            Ok(records) => Ok(records),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e)?,
        }
    }
}

/// Log that lives only as long as the process. Used for throwaway tracking sessions.
#[derive(Default)]
pub struct MemoryLog {
    records: RwLock<Vec<LogRecord>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActivityLog for MemoryLog {
    async fn append(&self, record: LogRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn read_all(&self, owner: &str) -> Result<Vec<LogRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|v| v.is_owned_by(owner))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, sync::Arc, time::Duration};

    use anyhow::Result;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    use crate::storage::{
        activity_log::{ActivityLog, JsonLinesLog, MemoryLog, LOG_FILE_NAME},
        entities::LogRecord,
    };

    const TEST_DATE: NaiveDate = NaiveDate::from_ymd_opt(2024, 4, 5).unwrap();

    fn records() -> Vec<LogRecord> {
        vec![
            LogRecord::new(TEST_DATE, "STUDY", 300, "alice"),
            LogRecord::new(TEST_DATE, "BREAK", 100, "bob"),
            LogRecord::new(TEST_DATE.succ_opt().unwrap(), "SLEEP", 28_800, "alice"),
        ]
    }

    #[tokio::test]
    async fn test_json_log_keeps_append_order_per_owner() -> Result<()> {
        let dir = tempdir()?;
        let log = JsonLinesLog::new(dir.path().to_owned())?;
        for record in records() {
            log.append(record).await?;
        }

        let alice = log.read_all("alice").await?;
        assert_eq!(alice, vec![records()[0].clone(), records()[2].clone()]);

        let bob = log.read_all("bob").await?;
        assert_eq!(bob, vec![records()[1].clone()]);

        assert!(log.read_all("carol").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_json_log_missing_file_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let log = JsonLinesLog::new(dir.path().join("nested"))?;
        assert!(log.read_all("alice").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_json_log_survives_between_instances() -> Result<()> {
        let dir = tempdir()?;
        {
            let log = JsonLinesLog::new(dir.path().to_owned())?;
            log.append(records()[0].clone()).await?;
        }
        let log = JsonLinesLog::new(dir.path().to_owned())?;
        assert_eq!(log.read_all("alice").await?, vec![records()[0].clone()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_json_log_skips_torn_lines() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(LOG_FILE_NAME);
        {
            let mut file = std::fs::File::create(&path)?;
            writeln!(file, "{}", serde_json::to_string(&records()[0])?)?;
            // simulates a write cut off by a crash
            write!(file, r#"{{"date":"2024-04-05","activ"#)?;
        }

        let log = JsonLinesLog::new(dir.path().to_owned())?;
        log.append(records()[2].clone()).await?;

        let contents = std::fs::read_to_string(&path)?;
        assert_eq!(contents.lines().count(), 3);

        let alice = log.read_all("alice").await?;
        assert_eq!(alice, vec![records()[0].clone(), records()[2].clone()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_json_log_concurrent_appends_stay_whole() -> Result<()> {
        let dir = tempdir()?;
        let log = Arc::new(JsonLinesLog::new(dir.path().to_owned())?);

        let mut handles = vec![];
        for i in 0..16u64 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.append(LogRecord::new(TEST_DATE, "STUDY", i, "alice"))
                    .await
            }));
        }
        for handle in handles {
            handle.await??;
        }

        let stored = log.read_all("alice").await?;
        assert_eq!(stored.len(), 16);
        let mut seconds = stored.iter().map(|v| v.duration_seconds).collect::<Vec<_>>();
        seconds.sort();
        assert_eq!(seconds, (0..16).collect::<Vec<_>>());
        Ok(())
    }

    #[tokio::test]
    async fn test_json_log_read_overlapping_append() -> Result<()> {
        let dir = tempdir()?;
        let log = JsonLinesLog::new(dir.path().to_owned())?;
        for i in 0..2000u64 {
            log.append(LogRecord::new(TEST_DATE, "STUDY", i, "alice"))
                .await?;
        }

        // Both run on the single test runtime thread.
        let (read, appended) = tokio::time::timeout(Duration::from_secs(30), async {
            tokio::join!(
                log.read_all("alice"),
                log.append(LogRecord::new(TEST_DATE, "BREAK", 5, "alice"))
            )
        })
        .await?;
        appended?;
        // The read sees the log either before or after the append, never half of it.
        let read = read?.len();
        assert!(read == 2000 || read == 2001);

        assert_eq!(log.read_all("alice").await?.len(), 2001);
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_log_filters_by_owner() -> Result<()> {
        let log = MemoryLog::new();
        for record in records() {
            log.append(record).await?;
        }
        assert_eq!(log.read_all("alice").await?.len(), 2);
        assert_eq!(log.read_all("bob").await?.len(), 1);
        Ok(())
    }
}
