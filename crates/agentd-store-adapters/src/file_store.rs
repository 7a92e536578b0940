use agentd_contract::{
    InputMessage, Message, RecordStore, Run, RunConfig, RunPatch, StoreError, Thread,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

const THREADS_DIR: &str = "threads";
const RUNS_DIR: &str = "runs";

/// Single-process file store.
///
/// Layout: `<dataDir>/threads/<thread_id>.json` and
/// `<dataDir>/runs/<run_id>.json`, each a UTF-8 JSON document. Writes go
/// through a sibling temp file followed by a rename, so readers never see a
/// torn document. Thread appends serialize through a store-wide mutex;
/// run updates target a single run id whose writers are already ordered by
/// the runtime.
pub struct FileStore {
    base_path: PathBuf,
    append_lock: Mutex<()>,
}

impl FileStore {
    /// Create a file store rooted at the given data directory.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn thread_path(&self, thread_id: &str) -> Result<PathBuf, StoreError> {
        Self::validate_record_id(thread_id)?;
        Ok(self
            .base_path
            .join(THREADS_DIR)
            .join(format!("{thread_id}.json")))
    }

    fn run_path(&self, run_id: &str) -> Result<PathBuf, StoreError> {
        Self::validate_record_id(run_id)?;
        Ok(self.base_path.join(RUNS_DIR).join(format!("{run_id}.json")))
    }

    /// Validate that a record id is safe to join onto the base directory.
    /// Rejects empty ids, path separators, `..`, and control characters, so
    /// the resolved path cannot escape the base.
    fn validate_record_id(id: &str) -> Result<(), StoreError> {
        if id.is_empty() {
            return Err(StoreError::InvalidId("id cannot be empty".to_string()));
        }
        if id.contains('/') || id.contains('\\') || id.contains("..") || id.contains('\0') {
            return Err(StoreError::InvalidId(format!(
                "id contains invalid characters: {id:?}"
            )));
        }
        if id.chars().any(|c| c.is_control()) {
            return Err(StoreError::InvalidId(format!(
                "id contains control characters: {id:?}"
            )));
        }
        Ok(())
    }

    /// Read a record, mapping a missing file to `None` rather than I/O error.
    async fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Serialize to a sibling `<target>.<uuid>.tmp` file, then rename over
    /// the target.
    async fn write_record<T: Serialize>(path: &Path, record: &T) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(format!(".{}.tmp", uuid::Uuid::now_v7().simple()));
        let tmp_path = PathBuf::from(tmp_name);

        let write_result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(content.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, path).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::Io(e));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FileStore {
    async fn init(&self) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(self.base_path.join(THREADS_DIR)).await?;
        tokio::fs::create_dir_all(self.base_path.join(RUNS_DIR)).await?;
        Ok(())
    }

    async fn create_thread(
        &self,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Thread, StoreError> {
        let thread = Thread::new(metadata);
        let path = self.thread_path(&thread.id)?;
        Self::write_record(&path, &thread).await?;
        Ok(thread)
    }

    async fn get_thread(&self, thread_id: &str) -> Result<Thread, StoreError> {
        let path = self.thread_path(thread_id)?;
        Self::read_record(&path)
            .await?
            .ok_or_else(|| StoreError::ThreadNotFound(thread_id.to_string()))
    }

    async fn append_messages(
        &self,
        thread_id: &str,
        messages: Vec<Message>,
    ) -> Result<(), StoreError> {
        let path = self.thread_path(thread_id)?;
        let _guard = self.append_lock.lock().await;
        let mut thread: Thread = Self::read_record(&path)
            .await?
            .ok_or_else(|| StoreError::ThreadNotFound(thread_id.to_string()))?;
        thread.messages.extend(messages);
        Self::write_record(&path, &thread).await
    }

    async fn create_run(
        &self,
        input: Vec<InputMessage>,
        thread_id: Option<String>,
        config: Option<RunConfig>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<Run, StoreError> {
        let run = Run::new(input, thread_id, config, metadata);
        let path = self.run_path(&run.id)?;
        Self::write_record(&path, &run).await?;
        Ok(run)
    }

    async fn get_run(&self, run_id: &str) -> Result<Run, StoreError> {
        let path = self.run_path(run_id)?;
        Self::read_record(&path)
            .await?
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))
    }

    async fn update_run(&self, run_id: &str, patch: RunPatch) -> Result<Run, StoreError> {
        let path = self.run_path(run_id)?;
        let mut run: Run = Self::read_record(&path)
            .await?
            .ok_or_else(|| StoreError::RunNotFound(run_id.to_string()))?;
        patch.apply_to(&mut run);
        Self::write_record(&path, &run).await?;
        Ok(run)
    }
}
