//! 会话状态存储抽象层
//!
//! 每个会话持久化一份 DialogStackState；支持内存和文件两种实现。
//! 两种实现都以 JSON 文本保存，保证每回合之间状态都经过一次序列化往返。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::StorageSection;
use crate::core::StorageError;
use crate::dialog::DialogStackState;

/// 会话状态存储接口
#[async_trait]
pub trait StateStore: Send + Sync {
    /// 读取会话的对话栈，不存在时返回 None
    async fn load(&self, conversation_id: &str) -> Result<Option<DialogStackState>, StorageError>;

    /// 写入会话的对话栈
    async fn save(&self, conversation_id: &str, state: &DialogStackState) -> Result<(), StorageError>;

    /// 删除会话状态（不存在时不报错）
    async fn delete(&self, conversation_id: &str) -> Result<(), StorageError>;
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStateStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<DialogStackState>, StorageError> {
        match self.entries.read().await.get(conversation_id) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, conversation_id: &str, state: &DialogStackState) -> Result<(), StorageError> {
        let json = serde_json::to_string(state)?;
        self.entries.write().await.insert(conversation_id.to_string(), json);
        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), StorageError> {
        self.entries.write().await.remove(conversation_id);
        Ok(())
    }
}

/// 文件存储：目录下每个会话一个 JSON 文件
#[derive(Debug)]
pub struct FileStateStore {
    directory: PathBuf,
}

impl FileStateStore {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    /// 会话 id 百分号编码后作为文件名，不同 id 不会落到同一文件
    fn path_for(&self, conversation_id: &str) -> PathBuf {
        let name = urlencoding::encode(conversation_id);
        self.directory.join(format!("{name}.json"))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, conversation_id: &str) -> Result<Option<DialogStackState>, StorageError> {
        let path = self.path_for(conversation_id);
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, conversation_id: &str, state: &DialogStackState) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.directory).await?;
        let data = serde_json::to_string_pretty(state)?;
        tokio::fs::write(self.path_for(conversation_id), data).await?;
        Ok(())
    }

    async fn delete(&self, conversation_id: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(conversation_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// 根据 [storage] 配置创建存储：file 使用目录（默认 ./data/conversations），其余使用内存
pub fn create_state_store(section: &StorageSection) -> Arc<dyn StateStore> {
    if section.backend == "file" {
        let directory = section
            .directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("data/conversations"));
        tracing::info!("Using file state store: {:?}", directory);
        return Arc::new(FileStateStore::new(directory));
    }
    if section.backend != "memory" {
        tracing::warn!("Unknown storage backend '{}', using memory store", section.backend);
    }
    tracing::info!("Using in-memory state store");
    Arc::new(MemoryStateStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::DialogInstance;
    use serde_json::json;

    fn sample_state() -> DialogStackState {
        let mut root = DialogInstance::new("RootDialog");
        root.state = json!({
            "activeSequenceKey": "intent:Foo",
            "stepIndex": 1,
            "options": {},
            "values": { "token": "abc" }
        });
        DialogStackState {
            stack: vec![root, DialogInstance::new("ConfirmationDialog")],
        }
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStateStore::new();
        assert!(store.load("c1").await.unwrap().is_none());

        store.save("c1", &sample_state()).await.unwrap();
        assert_eq!(store.load("c1").await.unwrap(), Some(sample_state()));

        store.delete("c1").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("conversations"));

        assert!(store.load("msteams:19/abc").await.unwrap().is_none());
        store.save("msteams:19/abc", &sample_state()).await.unwrap();
        assert_eq!(store.load("msteams:19/abc").await.unwrap(), Some(sample_state()));

        store.delete("msteams:19/abc").await.unwrap();
        store.delete("msteams:19/abc").await.unwrap();
        assert!(store.load("msteams:19/abc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_keeps_similar_ids_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        store.save("19:abc@thread", &sample_state()).await.unwrap();
        assert!(store.load("19_abc_thread").await.unwrap().is_none());
        assert!(store.load("19%3Aabc%40thread").await.unwrap().is_none());

        let other = DialogStackState {
            stack: vec![DialogInstance::new("Other")],
        };
        store.save("19_abc_thread", &other).await.unwrap();
        assert_eq!(store.load("19:abc@thread").await.unwrap(), Some(sample_state()));
        assert_eq!(store.load("19_abc_thread").await.unwrap(), Some(other));
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        std::fs::write(dir.path().join("c1.json"), "{not json").unwrap();

        assert!(matches!(store.load("c1").await, Err(StorageError::Serde(_))));
    }
}
