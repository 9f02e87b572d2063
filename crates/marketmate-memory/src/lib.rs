pub mod file;
pub mod sqlite;

use std::sync::Arc;

use marketmate_core::config::{AppConfig, MemoryBackend};
use marketmate_core::error::Result;
use marketmate_core::traits::SnapshotStore;

pub use file::JsonFileStore;
pub use sqlite::SqliteSnapshotStore;

const MAX_KEY_CHARS: usize = 100;

/// Normalize a subject into a storage key.
///
/// Case and surrounding whitespace never change the key. Characters that are
/// unsafe in file names and runs of whitespace become `_`.
pub fn normalize_key(subject: &str) -> String {
    let mut key = String::with_capacity(subject.len());
    let mut in_space = false;

    for c in subject.trim().to_lowercase().chars() {
        if c.is_whitespace() {
            if !in_space {
                key.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => key.push('_'),
            c => key.push(c),
        }
    }

    let key: String = key.chars().take(MAX_KEY_CHARS).collect();
    if key.is_empty() {
        "_".to_string()
    } else {
        key
    }
}

/// Open the snapshot store selected by `[memory]`.
pub fn open_store(config: &AppConfig) -> Result<Arc<dyn SnapshotStore>> {
    let dir = config.data_dir();
    match config.memory.backend {
        MemoryBackend::File => Ok(Arc::new(JsonFileStore::new(dir))),
        MemoryBackend::Sqlite => Ok(Arc::new(SqliteSnapshotStore::open(
            &dir.join("snapshots.db"),
        )?)),
    }
}
