//! This module provides a local cache for planner data

use std::collections::BTreeMap;
use std::error::Error;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::index::TaskIndex;
use crate::task::{DateKey, Task};


/// The last known tasks of every day, stored in a local file
#[derive(Debug, PartialEq)]
pub struct Cache {
    backing_file: PathBuf,
    data: CachedData,
}

#[derive(Default, Debug, PartialEq, Serialize, Deserialize)]
struct CachedData {
    buckets: BTreeMap<DateKey, Vec<Task>>,
    last_sync: Option<DateTime<Utc>>,
}

impl Cache {
    /// Initialize a cache from the content of a valid backing file if it exists.
    /// Returns an error otherwise
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn Error>> {
        let data: CachedData = match std::fs::File::open(path) {
            Err(err) => {
                return Err(format!("Unable to open file {:?}: {}", path, err).into());
            },
            Ok(file) => serde_json::from_reader(file)?,
        };

        // Refuse files that break the index invariants
        TaskIndex::from_buckets(data.buckets.clone())?;

        Ok(Self{
            backing_file: PathBuf::from(path),
            data,
        })
    }

    /// Initialize a cache with the default contents
    pub fn new(path: &Path) -> Self {
        Self{
            backing_file: PathBuf::from(path),
            data: CachedData::default(),
        }
    }

    /// Store the current Cache to its backing file
    pub fn save_to_file(&self) -> Result<(), Box<dyn Error>> {
        let path = &self.backing_file;
        let file = std::fs::File::create(path)
            .map_err(|err| format!("Unable to save file {:?}: {}", path, err))?;
        serde_json::to_writer(file, &self.data)?;
        log::debug!("Cache saved to {:?}", path);
        Ok(())
    }

    /// Replace the cached content with the current content of an index
    pub fn store(&mut self, index: &TaskIndex) {
        self.data.buckets = index.buckets().clone();
    }

    /// Build an index from the cached content
    pub fn to_index(&self) -> TaskIndex {
        match TaskIndex::from_buckets(self.data.buckets.clone()) {
            Ok(index) => index,
            Err(err) => {
                // Content is validated when loaded or stored, so this is not supposed to happen
                log::warn!("Invalid cache content ({}). Using an empty index", err);
                TaskIndex::new()
            },
        }
    }

    /// Returns the last time the cached content was fetched from the server
    /// (or None in case it has never been)
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.data.last_sync
    }

    /// Update the last sync timestamp to now, or to a custom time in case `timepoint` is `Some`
    pub fn update_last_sync(&mut self, timepoint: Option<DateTime<Utc>>) {
        self.data.last_sync = Some(timepoint.unwrap_or_else(Utc::now));
    }

    pub fn backing_file(&self) -> &Path {
        &self.backing_file
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{parse_date_key, TaskId};

    #[test]
    fn serde_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("cache.json");

        let mut index = TaskIndex::new();
        index.add(parse_date_key("2024-05-01").unwrap(), Task::new(TaskId::from("1"), "Write report".to_string(), true)).unwrap();
        index.add(parse_date_key("2024-05-03").unwrap(), Task::new(TaskId::from("2"), "Call Bob".to_string(), false)).unwrap();

        let mut cache = Cache::new(&cache_path);
        cache.store(&index);
        cache.update_last_sync(None);
        cache.save_to_file().unwrap();

        let retrieved_cache = Cache::from_file(&cache_path).unwrap();
        assert_eq!(cache, retrieved_cache);
        assert_eq!(retrieved_cache.to_index(), index);
        assert!(retrieved_cache.last_sync().is_some());
    }

    #[test]
    fn invalid_cache_files_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("cache.json");

        assert!(Cache::from_file(&cache_path).is_err());

        std::fs::write(&cache_path, r#"{
            "buckets": {
                "2024-05-01": [{"id": "1", "content": "a", "isUrgent": false}],
                "2024-05-02": [{"id": "1", "content": "a", "isUrgent": false}]
            },
            "last_sync": null
        }"#).unwrap();
        assert!(Cache::from_file(&cache_path).is_err());

        std::fs::write(&cache_path, "not json").unwrap();
        assert!(Cache::from_file(&cache_path).is_err());
    }

    #[test]
    fn empty_buckets_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let cache_path = dir.path().join("cache.json");
        std::fs::write(&cache_path, r#"{"buckets": {"2024-05-01": []}, "last_sync": null}"#).unwrap();

        let cache = Cache::from_file(&cache_path).unwrap();
        assert!(cache.to_index().is_empty());
    }
}
