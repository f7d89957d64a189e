//! Durable subscription collection

use std::hash::Hash;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use tokio::sync::Mutex;
use url::Url;

use mg_core::error::StoreError;
use mg_core::time::current_time_millis;
use mg_core::{Subscription, SubscriptionId};

use super::Fetcher;

const METADATA_FILE: &str = "subscription.toml";

/// A subscription with its cached payload
#[derive(Debug, Clone)]
struct Entry {
    subscription: Subscription,
    payload: Bytes,
}

/// Owns every subscription and its cached payload
///
/// Each subscription lives in `<root>/<id>/` as `subscription.toml` plus the
/// payload file. Files are replaced via temp file + rename and map entries are
/// swapped whole, so readers never observe a half-applied update.
pub struct SubscriptionStore {
    root: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    entries: DashMap<SubscriptionId, Entry>,
    /// Sources with a download in flight
    downloads: Arc<DashSet<String>>,
    /// Ids with an update in flight
    updates: Arc<DashSet<SubscriptionId>>,
    /// Serializes file writes with the matching entry swap
    writes: Mutex<()>,
}

impl SubscriptionStore {
    /// Open the store at `root`, loading every readable subscription
    pub async fn open(root: impl Into<PathBuf>, fetcher: Arc<dyn Fetcher>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        let entries = DashMap::new();
        let mut dir = tokio::fs::read_dir(&root).await?;
        while let Some(item) = dir.next_entry().await? {
            if !item.file_type().await?.is_dir() {
                continue;
            }
            let path = item.path();
            match load_entry(&path).await {
                Ok(entry) => {
                    entries.insert(entry.subscription.id.clone(), entry);
                }
                Err(e) => tracing::warn!("Skipping unreadable subscription {:?}: {}", path, e),
            }
        }

        tracing::info!("Loaded {} subscriptions from {:?}", entries.len(), root);
        Ok(Self {
            root,
            fetcher,
            entries,
            downloads: Arc::new(DashSet::new()),
            updates: Arc::new(DashSet::new()),
            writes: Mutex::new(()),
        })
    }

    /// Fetch a new subscription from `source` and add it
    pub async fn download(&self, source: &str) -> Result<Subscription, StoreError> {
        let url = parse_source(source)?;
        let _guard = InFlight::acquire(&self.downloads, url.as_str().to_string())
            .ok_or_else(|| StoreError::AlreadyInProgress(url.to_string()))?;

        let payload = self.fetcher.fetch(&url).await?;
        let subscription = Subscription::new(url, current_time_millis());
        self.persist(&subscription, &payload).await?;

        tracing::info!(
            "Added subscription {} ({}) from {}",
            subscription.alias,
            subscription.id,
            subscription.source
        );
        self.entries.insert(
            subscription.id.clone(),
            Entry {
                subscription: subscription.clone(),
                payload,
            },
        );
        Ok(subscription)
    }

    /// Re-fetch the payload of an existing subscription
    ///
    /// On failure the previous payload and timestamp are kept.
    pub async fn update(&self, id: &SubscriptionId) -> Result<Subscription, StoreError> {
        let _guard = InFlight::acquire(&self.updates, id.clone())
            .ok_or_else(|| StoreError::AlreadyInProgress(id.to_string()))?;

        let source = self
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?
            .source;
        let payload = self.fetcher.fetch(&source).await?;

        let _writing = self.writes.lock().await;
        let mut subscription = self.get(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        subscription.updated_at = current_time_millis();
        self.persist(&subscription, &payload).await?;

        let swapped = self.entries.get_mut(id).map(|mut entry| {
            entry.subscription.updated_at = subscription.updated_at;
            entry.payload = payload;
            entry.subscription.clone()
        });
        subscription = match swapped {
            Some(subscription) => subscription,
            None => {
                // Deleted while the files were being written
                self.remove_dir(id).await;
                return Err(StoreError::NotFound(id.clone()));
            }
        };

        tracing::info!("Updated subscription {} ({})", subscription.alias, id);
        Ok(subscription)
    }

    /// Change the display name; the new name is trimmed first
    pub async fn rename(&self, id: &SubscriptionId, name: &str) -> Result<Subscription, StoreError> {
        let name = name.trim();
        let _writing = self.writes.lock().await;
        let mut subscription = self.get(id).ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if name.is_empty() || name == subscription.alias {
            return Err(StoreError::NoOpRename);
        }

        subscription.alias = name.to_string();
        write_metadata(&self.dir_of(id), &subscription).await?;

        let mut entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        entry.subscription.alias = subscription.alias.clone();

        tracing::info!("Renamed subscription {} to {}", id, name);
        Ok(entry.subscription.clone())
    }

    /// Remove a subscription and its files
    pub async fn delete(&self, id: &SubscriptionId) -> Result<Subscription, StoreError> {
        let _writing = self.writes.lock().await;
        let (_, entry) = self
            .entries
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        self.remove_dir(id).await;

        tracing::info!("Deleted subscription {} ({})", entry.subscription.alias, id);
        Ok(entry.subscription)
    }

    /// Look up a subscription by id
    pub fn get(&self, id: &SubscriptionId) -> Option<Subscription> {
        self.entries.get(id).map(|e| e.subscription.clone())
    }

    /// All subscriptions ordered by alias
    pub fn list(&self) -> Vec<Subscription> {
        let mut subscriptions: Vec<_> = self
            .entries
            .iter()
            .map(|e| e.subscription.clone())
            .collect();
        subscriptions.sort_by(|a, b| a.alias.cmp(&b.alias).then_with(|| a.id.as_str().cmp(b.id.as_str())));
        subscriptions
    }

    /// Cached payload of a subscription
    pub fn payload(&self, id: &SubscriptionId) -> Option<Bytes> {
        self.entries.get(id).map(|e| e.payload.clone())
    }

    /// Path of the cached payload file
    pub fn payload_path(&self, id: &SubscriptionId) -> Option<PathBuf> {
        self.entries
            .get(id)
            .map(|e| self.dir_of(id).join(e.subscription.payload_file_name()))
    }

    /// Number of subscriptions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir_of(&self, id: &SubscriptionId) -> PathBuf {
        self.root.join(id.as_str())
    }

    async fn persist(&self, subscription: &Subscription, payload: &[u8]) -> Result<(), StoreError> {
        let dir = self.dir_of(&subscription.id);
        tokio::fs::create_dir_all(&dir).await?;
        write_atomic(&dir.join(subscription.payload_file_name()), payload).await?;
        write_metadata(&dir, subscription).await
    }

    async fn remove_dir(&self, id: &SubscriptionId) {
        match tokio::fs::remove_dir_all(self.dir_of(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove files of {}: {}", id, e),
        }
    }
}

/// Marks a key as in flight until dropped
struct InFlight<K: Eq + Hash + Clone> {
    set: Arc<DashSet<K>>,
    key: K,
}

impl<K: Eq + Hash + Clone> InFlight<K> {
    /// `None` if the key is already in flight
    fn acquire(set: &Arc<DashSet<K>>, key: K) -> Option<Self> {
        if !set.insert(key.clone()) {
            return None;
        }
        Some(Self {
            set: Arc::clone(set),
            key,
        })
    }
}

impl<K: Eq + Hash + Clone> Drop for InFlight<K> {
    fn drop(&mut self) {
        self.set.remove(&self.key);
    }
}

fn parse_source(source: &str) -> Result<Url, StoreError> {
    let url = Url::parse(source.trim())
        .map_err(|e| StoreError::InvalidSource(format!("{}: {}", source, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(StoreError::InvalidSource(format!(
            "{}: only http and https sources are supported",
            source
        ))),
    }
}

async fn load_entry(dir: &Path) -> Result<Entry, StoreError> {
    let text = tokio::fs::read_to_string(dir.join(METADATA_FILE)).await?;
    let subscription: Subscription =
        toml::from_str(&text).map_err(|e| StoreError::Metadata(e.to_string()))?;
    let payload = tokio::fs::read(dir.join(subscription.payload_file_name())).await?;
    Ok(Entry {
        subscription,
        payload: Bytes::from(payload),
    })
}

async fn write_metadata(dir: &Path, subscription: &Subscription) -> Result<(), StoreError> {
    let text = toml::to_string_pretty(subscription).map_err(|e| StoreError::Metadata(e.to_string()))?;
    write_atomic(&dir.join(METADATA_FILE), text.as_bytes()).await?;
    Ok(())
}

async fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}
