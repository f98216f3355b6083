use super::snapshot::{parse_snapshot, render_snapshot};
use super::stats::{Statistics, recompute};
use crate::kv::KeyValueStore;
use chrono::{DateTime, Utc};
use rllm_types::{
    CommandDraft, CommandEntry, EntryId, RllmError, RllmResult, clamp_confidence,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Append-only, insertion-ordered log of command entries.
///
/// Every mutation writes the full snapshot back to the key-value store.
/// A failed write is logged and leaves the in-memory log untouched.
pub struct HistoryStore {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    entries: Vec<CommandEntry>,
    next_id: EntryId,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("key", &self.key)
            .field("entries", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

impl HistoryStore {
    /// Empty store; nothing is read from `kv`.
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
            entries: Vec::new(),
            next_id: EntryId(1),
        }
    }

    /// Load the snapshot stored under `key`, if any.
    pub fn open(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> RllmResult<Self> {
        let mut store = Self::new(kv, key);
        let raw = store
            .kv
            .get(&store.key)
            .map_err(|e| RllmError::Storage(format!("{:#}", e)))?;
        if let Some(raw) = raw {
            let entries = parse_snapshot(&raw)?;
            store.load_entries(entries)?;
            debug!("loaded {} history entries", store.entries.len());
        }
        Ok(store)
    }

    /// Like [`HistoryStore::open`], but an invalid snapshot is moved aside to
    /// `<key>_invalid` and an empty history is started instead.
    pub fn open_or_reset(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> RllmResult<Self> {
        let key = key.into();
        match Self::open(kv.clone(), key.clone()) {
            Err(RllmError::Validation(reason)) => {
                warn!("discarding invalid history snapshot: {}", reason);
                if let Ok(Some(raw)) = kv.get(&key)
                    && let Err(e) = kv.set(&format!("{}_invalid", key), &raw)
                {
                    warn!("failed to back up invalid snapshot: {:?}", e);
                }
                Ok(Self::new(kv, key))
            }
            other => other,
        }
    }

    pub fn append(&mut self, draft: CommandDraft) -> RllmResult<CommandEntry> {
        self.append_at(draft, Utc::now())
    }

    /// Append with an explicit creation time.
    pub fn append_at(
        &mut self,
        mut draft: CommandDraft,
        timestamp: DateTime<Utc>,
    ) -> RllmResult<CommandEntry> {
        if draft.prompt.trim().is_empty() {
            return Err(RllmError::Validation("prompt must not be empty".to_string()));
        }
        if draft.command.trim().is_empty() {
            return Err(RllmError::Validation("command must not be empty".to_string()));
        }
        draft.confidence = draft.confidence.map(clamp_confidence);

        let id = self.next_id;
        self.next_id = id
            .next()
            .ok_or_else(|| RllmError::Storage("history id space exhausted".to_string()))?;
        let entry = CommandEntry::from_draft(id, draft, timestamp);
        self.entries.push(entry.clone());
        info!("appended history entry {} ({})", id, entry.risk_level);
        self.persist();
        Ok(entry)
    }

    /// Set `executed` on the entry. Repeated calls return the entry unchanged.
    pub fn mark_executed(&mut self, id: EntryId) -> RllmResult<CommandEntry> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(RllmError::NotFound(id))?;
        if entry.executed {
            return Ok(entry.clone());
        }
        entry.executed = true;
        let entry = entry.clone();
        debug!("marked entry {} executed", id);
        self.persist();
        Ok(entry)
    }

    /// Drop every entry. Ids keep counting from where they were.
    pub fn clear(&mut self) {
        let removed = self.entries.len();
        self.entries.clear();
        if let Err(e) = self.kv.remove(&self.key) {
            warn!("failed to remove persisted history: {:?}", e);
        }
        info!("cleared {} history entries", removed);
    }

    /// Replace the log with a validated snapshot; nothing changes on error.
    pub fn restore(&mut self, json: &str) -> RllmResult<()> {
        let entries = parse_snapshot(json)?;
        self.load_entries(entries)?;
        info!("restored {} history entries", self.entries.len());
        self.persist();
        Ok(())
    }

    fn load_entries(&mut self, entries: Vec<CommandEntry>) -> RllmResult<()> {
        if let Some(last) = entries.last() {
            let after_last = last.id.next().ok_or_else(|| {
                RllmError::Validation(format!("id {} leaves no room for new entries", last.id))
            })?;
            self.next_id = self.next_id.max(after_last);
        }
        self.entries = entries;
        Ok(())
    }

    pub fn snapshot_json(&self) -> RllmResult<String> {
        render_snapshot(&self.entries)
    }

    fn persist(&self) {
        let result = render_snapshot(&self.entries)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.kv.set(&self.key, &json));
        if let Err(e) = result {
            warn!("failed to persist history: {:?}", e);
        }
    }

    pub fn entries(&self) -> &[CommandEntry] {
        &self.entries
    }

    pub fn get(&self, id: EntryId) -> Option<&CommandEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn statistics(&self) -> Statistics {
        recompute(&self.entries)
    }

    /// Case-insensitive substring match over prompt and command.
    pub fn search(&self, query: &str) -> Vec<CommandEntry> {
        let needle = query.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|e| {
                needle.is_empty()
                    || e.prompt.to_lowercase().contains(&needle)
                    || e.command.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect()
    }

    /// The last `limit` commands, newest last.
    pub fn recent_commands(&self, limit: usize) -> Vec<String> {
        let start = self.entries.len().saturating_sub(limit);
        self.entries[start..]
            .iter()
            .map(|e| e.command.clone())
            .collect()
    }
}
