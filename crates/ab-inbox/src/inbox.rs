use std::sync::{Arc, Mutex, MutexGuard};

use ab_core::clock::{Clock, SystemClock};
use ab_core::types::{
    Insight, Message, MessageId, DEFAULT_AGENT_ID, DEFAULT_STATUS,
};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::storage::{KeyValueStore, StorageError};

pub const DEFAULT_MESSAGES_KEY: &str = "agent_inbox_messages";
pub const DEFAULT_COUNTER_KEY: &str = "agent_inbox_id_counter";

// ---------------------------------------------------------------------------
// Inputs / outputs
// ---------------------------------------------------------------------------

/// What can be added to the inbox: a raw insight to convert, or a message
/// that was already persisted somewhere and is stored as-is.
#[derive(Debug, Clone)]
pub enum InboxEntry {
    Insight(Insight),
    Message(Message),
}

impl From<Insight> for InboxEntry {
    fn from(insight: Insight) -> Self {
        InboxEntry::Insight(insight)
    }
}

impl From<Message> for InboxEntry {
    fn from(message: Message) -> Self {
        InboxEntry::Message(message)
    }
}

impl InboxEntry {
    fn title(&self) -> &str {
        match self {
            InboxEntry::Insight(i) => &i.title,
            InboxEntry::Message(m) => &m.title,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddOutcome {
    Inserted(Message),
    /// A message with the same `(title, agent_id)` was already stored; it is
    /// returned untouched.
    Existing(Message),
}

impl AddOutcome {
    pub fn message(&self) -> &Message {
        match self {
            AddOutcome::Inserted(m) | AddOutcome::Existing(m) => m,
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            AddOutcome::Inserted(m) | AddOutcome::Existing(m) => m,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, AddOutcome::Inserted(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub unread_only: bool,
    pub category: Option<String>,
    pub agent_id: Option<String>,
}

impl MessageFilter {
    pub fn unread() -> Self {
        Self {
            unread_only: true,
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    fn matches(&self, m: &Message) -> bool {
        (!self.unread_only || !m.read)
            && self.category.as_deref().is_none_or(|c| m.category == c)
            && self.agent_id.as_deref().is_none_or(|a| m.agent_id == a)
    }
}

/// Names of the two backing-store keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxKeys {
    pub messages: String,
    pub counter: String,
}

impl Default for InboxKeys {
    fn default() -> Self {
        Self {
            messages: DEFAULT_MESSAGES_KEY.to_string(),
            counter: DEFAULT_COUNTER_KEY.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

fn icon_for(kind: &str) -> &'static str {
    match kind {
        "alert" => "alert-triangle",
        "opportunity" => "trending-up",
        "report" => "file-text",
        _ => "lightbulb",
    }
}

/// Build an inbox message from an insight, filling gaps with defaults.
pub fn message_from_insight(
    insight: &Insight,
    id: MessageId,
    agent_id: &str,
    now: DateTime<Utc>,
) -> Message {
    let category = insight.category_or_default().to_string();
    let kind = insight.kind_or_default().to_string();

    let mut tags = vec![category.clone(), kind.clone()];
    if !insight.source.is_empty() {
        tags.push(insight.source.clone());
    }
    if let Some(severity) = insight.severity {
        tags.push(severity.as_str().to_string());
    }
    tags.dedup();

    Message {
        id,
        title: insight.title.clone(),
        icon: icon_for(&kind).to_string(),
        category,
        kind,
        status: insight
            .metadata
            .status
            .clone()
            .unwrap_or_else(|| DEFAULT_STATUS.to_string()),
        date: insight
            .metadata
            .date
            .clone()
            .unwrap_or_else(|| now.format("%Y-%m-%d").to_string()),
        countdown_days: insight.metadata.countdown,
        author: insight.metadata.author.clone(),
        tags,
        read: false,
        insight_data: Some(insight.clone()),
        agent_id: agent_id.to_string(),
        created_at: now,
    }
}

// ---------------------------------------------------------------------------
// InboxStore
// ---------------------------------------------------------------------------

/// Ordered, deduplicated message collection persisted in a [`KeyValueStore`].
///
/// The backing store is authoritative: every read reloads it and every
/// mutation writes the full collection back before returning. Storage
/// failures are logged and absorbed; a failed read yields an empty inbox
/// and a failed write leaves the in-memory copy ahead of the stored one.
pub struct InboxStore {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    keys: InboxKeys,
    cache: Mutex<Vec<Message>>,
}

impl InboxStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_parts(storage, Arc::new(SystemClock), InboxKeys::default())
    }

    pub fn with_parts(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        keys: InboxKeys,
    ) -> Self {
        Self {
            storage,
            clock,
            keys,
            cache: Mutex::new(Vec::new()),
        }
    }

    pub fn keys(&self) -> &InboxKeys {
        &self.keys
    }

    /// Add an insight (converted) or a persisted message (as-is).
    ///
    /// `agent_id` overrides the agent named by the entry. Duplicate
    /// `(title, agent_id)` pairs return the stored message unchanged.
    pub fn add(&self, entry: impl Into<InboxEntry>, agent_id: Option<&str>) -> AddOutcome {
        let entry = entry.into();
        let agent = match (&entry, agent_id) {
            (_, Some(a)) => a.to_string(),
            (InboxEntry::Insight(i), None) => i
                .agent_id
                .clone()
                .unwrap_or_else(|| DEFAULT_AGENT_ID.to_string()),
            (InboxEntry::Message(m), None) => m.agent_id.clone(),
        };

        let mut cache = self.refresh();

        if let Some(existing) = cache
            .iter()
            .find(|m| m.title == entry.title() && m.agent_id == agent)
        {
            debug!(
                message_id = existing.id,
                title = %existing.title,
                agent_id = %agent,
                "duplicate message suppressed"
            );
            return AddOutcome::Existing(existing.clone());
        }

        let message = match entry {
            InboxEntry::Insight(insight) => {
                let id = self.next_id(&cache);
                message_from_insight(&insight, id, &agent, self.clock.now())
            }
            InboxEntry::Message(mut message) => {
                message.agent_id = agent;
                if cache.iter().any(|m| m.id == message.id) {
                    let fresh = self.next_id(&cache);
                    debug!(
                        imported_id = message.id,
                        message_id = fresh,
                        "imported message id already in use, reassigned"
                    );
                    message.id = fresh;
                } else {
                    self.reserve_id(message.id);
                }
                message
            }
        };

        // Stored newest first; ties go ahead of existing entries.
        let at = cache.partition_point(|m| m.created_at > message.created_at);
        cache.insert(at, message.clone());
        self.persist(&cache);
        info!(
            message_id = message.id,
            title = %message.title,
            agent_id = %message.agent_id,
            "message added to inbox"
        );
        AddOutcome::Inserted(message)
    }

    /// Add and return the resulting message, inserted or pre-existing.
    pub fn add_message(&self, entry: impl Into<InboxEntry>, agent_id: Option<&str>) -> Message {
        self.add(entry, agent_id).into_message()
    }

    /// Messages matching `filter`, newest `created_at` first.
    pub fn messages(&self, filter: &MessageFilter) -> Vec<Message> {
        let cache = self.refresh();
        let mut out: Vec<Message> = cache.iter().filter(|m| filter.matches(m)).cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    pub fn all_messages(&self) -> Vec<Message> {
        self.messages(&MessageFilter::default())
    }

    /// Mark one message read. Returns `false` when no such message exists.
    pub fn mark_as_read(&self, id: MessageId) -> bool {
        let mut cache = self.refresh();
        let found = match cache.iter_mut().find(|m| m.id == id) {
            Some(m) => {
                m.read = true;
                true
            }
            None => false,
        };
        if found {
            self.persist(&cache);
        }
        found
    }

    pub fn mark_all_as_read(&self) {
        let mut cache = self.refresh();
        for m in cache.iter_mut() {
            m.read = true;
        }
        self.persist(&cache);
    }

    pub fn unread_count(&self) -> usize {
        self.refresh().iter().filter(|m| !m.read).count()
    }

    /// Remove one message. Returns `true` if it existed.
    pub fn delete_message(&self, id: MessageId) -> bool {
        let mut cache = self.refresh();
        let before = cache.len();
        cache.retain(|m| m.id != id);
        if cache.len() == before {
            return false;
        }
        self.persist(&cache);
        true
    }

    /// Remove every message and reset the id counter so the next minted id is 1.
    pub fn clear_inbox(&self) {
        let mut cache = self.lock();
        cache.clear();
        self.persist(&cache);
        if let Err(e) = self.storage.set(&self.keys.counter, "0") {
            error!(error = %e, key = %self.keys.counter, "failed to reset inbox id counter");
        }
        info!("inbox cleared");
    }

    // -- internals ----------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the in-memory copy with a fresh read of the backing store.
    fn refresh(&self) -> MutexGuard<'_, Vec<Message>> {
        let mut cache = self.lock();
        *cache = match self.load() {
            Ok(messages) => messages,
            Err(e) => {
                error!(error = %e, key = %self.keys.messages, "failed to load inbox, using empty inbox");
                Vec::new()
            }
        };
        cache
    }

    fn load(&self) -> Result<Vec<Message>, StorageError> {
        match self.storage.get(&self.keys.messages)? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    fn persist(&self, messages: &[Message]) {
        let result = serde_json::to_string(messages)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.set(&self.keys.messages, &json));
        if let Err(e) = result {
            error!(
                error = %e,
                key = %self.keys.messages,
                count = messages.len(),
                "failed to persist inbox"
            );
        }
    }

    /// Mint the next message id. Never returns an id already in use, even
    /// if the counter key was lost while messages survived.
    fn next_id(&self, existing: &[Message]) -> MessageId {
        let highest = existing.iter().map(|m| m.id).max().unwrap_or(0);
        let id = self.stored_counter().max(highest) + 1;
        self.store_counter(id);
        id
    }

    /// Move the counter up to `id` so later mints never hand it out.
    fn reserve_id(&self, id: MessageId) {
        if id > self.stored_counter() {
            self.store_counter(id);
        }
    }

    fn stored_counter(&self) -> MessageId {
        match self.storage.get(&self.keys.counter) {
            Ok(Some(raw)) => raw.trim().parse::<MessageId>().unwrap_or_else(|e| {
                warn!(error = %e, raw = %raw, "unreadable inbox id counter, restarting");
                0
            }),
            Ok(None) => 0,
            Err(e) => {
                warn!(error = %e, key = %self.keys.counter, "failed to read inbox id counter");
                0
            }
        }
    }

    fn store_counter(&self, id: MessageId) {
        if let Err(e) = self.storage.set(&self.keys.counter, &id.to_string()) {
            error!(error = %e, key = %self.keys.counter, "failed to persist inbox id counter");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
