//! Console state persistence
//!
//! State is a mapping of named keys to JSON values, one key per store snapshot.
//! [`JsonFileStore`] keeps it in a single file replaced atomically on each save;
//! [`MemoryStore`] keeps it in memory for tests and throwaway sessions.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::agents::Agent;
use crate::console::View;
use crate::conversations::Conversation;
use crate::events::LogEntry;
use crate::prompt::PaymentDetails;
use crate::{Error, Result};

/// Persisted key names
pub mod keys {
    pub const AGENTS: &str = "agents";
    pub const CONVERSATIONS: &str = "conversations";
    pub const LOGS: &str = "logs";
    pub const IS_LINKED: &str = "is_linked";
    pub const PHONE_NUMBER: &str = "phone_number";
    pub const VIEW: &str = "view";
    pub const BANK_NAME: &str = "bank_name";
    pub const ACCOUNT_HOLDER: &str = "account_holder";
    pub const IBAN: &str = "iban";
}

/// Raw key/value state
pub type StateMap = Map<String, Value>;

/// Backend holding the persisted key/value state
pub trait StateStore: Send + Sync {
    /// Read the whole mapping; an absent store reads as empty
    ///
    /// # Errors
    ///
    /// Returns error if the backend exists but cannot be read
    fn load(&self) -> Result<StateMap>;

    /// Replace the whole mapping
    ///
    /// # Errors
    ///
    /// Returns error if the backend cannot be written
    fn save(&self, state: &StateMap) -> Result<()>;
}

/// Single JSON document on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn load(&self) -> Result<StateMap> {
        if !self.path.exists() {
            return Ok(StateMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            other => Err(Error::Storage(format!(
                "{} holds a JSON {}, expected an object",
                self.path.display(),
                json_kind(&other)
            ))),
        }
    }

    fn save(&self, state: &StateMap) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        // Write beside the target, then rename over it
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, state)?;
        tmp.write_all(b"\n")?;
        tmp.persist(&self.path).map_err(|e| {
            Error::Storage(format!("failed to replace {}: {e}", self.path.display()))
        })?;

        tracing::trace!(path = %self.path.display(), keys = state.len(), "state saved");
        Ok(())
    }
}

/// In-memory store; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StateMap>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<StateMap> {
        self.state
            .lock()
            .map(|s| s.clone())
            .map_err(|e| Error::Storage(format!("memory store poisoned: {e}")))
    }

    fn save(&self, state: &StateMap) -> Result<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| Error::Storage(format!("memory store poisoned: {e}")))?;
        guard.clone_from(state);
        Ok(())
    }
}

/// Typed view of everything the console persists
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub agents: Option<Vec<Agent>>,
    pub conversations: Option<Vec<Conversation>>,
    pub logs: Vec<LogEntry>,
    pub is_linked: bool,
    pub phone_number: String,
    pub view: View,
    /// Operator-set payment details; `None` until the operator sets them
    pub payment: Option<PaymentDetails>,
}

impl Snapshot {
    /// Decode a raw mapping
    ///
    /// Missing keys take defaults. A malformed value is logged and treated as
    /// missing so one bad key never blocks startup. `agents` and
    /// `conversations` stay `None` when absent so the caller can seed them, and
    /// `payment` stays `None` unless at least one payment key is present.
    #[must_use]
    pub fn from_map(map: &StateMap) -> Self {
        Self {
            agents: decode(map, keys::AGENTS),
            conversations: decode(map, keys::CONVERSATIONS),
            logs: decode(map, keys::LOGS).unwrap_or_default(),
            is_linked: decode(map, keys::IS_LINKED).unwrap_or_default(),
            phone_number: decode(map, keys::PHONE_NUMBER).unwrap_or_default(),
            view: decode(map, keys::VIEW).unwrap_or_default(),
            payment: decode_payment(map),
        }
    }

    /// Encode into a raw mapping
    ///
    /// # Errors
    ///
    /// Returns error if a value fails to serialize
    pub fn to_map(&self) -> Result<StateMap> {
        let mut map = StateMap::new();
        encode(&mut map, keys::AGENTS, &self.agents.clone().unwrap_or_default())?;
        encode(
            &mut map,
            keys::CONVERSATIONS,
            &self.conversations.clone().unwrap_or_default(),
        )?;
        encode(&mut map, keys::LOGS, &self.logs)?;
        encode(&mut map, keys::IS_LINKED, &self.is_linked)?;
        encode(&mut map, keys::PHONE_NUMBER, &self.phone_number)?;
        encode(&mut map, keys::VIEW, &self.view)?;
        if let Some(payment) = &self.payment {
            encode(&mut map, keys::BANK_NAME, &payment.bank_name)?;
            encode(&mut map, keys::ACCOUNT_HOLDER, &payment.account_holder)?;
            encode(&mut map, keys::IBAN, &payment.iban)?;
        }
        Ok(map)
    }
}

fn decode<T: DeserializeOwned>(map: &StateMap, key: &str) -> Option<T> {
    let value = map.get(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            tracing::warn!(key, error = %e, "ignoring malformed persisted value");
            None
        }
    }
}

fn decode_payment(map: &StateMap) -> Option<PaymentDetails> {
    let present = [keys::BANK_NAME, keys::ACCOUNT_HOLDER, keys::IBAN]
        .iter()
        .any(|key| map.contains_key(*key));
    present.then(|| PaymentDetails {
        bank_name: decode(map, keys::BANK_NAME).unwrap_or_default(),
        account_holder: decode(map, keys::ACCOUNT_HOLDER).unwrap_or_default(),
        iban: decode(map, keys::IBAN).unwrap_or_default(),
    })
}

fn encode<T: Serialize>(map: &mut StateMap, key: &str, value: &T) -> Result<()> {
    map.insert(key.to_string(), serde_json::to_value(value)?);
    Ok(())
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentRole, AgentStore};
    use crate::conversations::{ConversationStore, Message};
    use crate::events::LogKind;

    fn sample() -> Snapshot {
        let mut agents = AgentStore::new();
        let agent_id = agents
            .create("Consultor", AgentRole::Sales, "Sell logistics")
            .unwrap()
            .id
            .clone();
        let mut conversations = ConversationStore::new();
        let conv_id = conversations
            .create("Januário", "+244 923 111 222", Some(agent_id))
            .unwrap()
            .id
            .clone();
        conversations.append_message(&conv_id, Message::customer("Bom dia"));

        Snapshot {
            agents: Some(agents.to_vec()),
            conversations: Some(conversations.to_vec()),
            logs: vec![LogEntry::new("linked", LogKind::Success)],
            is_linked: true,
            phone_number: "+244 923 000 000".to_string(),
            view: View::Conversations,
            payment: Some(PaymentDetails {
                bank_name: "BAI".to_string(),
                account_holder: "AO Express".to_string(),
                iban: "AO06 0040".to_string(),
            }),
        }
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data").join("state.json"));

        assert!(store.load().unwrap().is_empty());

        let snapshot = sample();
        store.save(&snapshot.to_map().unwrap()).unwrap();
        let loaded = Snapshot::from_map(&store.load().unwrap());

        assert_eq!(loaded, snapshot);
    }

    #[test]
    fn test_timestamps_persist_as_rfc3339() {
        let map = sample().to_map().unwrap();
        let ts = map[keys::LOGS][0]["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_malformed_key_falls_back() {
        let mut map = sample().to_map().unwrap();
        map.insert(keys::IS_LINKED.to_string(), Value::String("yes".to_string()));
        map.insert(keys::AGENTS.to_string(), Value::from(42));

        let loaded = Snapshot::from_map(&map);
        assert!(!loaded.is_linked);
        assert!(loaded.agents.is_none());
        assert_eq!(loaded.payment.unwrap().bank_name, "BAI");
    }

    #[test]
    fn test_unset_payment_writes_no_keys() {
        let snapshot = Snapshot {
            payment: None,
            ..sample()
        };
        let map = snapshot.to_map().unwrap();
        assert!(!map.contains_key(keys::BANK_NAME));
        assert!(!map.contains_key(keys::IBAN));
        assert!(Snapshot::from_map(&map).payment.is_none());
    }

    #[test]
    fn test_cleared_payment_stays_cleared() {
        let snapshot = Snapshot {
            payment: Some(PaymentDetails::default()),
            ..sample()
        };
        let map = snapshot.to_map().unwrap();
        assert_eq!(map[keys::BANK_NAME], Value::from(""));
        assert_eq!(Snapshot::from_map(&map).payment, Some(PaymentDetails::default()));
    }

    #[test]
    fn test_non_object_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "[1, 2]").unwrap();

        let err = JsonFileStore::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_memory_store_shares_state() {
        let store = MemoryStore::new();
        let other = store.clone();

        let mut map = StateMap::new();
        map.insert(keys::PHONE_NUMBER.to_string(), Value::from("+244 900 000 000"));
        store.save(&map).unwrap();

        assert_eq!(other.load().unwrap(), map);
    }
}
