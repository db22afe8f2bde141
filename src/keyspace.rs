//! The typed key-value engine: string values with lazy expiration and
//! append-only streams.

use std::collections::HashMap;

use jiff::Timestamp;
use thiserror::Error;

use crate::stream::{self, RequestedId, StreamEntry, StreamEntryId, StreamIdError};

#[derive(Error, Debug, PartialEq, Clone)]
pub enum KeyspaceError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error(transparent)]
    InvalidStreamId(#[from] StreamIdError),
}

/// The value stored under a key: a plain string or a stream of entries.
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    String(String),
    Stream(Vec<StreamEntry>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub data: DataType,
    /// Absolute wall-clock expiry. Streams never carry one.
    pub expiration: Option<Timestamp>,
}

/// Mapping from key to typed value.
///
/// Expiration is lazy: an expired string is removed the first time any
/// operation observes it, and callers see it as absent from then on.
#[derive(Debug, Default)]
pub struct Keyspace {
    entries: HashMap<String, Value>,
}

impl Keyspace {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a fully formed value, e.g. one decoded from a snapshot.
    pub fn insert_value(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
    }

    /// Upserts a string value with an optional absolute expiry.
    pub fn set(&mut self, key: &str, value: String, expiration: Option<Timestamp>) {
        self.entries.insert(
            key.to_string(),
            Value {
                data: DataType::String(value),
                expiration,
            },
        );
    }

    /// Returns the string stored under `key`, or `None` for missing keys,
    /// expired keys and stream keys.
    pub fn get(&mut self, key: &str) -> Option<String> {
        if self.expire_if_due(key) {
            return None;
        }

        match self.entries.get(key) {
            Some(Value {
                data: DataType::String(value),
                ..
            }) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn type_of(&mut self, key: &str) -> &'static str {
        if self.expire_if_due(key) {
            return "none";
        }

        match self.entries.get(key) {
            Some(Value {
                data: DataType::String(_),
                ..
            }) => "string",
            Some(Value {
                data: DataType::Stream(_),
                ..
            }) => "stream",
            None => "none",
        }
    }

    /// All live keys. Expired entries observed by the sweep are removed.
    pub fn live_keys(&mut self) -> Vec<String> {
        let now = Timestamp::now();
        self.entries
            .retain(|_, value| !value.expiration.is_some_and(|at| now > at));
        self.entries.keys().cloned().collect()
    }

    /// Increments the integer stored at `key`, creating it at 1 if missing.
    pub fn incr(&mut self, key: &str) -> Result<i64, KeyspaceError> {
        self.expire_if_due(key);

        match self.entries.get_mut(key) {
            Some(Value {
                data: DataType::String(value),
                ..
            }) => {
                let current = value
                    .parse::<i64>()
                    .map_err(|_| KeyspaceError::NotAnInteger)?;
                let next = current.checked_add(1).ok_or(KeyspaceError::NotAnInteger)?;
                *value = next.to_string();
                Ok(next)
            }
            Some(_) => Err(KeyspaceError::WrongType),
            None => {
                self.set(key, "1".to_string(), None);
                Ok(1)
            }
        }
    }

    /// Appends an entry to the stream at `key`, creating the stream if the
    /// key is absent. Returns the assigned entry ID.
    pub fn xadd(
        &mut self,
        key: &str,
        requested: RequestedId,
        fields: Vec<(String, String)>,
    ) -> Result<StreamEntryId, KeyspaceError> {
        self.expire_if_due(key);
        let now_ms = current_unix_ms();

        match self.entries.get_mut(key) {
            Some(Value {
                data: DataType::Stream(entries),
                ..
            }) => {
                let top = entries.last().map(|entry| entry.id);
                let id = stream::arbitrate(top, requested, now_ms)?;
                entries.push(StreamEntry { id, fields });
                Ok(id)
            }
            Some(_) => Err(KeyspaceError::WrongType),
            None => {
                let id = stream::arbitrate(None, requested, now_ms)?;
                self.entries.insert(
                    key.to_string(),
                    Value {
                        data: DataType::Stream(vec![StreamEntry { id, fields }]),
                        expiration: None,
                    },
                );
                Ok(id)
            }
        }
    }

    /// Entries with `start <= id <= end`, in stream order. A missing key is
    /// an empty stream.
    pub fn xrange(
        &self,
        key: &str,
        start: StreamEntryId,
        end: StreamEntryId,
    ) -> Result<Vec<StreamEntry>, KeyspaceError> {
        match self.entries.get(key) {
            Some(Value {
                data: DataType::Stream(entries),
                ..
            }) => Ok(entries
                .iter()
                .filter(|entry| start <= entry.id && entry.id <= end)
                .cloned()
                .collect()),
            Some(_) => Err(KeyspaceError::WrongType),
            None => Ok(Vec::new()),
        }
    }

    /// Entries strictly after `after`, in stream order. Missing keys and
    /// non-stream keys yield nothing.
    pub fn entries_after(&self, key: &str, after: StreamEntryId) -> Vec<StreamEntry> {
        match self.entries.get(key) {
            Some(Value {
                data: DataType::Stream(entries),
                ..
            }) => entries
                .iter()
                .filter(|entry| entry.id > after)
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }

    /// The ID of the newest entry in the stream at `key`, if any.
    pub fn last_entry_id(&self, key: &str) -> Option<StreamEntryId> {
        match self.entries.get(key) {
            Some(Value {
                data: DataType::Stream(entries),
                ..
            }) => entries.last().map(|entry| entry.id),
            _ => None,
        }
    }

    /// Removes `key` if it carries an expiry that has passed. Returns
    /// whether a removal happened.
    fn expire_if_due(&mut self, key: &str) -> bool {
        let due = matches!(
            self.entries.get(key),
            Some(value) if value.expiration.is_some_and(|at| Timestamp::now() > at)
        );
        if due {
            self.entries.remove(key);
        }
        due
    }
}

/// Current wall-clock time in whole milliseconds since the Unix epoch, used
/// for auto-generated stream IDs.
fn current_unix_ms() -> u64 {
    Timestamp::now().as_millisecond().max(0) as u64
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;

    use crate::stream::{RequestedId, StreamEntryId, StreamIdError};

    use super::{Keyspace, KeyspaceError};

    fn past() -> Timestamp {
        Timestamp::from_millisecond(Timestamp::now().as_millisecond() - 1000).unwrap()
    }

    fn future() -> Timestamp {
        Timestamp::from_millisecond(Timestamp::now().as_millisecond() + 60_000).unwrap()
    }

    #[test]
    fn test_set_and_get() {
        let mut keyspace = Keyspace::new();
        keyspace.set("foo", "bar".to_string(), None);

        assert_eq!(keyspace.get("foo"), Some("bar".to_string()));
        assert_eq!(keyspace.get("missing"), None);
        assert_eq!(keyspace.type_of("foo"), "string");
        assert_eq!(keyspace.type_of("missing"), "none");
    }

    #[test]
    fn test_expired_string_is_reaped_on_observation() {
        let mut keyspace = Keyspace::new();
        keyspace.set("gone", "1".to_string(), Some(past()));
        keyspace.set("kept", "2".to_string(), Some(future()));

        assert_eq!(keyspace.get("gone"), None);
        assert_eq!(keyspace.type_of("gone"), "none");
        assert_eq!(keyspace.len(), 1);
        assert_eq!(keyspace.get("kept"), Some("2".to_string()));
    }

    #[test]
    fn test_live_keys_sweeps_expired() {
        let mut keyspace = Keyspace::new();
        keyspace.set("a", "1".to_string(), None);
        keyspace.set("b", "2".to_string(), Some(past()));

        let mut keys = keyspace.live_keys();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string()]);
        assert_eq!(keyspace.len(), 1);
    }

    #[test]
    fn test_incr() {
        let mut keyspace = Keyspace::new();

        assert_eq!(keyspace.incr("counter"), Ok(1));
        assert_eq!(keyspace.incr("counter"), Ok(2));

        keyspace.set("text", "abc".to_string(), None);
        assert_eq!(keyspace.incr("text"), Err(KeyspaceError::NotAnInteger));

        keyspace
            .xadd("s", RequestedId::Auto, vec![("a".to_string(), "1".to_string())])
            .unwrap();
        assert_eq!(keyspace.incr("s"), Err(KeyspaceError::WrongType));
    }

    #[test]
    fn test_xadd_creates_stream_and_orders_entries() {
        let mut keyspace = Keyspace::new();
        let fields = |name: &str| vec![(name.to_string(), "v".to_string())];

        let first = keyspace
            .xadd("s", RequestedId::AutoSequence(5), fields("a"))
            .unwrap();
        assert_eq!(first, StreamEntryId::new(5, 0));

        let second = keyspace
            .xadd("s", RequestedId::AutoSequence(5), fields("b"))
            .unwrap();
        assert_eq!(second, StreamEntryId::new(5, 1));

        assert_eq!(
            keyspace.xadd("s", RequestedId::AutoSequence(4), fields("c")),
            Err(KeyspaceError::InvalidStreamId(
                StreamIdError::NotGreaterThanTop
            ))
        );
        assert_eq!(
            keyspace.xadd(
                "s",
                RequestedId::Explicit(StreamEntryId::ZERO),
                fields("d")
            ),
            Err(KeyspaceError::InvalidStreamId(StreamIdError::ZeroId))
        );

        assert_eq!(keyspace.type_of("s"), "stream");
        assert_eq!(keyspace.last_entry_id("s"), Some(StreamEntryId::new(5, 1)));
        // GET observes streams as absent.
        assert_eq!(keyspace.get("s"), None);
    }

    #[test]
    fn test_xadd_on_string_key_is_a_type_error() {
        let mut keyspace = Keyspace::new();
        keyspace.set("k", "v".to_string(), None);

        assert_eq!(
            keyspace.xadd("k", RequestedId::Auto, Vec::new()),
            Err(KeyspaceError::WrongType)
        );
    }

    #[test]
    fn test_xrange_is_inclusive() {
        let mut keyspace = Keyspace::new();
        for seq in 0..5 {
            keyspace
                .xadd(
                    "s",
                    RequestedId::Explicit(StreamEntryId::new(1, seq)),
                    vec![("n".to_string(), seq.to_string())],
                )
                .unwrap();
        }

        let entries = keyspace
            .xrange("s", StreamEntryId::new(1, 1), StreamEntryId::new(1, 3))
            .unwrap();
        let ids: Vec<_> = entries.iter().map(|entry| entry.id.seq).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let all = keyspace
            .xrange("s", StreamEntryId::ZERO, StreamEntryId::MAX)
            .unwrap();
        assert_eq!(all.len(), 5);

        assert_eq!(
            keyspace
                .xrange("missing", StreamEntryId::ZERO, StreamEntryId::MAX)
                .unwrap(),
            Vec::new()
        );
    }

    #[test]
    fn test_entries_after_is_exclusive() {
        let mut keyspace = Keyspace::new();
        for seq in 0..3 {
            keyspace
                .xadd(
                    "s",
                    RequestedId::Explicit(StreamEntryId::new(2, seq)),
                    vec![("n".to_string(), seq.to_string())],
                )
                .unwrap();
        }

        let after = keyspace.entries_after("s", StreamEntryId::new(2, 0));
        let ids: Vec<_> = after.iter().map(|entry| entry.id.seq).collect();
        assert_eq!(ids, vec![1, 2]);

        assert!(keyspace.entries_after("s", StreamEntryId::new(2, 2)).is_empty());
        assert!(keyspace.entries_after("missing", StreamEntryId::ZERO).is_empty());
    }
}
