//! Test doubles for state sources and commands
//!
//! Used by the unit and integration tests of every automato crate.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{CollectionError, CommandError};
use crate::source::{Command, StateMap, StateSource};

/// Build a [`StateMap`] from key/value pairs
pub fn state_map<I, K, V>(entries: I) -> StateMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[derive(Default)]
struct Script {
    queue: VecDeque<Result<StateMap, CollectionError>>,
    last: Option<Result<StateMap, CollectionError>>,
    missing_default: Option<Value>,
    calls: usize,
}

/// A state source replaying scripted results
///
/// Queued results are returned in order; once the queue is empty the last
/// result repeats. Clones share the script, so a test can keep a handle after
/// boxing the source into a cache.
#[derive(Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source that always returns `data`
    pub fn returning(data: StateMap) -> Self {
        let source = Self::new();
        source.push_ok(data);
        source
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a successful collection
    pub fn push_ok(&self, data: StateMap) {
        self.lock().queue.push_back(Ok(data));
    }

    /// Queue a failed collection
    pub fn push_err(&self, error: CollectionError) {
        self.lock().queue.push_back(Err(error));
    }

    /// Report `value` for keys missing from a collection
    pub fn with_missing_default(self, value: impl Into<Value>) -> Self {
        self.lock().missing_default = Some(value.into());
        self
    }

    /// Number of collections performed so far
    pub fn calls(&self) -> usize {
        self.lock().calls
    }
}

#[async_trait]
impl StateSource for ScriptedSource {
    async fn collect(&self) -> Result<StateMap, CollectionError> {
        let mut script = self.lock();
        script.calls += 1;

        if let Some(next) = script.queue.pop_front() {
            script.last = Some(next.clone());
            return next;
        }

        script.last.clone().unwrap_or_else(|| {
            Err(CollectionError::InvalidData(
                "no scripted result".to_string(),
            ))
        })
    }

    fn missing_key(&self, _key: &str) -> Option<Value> {
        self.lock().missing_default.clone()
    }
}

/// A command recording the arguments of every call
#[derive(Clone, Default)]
pub struct RecordingCommand {
    calls: Arc<Mutex<Vec<Value>>>,
    fail: bool,
}

impl RecordingCommand {
    pub fn new() -> Self {
        Self::default()
    }

    /// A command that records the call and then fails
    pub fn failing() -> Self {
        Self {
            calls: Arc::default(),
            fail: true,
        }
    }

    /// Arguments of every call, in order
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Command for RecordingCommand {
    async fn execute(&self, args: &Value) -> Result<(), CommandError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(args.clone());

        if self.fail {
            return Err(CommandError::Failed("scripted failure".to_string()));
        }
        Ok(())
    }
}
