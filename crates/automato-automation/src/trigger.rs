//! Triggers
//!
//! A trigger is defined once in `triggers.yml` and instantiated per action
//! with that action's arguments:
//!
//! ```yaml
//! # triggers.yml
//! conditional: { type: conditional }
//! office_hours: { type: time }
//! # actions.yml
//! greet_bob:
//!   trigger:
//!     - conditional: { interval: 30, when: ["host1.user.bob > 0"] }
//!     - office_hours: { after: "08:00", before: "18:00", weekday: [mon, fri] }
//! ```
//!
//! Each instance caches its last result for `interval` seconds, independent
//! of the TTLs of the states it reads.

use automato_core::{Clock, EndpointRegistry, ReferenceError};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, trace};

use crate::condition::{Condition, TimeWindow};
use crate::expr::{ExprError, Expression};

/// Default re-evaluation interval in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 30;

/// Trigger errors
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Invalid arguments for trigger '{trigger}': {reason}")]
    InvalidArgs { trigger: String, reason: String },

    #[error("Invalid expression '{expression}' in trigger '{trigger}': {source}")]
    Expression {
        trigger: String,
        expression: String,
        #[source]
        source: ExprError,
    },
}

/// Result type for trigger operations
pub type TriggerResult<T> = Result<T, TriggerError>;

/// Trigger definition from `triggers.yml`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerConfig {
    /// Instance args: `when: [expression, ...]`
    Conditional,
    /// Instance args: `after`, `before`, `weekday`
    Time,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

/// Per-action instance arguments
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceConfig {
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Kind-specific arguments
    #[serde(flatten)]
    pub args: serde_json::Map<String, Value>,
}

/// Instance arguments checked and compiled, not yet registered
#[derive(Debug, Clone)]
pub struct CompiledInstance {
    interval: chrono::Duration,
    condition: Condition,
}

#[derive(Debug)]
struct Instance {
    interval: chrono::Duration,
    condition: Condition,
    last_evaluated_at: Option<DateTime<Utc>>,
    last_result: bool,
    evaluations: u64,
}

/// A named trigger and its per-action instances
#[derive(Debug)]
pub struct Trigger {
    name: String,
    config: TriggerConfig,
    endpoints: EndpointRegistry,
    clock: Arc<dyn Clock>,
    instances: DashMap<String, Arc<Mutex<Instance>>>,
}

impl Trigger {
    pub fn new(
        name: impl Into<String>,
        config: TriggerConfig,
        endpoints: EndpointRegistry,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            endpoints,
            clock,
            instances: DashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> TriggerConfig {
        self.config
    }

    /// Check and compile instance arguments without registering them
    pub fn compile(&self, config: &InstanceConfig) -> TriggerResult<CompiledInstance> {
        let condition = match self.config {
            TriggerConfig::Conditional => Condition::Expressions(self.compile_when(&config.args)?),
            TriggerConfig::Time => {
                let window: TimeWindow =
                    serde_json::from_value(Value::Object(config.args.clone())).map_err(|e| {
                        TriggerError::InvalidArgs {
                            trigger: self.name.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                Condition::Time(window)
            }
        };

        Ok(CompiledInstance {
            interval: automato_core::secs(config.interval),
            condition,
        })
    }

    fn compile_when(&self, args: &serde_json::Map<String, Value>) -> TriggerResult<Vec<Expression>> {
        let invalid = |reason: &str| TriggerError::InvalidArgs {
            trigger: self.name.clone(),
            reason: reason.to_string(),
        };

        let items = match args.get("when") {
            Some(Value::Array(items)) => items.iter().collect::<Vec<_>>(),
            Some(single @ Value::String(_)) => vec![single],
            Some(_) => return Err(invalid("'when' must be a list of expressions")),
            None => return Err(invalid("missing 'when'")),
        };

        items
            .into_iter()
            .map(|item| {
                let text = match item {
                    Value::String(s) => s.clone(),
                    Value::Number(_) | Value::Bool(_) => item.to_string(),
                    _ => return Err(invalid("expressions must be strings")),
                };
                Expression::parse(text.clone()).map_err(|source| TriggerError::Expression {
                    trigger: self.name.clone(),
                    expression: text,
                    source,
                })
            })
            .collect()
    }

    /// Register (or replace) the instance for `action`
    pub fn register(&self, action: &str, compiled: CompiledInstance) {
        let instance = Instance {
            interval: compiled.interval,
            condition: compiled.condition,
            last_evaluated_at: None,
            last_result: false,
            evaluations: 0,
        };
        self.instances
            .insert(action.to_string(), Arc::new(Mutex::new(instance)));
        debug!(trigger = %self.name, action, "Trigger instance registered");
    }

    /// Compile and register in one step
    pub fn add_instance(&self, action: &str, config: &InstanceConfig) -> TriggerResult<()> {
        let compiled = self.compile(config)?;
        self.register(action, compiled);
        Ok(())
    }

    pub fn has_instance(&self, action: &str) -> bool {
        self.instances.contains_key(action)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Number of recomputations for `action`
    pub async fn evaluation_count(&self, action: &str) -> Option<u64> {
        let instance = self.instance(action)?;
        let evaluations = instance.lock().await.evaluations;
        Some(evaluations)
    }

    fn instance(&self, action: &str) -> Option<Arc<Mutex<Instance>>> {
        self.instances.get(action).map(|entry| entry.value().clone())
    }

    /// Current result for `action`, recomputed once the interval has elapsed
    ///
    /// An action without an instance evaluates to false.
    pub async fn evaluate(&self, action: &str) -> bool {
        let Some(instance) = self.instance(action) else {
            let e = ReferenceError::Action {
                trigger: self.name.clone(),
                action: action.to_string(),
            };
            error!(trigger = %self.name, action, "{}", e);
            return false;
        };

        let mut instance = instance.lock().await;
        let now = self.clock.now();
        let due = match instance.last_evaluated_at {
            None => true,
            Some(last) => now - last > instance.interval,
        };

        if !due {
            trace!(trigger = %self.name, action, result = instance.last_result, "Using cached trigger result");
            return instance.last_result;
        }

        debug!(trigger = %self.name, action, "Re-evaluating trigger");
        let result = instance.condition.evaluate(&self.endpoints, now).await;

        instance.last_result = result;
        instance.last_evaluated_at = Some(self.clock.now());
        instance.evaluations += 1;
        result
    }
}

/// All triggers by name
#[derive(Debug, Default)]
pub struct TriggerRegistry {
    triggers: IndexMap<String, Arc<Trigger>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a trigger; a later trigger replaces an earlier one of the same name
    pub fn insert(&mut self, trigger: Trigger) {
        self.triggers
            .insert(trigger.name().to_string(), Arc::new(trigger));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Trigger>> {
        self.triggers.get(name)
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.triggers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use automato_core::testing::{state_map, ScriptedSource};
    use automato_core::{Endpoint, MockClock, StateCache};
    use serde_json::json;

    fn make_trigger(clock: &Arc<MockClock>, source: &ScriptedSource) -> Trigger {
        let host1 = Endpoint::builder("host1")
            .state(StateCache::new("user", Box::new(source.clone()), 0, clock.clone()))
            .build();
        Trigger::new(
            "conditional",
            TriggerConfig::Conditional,
            EndpointRegistry::new([host1]),
            clock.clone(),
        )
    }

    fn instance(value: Value) -> InstanceConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_trigger_config_deserialize() {
        let config: TriggerConfig = serde_yaml::from_str("type: conditional").unwrap();
        assert_eq!(config, TriggerConfig::Conditional);

        let config: TriggerConfig = serde_yaml::from_str("type: time").unwrap();
        assert_eq!(config, TriggerConfig::Time);

        assert!(serde_yaml::from_str::<TriggerConfig>("type: trigger.Conditional").is_err());
    }

    #[test]
    fn test_instance_config_defaults() {
        let config = instance(json!({"when": ["1"]}));
        assert_eq!(config.interval, DEFAULT_INTERVAL_SECS);
        assert!(config.args.contains_key("when"));
    }

    #[tokio::test]
    async fn test_unknown_action_is_false() {
        let clock = Arc::new(MockClock::new());
        let trigger = make_trigger(&clock, &ScriptedSource::new());

        assert!(!trigger.evaluate("nobody").await);
    }

    #[tokio::test]
    async fn test_result_cached_for_interval() {
        let clock = Arc::new(MockClock::new());
        let source = ScriptedSource::returning(state_map([("bob", 1)]));
        let trigger = make_trigger(&clock, &source);
        trigger
            .add_instance("greet", &instance(json!({"interval": 30, "when": ["host1.user.bob > 0"]})))
            .unwrap();

        assert!(trigger.evaluate("greet").await);
        source.push_ok(state_map([("bob", 0)]));
        clock.advance_seconds(10);
        assert!(trigger.evaluate("greet").await);
        assert_eq!(trigger.evaluation_count("greet").await, Some(1));
        assert_eq!(source.calls(), 1);

        // The boundary itself is still within the interval
        clock.advance_seconds(20);
        assert!(trigger.evaluate("greet").await);
        assert_eq!(trigger.evaluation_count("greet").await, Some(1));

        clock.advance_seconds(1);
        assert!(!trigger.evaluate("greet").await);
        assert_eq!(trigger.evaluation_count("greet").await, Some(2));
    }

    #[tokio::test]
    async fn test_when_stops_at_first_falsy() {
        let clock = Arc::new(MockClock::new());
        let source = ScriptedSource::returning(state_map([("bob", 1)]));
        let trigger = make_trigger(&clock, &source);
        trigger
            .add_instance("a", &instance(json!({"when": ["0", "host1.user.bob"]})))
            .unwrap();

        assert!(!trigger.evaluate("a").await);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_expression_is_false() {
        let clock = Arc::new(MockClock::new());
        let trigger = make_trigger(&clock, &ScriptedSource::returning(state_map([("bob", 1)])));
        trigger
            .add_instance("a", &instance(json!({"when": ["host1.user.bob / 0"]})))
            .unwrap();
        trigger
            .add_instance("b", &instance(json!({"when": ["host2.user.bob > 0"]})))
            .unwrap();

        assert!(!trigger.evaluate("a").await);
        assert!(!trigger.evaluate("b").await);
    }

    #[tokio::test]
    async fn test_empty_when_is_true() {
        let clock = Arc::new(MockClock::new());
        let trigger = make_trigger(&clock, &ScriptedSource::new());
        trigger.add_instance("a", &instance(json!({"when": []}))).unwrap();

        assert!(trigger.evaluate("a").await);
    }

    #[test]
    fn test_compile_errors() {
        let clock = Arc::new(MockClock::new());
        let trigger = make_trigger(&clock, &ScriptedSource::new());

        assert!(matches!(
            trigger.compile(&instance(json!({}))),
            Err(TriggerError::InvalidArgs { .. })
        ));
        assert!(matches!(
            trigger.compile(&instance(json!({"when": {"a": 1}}))),
            Err(TriggerError::InvalidArgs { .. })
        ));
        assert!(matches!(
            trigger.compile(&instance(json!({"when": ["1 +"]}))),
            Err(TriggerError::Expression { .. })
        ));
        assert!(!trigger.has_instance("a"));
    }

    #[test]
    fn test_time_trigger_compile() {
        let clock = Arc::new(MockClock::new());
        let trigger = Trigger::new(
            "office_hours",
            TriggerConfig::Time,
            EndpointRegistry::default(),
            clock,
        );

        trigger
            .add_instance("a", &instance(json!({"after": "08:00", "weekday": ["mon"]})))
            .unwrap();
        assert!(trigger.has_instance("a"));

        assert!(matches!(
            trigger.compile(&instance(json!({"weekday": ["someday"]}))),
            Err(TriggerError::InvalidArgs { .. })
        ));
    }

    #[test]
    fn test_registry() {
        let clock = Arc::new(MockClock::new());
        let mut registry = TriggerRegistry::new();
        registry.insert(make_trigger(&clock, &ScriptedSource::new()));

        assert_eq!(registry.len(), 1);
        assert!(registry.get("conditional").is_some());
        assert!(registry.get("missing").is_none());
    }
}
