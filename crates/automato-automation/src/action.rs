//! Actions
//!
//! An action ANDs its trigger instances and, when they hold, runs an ordered
//! pipeline of endpoint commands:
//!
//! ```yaml
//! greet_bob:
//!   trigger:
//!     - conditional: { when: ["host1.user.bob > 0"] }
//!   then:
//!     - host1.notify: { msg: "hello bob" }
//!   cooldown: 300
//!   repeat: false
//! ```
//!
//! Firing is gated in this order on every tick:
//!
//! 1. every trigger is evaluated; any false: remember that and stop
//! 2. fired last time and `repeat` is off: suppress
//! 3. within `cooldown` seconds of the last run (inclusive): suppress
//! 4. fire

use automato_core::{secs, Clock, EndpointRegistry, PATH_SEPARATOR};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::trigger::{CompiledInstance, InstanceConfig, Trigger, TriggerError, TriggerRegistry};

/// Action setup errors
#[derive(Debug, Error)]
pub enum AutomationError {
    #[error("Invalid action configuration: {0}")]
    InvalidConfig(String),

    #[error("Trigger '{0}' is not configured")]
    UnknownTrigger(String),

    #[error("Trigger error: {0}")]
    Trigger(#[from] TriggerError),
}

/// Result type for action setup
pub type AutomationResult<T> = Result<T, AutomationError>;

fn default_repeat() -> bool {
    true
}

/// Action definition from `actions.yml`
///
/// Trigger items and pipeline steps stay raw until [`Action::new`] so shape
/// errors name the offending item.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionConfig {
    /// `- <trigger>: { instance args }`
    #[serde(default, alias = "trigger")]
    pub triggers: Vec<Value>,

    /// `- <endpoint>.<command>: { args }`
    #[serde(default, alias = "then")]
    pub pipeline: Vec<Value>,

    /// Seconds after a run during which the action cannot fire again
    #[serde(default)]
    pub cooldown: u64,

    /// Fire again while the triggers stay true
    #[serde(default = "default_repeat")]
    pub repeat: bool,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            triggers: Vec::new(),
            pipeline: Vec::new(),
            cooldown: 0,
            repeat: default_repeat(),
        }
    }
}

/// One pipeline step
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// `<endpoint>.<command>`
    pub address: String,
    pub args: Value,
}

/// A configured action and its gating state
#[derive(Debug)]
pub struct Action {
    name: String,
    triggers: Vec<Arc<Trigger>>,
    steps: Vec<Step>,
    cooldown: chrono::Duration,
    repeat: bool,
    last_run_at: Option<DateTime<Utc>>,
    last_fire_state: bool,
    runs: u64,
    endpoints: EndpointRegistry,
    clock: Arc<dyn Clock>,
}

impl Action {
    /// Check the configuration and register the trigger instances
    ///
    /// Nothing is registered unless the whole action is valid. Step addresses
    /// are only checked for shape here; they are resolved when the action runs.
    /// A trigger listed twice keeps its last instance and is evaluated twice.
    pub fn new(
        name: impl Into<String>,
        config: &ActionConfig,
        endpoints: EndpointRegistry,
        triggers: &TriggerRegistry,
        clock: Arc<dyn Clock>,
    ) -> AutomationResult<Self> {
        let name = name.into();

        let mut compiled: Vec<(Arc<Trigger>, CompiledInstance)> = Vec::new();
        for item in &config.triggers {
            let (trigger_name, args) = single_entry(item, "trigger")?;
            let trigger = triggers
                .get(trigger_name)
                .ok_or_else(|| AutomationError::UnknownTrigger(trigger_name.to_string()))?;

            let instance: InstanceConfig = serde_json::from_value(args).map_err(|e| {
                AutomationError::InvalidConfig(format!("trigger '{}': {}", trigger_name, e))
            })?;
            compiled.push((trigger.clone(), trigger.compile(&instance)?));
        }

        let steps = config
            .pipeline
            .iter()
            .map(parse_step)
            .collect::<AutomationResult<Vec<_>>>()?;

        let mut action_triggers = Vec::with_capacity(compiled.len());
        for (trigger, instance) in compiled {
            trigger.register(&name, instance);
            action_triggers.push(trigger);
        }

        debug!(
            action = %name,
            triggers = action_triggers.len(),
            steps = steps.len(),
            "Action configured"
        );

        Ok(Self {
            name,
            triggers: action_triggers,
            steps,
            cooldown: secs(config.cooldown),
            repeat: config.repeat,
            last_run_at: None,
            last_fire_state: false,
            runs: 0,
            endpoints,
            clock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn trigger_names(&self) -> impl Iterator<Item = &str> {
        self.triggers.iter().map(|t| t.name())
    }

    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        self.last_run_at
    }

    pub fn last_fire_state(&self) -> bool {
        self.last_fire_state
    }

    /// Number of times the pipeline ran
    pub fn run_count(&self) -> u64 {
        self.runs
    }

    /// Run one tick
    pub async fn execute(&mut self) {
        // Every instance is evaluated each tick so none of them goes stale
        let mut met = true;
        for trigger in &self.triggers {
            if !trigger.evaluate(&self.name).await {
                debug!(action = %self.name, trigger = trigger.name(), "Conditions not met");
                met = false;
            }
        }

        if !met {
            self.last_fire_state = false;
            return;
        }

        if self.last_fire_state && !self.repeat {
            debug!(action = %self.name, "Suppressed, already fired and repeat is off");
            return;
        }

        let now = self.clock.now();
        if let Some(last) = self.last_run_at {
            if now - last <= self.cooldown {
                debug!(action = %self.name, last_run = %last, "Suppressed by cooldown");
                return;
            }
        }

        self.last_run_at = Some(now);
        self.last_fire_state = true;
        self.runs += 1;
        info!(action = %self.name, "Executing action, conditions are met");

        for step in &self.steps {
            debug!(action = %self.name, command = %step.address, "Executing step");
            self.endpoints.execute_command(&step.address, &step.args).await;
        }
    }
}

/// Split a single-key mapping; a null value means no arguments
fn single_entry<'a>(item: &'a Value, what: &str) -> AutomationResult<(&'a str, Value)> {
    let entry = item
        .as_object()
        .filter(|map| map.len() == 1)
        .and_then(|map| map.iter().next());

    let Some((key, value)) = entry else {
        return Err(AutomationError::InvalidConfig(format!(
            "{} item must be a mapping with a single key, got {}",
            what, item
        )));
    };

    let args = match value {
        Value::Null => Value::Object(Default::default()),
        Value::Object(_) => value.clone(),
        other => {
            return Err(AutomationError::InvalidConfig(format!(
                "arguments of {} '{}' must be a mapping, got {}",
                what, key, other
            )))
        }
    };

    Ok((key.as_str(), args))
}

fn parse_step(item: &Value) -> AutomationResult<Step> {
    let (address, args) = single_entry(item, "pipeline")?;

    match address.split_once(PATH_SEPARATOR) {
        Some((endpoint, command)) if !endpoint.is_empty() && !command.is_empty() => Ok(Step {
            address: address.to_string(),
            args,
        }),
        _ => Err(AutomationError::InvalidConfig(format!(
            "pipeline step '{}' is not of the form <endpoint>.<command>",
            address
        ))),
    }
}
