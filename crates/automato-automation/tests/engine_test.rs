//! End-to-end tests for actions driven by conditional triggers
//!
//! Endpoints are built from scripted state sources and recording commands;
//! time is driven by a mock clock.

use automato_automation::{
    Action, ActionConfig, AutomationError, Trigger, TriggerConfig, TriggerError, TriggerRegistry,
};
use automato_core::testing::{state_map, RecordingCommand, ScriptedSource};
use automato_core::{Clock, CollectionError, Endpoint, EndpointRegistry, MockClock, StateCache};
use serde_json::json;
use std::sync::Arc;

struct Harness {
    clock: Arc<MockClock>,
    source: ScriptedSource,
    notify: RecordingCommand,
    endpoints: EndpointRegistry,
    triggers: TriggerRegistry,
}

impl Harness {
    fn new() -> Self {
        let clock = Arc::new(MockClock::new());
        let source = ScriptedSource::returning(state_map([("bob", 1)])).with_missing_default(0);
        let notify = RecordingCommand::new();

        let host1 = Endpoint::builder("host1")
            .state(StateCache::new("user", Box::new(source.clone()), 0, clock.clone()))
            .command("notify", Box::new(notify.clone()))
            .command("broken", Box::new(RecordingCommand::failing()))
            .build();
        let endpoints = EndpointRegistry::new([host1]);

        let mut triggers = TriggerRegistry::new();
        for name in ["conditional", "presence"] {
            triggers.insert(Trigger::new(
                name,
                TriggerConfig::Conditional,
                endpoints.clone(),
                clock.clone(),
            ));
        }

        Self {
            clock,
            source,
            notify,
            endpoints,
            triggers,
        }
    }

    fn action(&self, name: &str, yaml: &str) -> Result<Action, AutomationError> {
        let config: ActionConfig = serde_yaml::from_str(yaml).unwrap();
        let clock: Arc<dyn Clock> = self.clock.clone();
        Action::new(name, &config, self.endpoints.clone(), &self.triggers, clock)
    }

    fn set_bob(&self, sessions: i64) {
        self.source.push_ok(state_map([("bob", sessions)]));
    }
}

// ============================================================================
// Cooldown and repeat gating
// ============================================================================

#[tokio::test]
async fn test_cooldown_with_repeat() {
    let h = Harness::new();
    let mut action = h
        .action(
            "greet",
            r#"
trigger:
  - conditional: { interval: 0, when: ["host1.user.bob > 0"] }
then:
  - host1.notify: { msg: hello }
cooldown: 10
"#,
        )
        .unwrap();

    // t=0 fires
    action.execute().await;
    assert_eq!(h.notify.count(), 1);

    // t=5 is within the cooldown
    h.clock.advance_seconds(5);
    action.execute().await;
    assert_eq!(h.notify.count(), 1);

    // t=10 is still within the cooldown (inclusive)
    h.clock.advance_seconds(5);
    action.execute().await;
    assert_eq!(h.notify.count(), 1);

    // t=11 fires again
    h.clock.advance_seconds(1);
    action.execute().await;
    assert_eq!(h.notify.count(), 2);
    assert_eq!(h.notify.calls()[1], json!({"msg": "hello"}));
}

#[tokio::test]
async fn test_no_repeat_until_condition_resets() {
    let h = Harness::new();
    let mut action = h
        .action(
            "greet",
            r#"
trigger:
  - conditional: { interval: 0, when: ["host1.user.bob > 0"] }
then:
  - host1.notify: { msg: hello }
repeat: false
"#,
        )
        .unwrap();

    action.execute().await;
    assert_eq!(h.notify.count(), 1);
    assert!(action.last_fire_state());

    // Still true: suppressed
    h.clock.advance_seconds(1);
    action.execute().await;
    assert_eq!(h.notify.count(), 1);

    // Goes false
    h.set_bob(0);
    h.clock.advance_seconds(1);
    action.execute().await;
    assert_eq!(h.notify.count(), 1);
    assert!(!action.last_fire_state());

    // And true again: fires
    h.set_bob(2);
    h.clock.advance_seconds(1);
    action.execute().await;
    assert_eq!(h.notify.count(), 2);
}

#[tokio::test]
async fn test_repeat_suppression_keeps_last_run() {
    let h = Harness::new();
    let mut action = h
        .action(
            "greet",
            r#"
trigger:
  - conditional: { interval: 0, when: ["host1.user.bob"] }
then:
  - host1.notify: { msg: hello }
repeat: false
"#,
        )
        .unwrap();

    action.execute().await;
    let first_run = action.last_run_at();
    assert!(first_run.is_some());

    h.clock.advance_seconds(100);
    action.execute().await;
    assert_eq!(action.last_run_at(), first_run);
    assert_eq!(action.run_count(), 1);
}

#[tokio::test]
async fn test_action_without_triggers_fires_every_tick() {
    let h = Harness::new();
    let mut action = h
        .action("tick", "then: [{host1.notify: {msg: tick}}]")
        .unwrap();

    action.execute().await;
    h.clock.advance_seconds(1);
    action.execute().await;
    assert_eq!(h.notify.count(), 2);
}

// ============================================================================
// Trigger caching through actions
// ============================================================================

#[tokio::test]
async fn test_trigger_interval_shields_state() {
    let h = Harness::new();
    let mut action = h
        .action(
            "greet",
            r#"
trigger:
  - conditional: { interval: 30, when: ["host1.user.bob > 0"] }
then:
  - host1.notify: { msg: hello }
"#,
        )
        .unwrap();

    action.execute().await;
    h.set_bob(0);
    h.clock.advance_seconds(5);
    action.execute().await;

    // The cached trigger result is reused and the state is not collected again
    assert_eq!(h.source.calls(), 1);
    assert_eq!(h.notify.count(), 2);

    let trigger = h.triggers.get("conditional").unwrap();
    assert_eq!(trigger.evaluation_count("greet").await, Some(1));
}

#[tokio::test]
async fn test_every_trigger_evaluated_when_first_is_false() {
    let h = Harness::new();
    let mut action = h
        .action(
            "greet",
            r#"
trigger:
  - conditional: { when: ["0"] }
  - presence: { when: ["host1.user.bob > 0"] }
then:
  - host1.notify: { msg: hello }
"#,
        )
        .unwrap();

    action.execute().await;

    assert_eq!(h.notify.count(), 0);
    assert!(!action.last_fire_state());
    let conditional = h.triggers.get("conditional").unwrap();
    let presence = h.triggers.get("presence").unwrap();
    assert_eq!(conditional.evaluation_count("greet").await, Some(1));
    assert_eq!(presence.evaluation_count("greet").await, Some(1));
    // The later trigger still collected its state
    assert_eq!(h.source.calls(), 1);
}

#[tokio::test]
async fn test_trigger_listed_twice_keeps_last_instance() {
    let h = Harness::new();
    let mut action = h
        .action(
            "greet",
            r#"
trigger:
  - conditional: { when: ["0"] }
  - conditional: { when: ["1"] }
then:
  - host1.notify: { msg: hello }
"#,
        )
        .unwrap();

    let trigger = h.triggers.get("conditional").unwrap();
    assert_eq!(trigger.instance_count(), 1);
    assert_eq!(action.trigger_names().collect::<Vec<_>>(), vec!["conditional", "conditional"]);

    action.execute().await;
    assert_eq!(h.notify.count(), 1);
    // The second lookup within the interval reuses the cached result
    assert_eq!(trigger.evaluation_count("greet").await, Some(1));
}

#[tokio::test]
async fn test_unregistered_action_evaluates_false() {
    let h = Harness::new();
    let trigger = h.triggers.get("conditional").unwrap();

    assert!(!trigger.evaluate("never_registered").await);
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_unknown_endpoint_step_is_skipped() {
    let h = Harness::new();
    let mut action = h
        .action(
            "greet",
            r#"
then:
  - host2.notify: { msg: lost }
  - host1.missing: {}
  - host1.broken: {}
  - host1.notify: { msg: delivered }
"#,
        )
        .unwrap();

    action.execute().await;
    assert_eq!(h.notify.calls(), vec![json!({"msg": "delivered"})]);
}

#[tokio::test]
async fn test_collection_failure_keeps_last_good() {
    let h = Harness::new();
    let mut action = h
        .action(
            "greet",
            r#"
trigger:
  - conditional: { interval: 0, when: ["host1.user.bob > 0"] }
then:
  - host1.notify: { msg: hello }
"#,
        )
        .unwrap();

    action.execute().await;
    assert_eq!(h.notify.count(), 1);

    // The failing collection makes this tick's expression fail
    h.source
        .push_err(CollectionError::InvalidData("who failed".to_string()));
    h.clock.advance_seconds(1);
    action.execute().await;
    assert_eq!(h.notify.count(), 1);
    assert!(!action.last_fire_state());

    // Within the TTL window of the failed attempt, the last good value is served
    let state = h.endpoints.get("host1").unwrap().state("user").unwrap();
    assert_eq!(state.get("bob").await.unwrap(), json!(1));
}

#[tokio::test]
async fn test_broken_action_does_not_affect_others() {
    let h = Harness::new();
    let mut broken = h
        .action(
            "broken",
            r#"
trigger:
  - conditional: { interval: 0, when: ["nowhere.user.bob > 0"] }
then:
  - host1.notify: { msg: never }
"#,
        )
        .unwrap();
    let mut working = h
        .action(
            "working",
            r#"
trigger:
  - conditional: { interval: 0, when: ["host1.user.alice == 0"] }
then:
  - host1.notify: { msg: alice is away }
"#,
        )
        .unwrap();

    broken.execute().await;
    working.execute().await;

    assert_eq!(h.notify.calls(), vec![json!({"msg": "alice is away"})]);
}

// ============================================================================
// Setup errors
// ============================================================================

#[test]
fn test_unknown_trigger_fails_setup() {
    let h = Harness::new();
    let result = h.action(
        "greet",
        r#"
trigger:
  - conditional: { when: ["1"] }
  - nonexistent: {}
then:
  - host1.notify: { msg: hello }
"#,
    );

    assert!(matches!(result, Err(AutomationError::UnknownTrigger(ref t)) if t == "nonexistent"));
    // Nothing was registered for the failed action
    assert!(!h.triggers.get("conditional").unwrap().has_instance("greet"));
}

#[test]
fn test_syntax_error_fails_setup() {
    let h = Harness::new();
    let result = h.action(
        "greet",
        r#"
trigger:
  - conditional: { when: ["host1.user.bob >"] }
"#,
    );

    assert!(matches!(
        result,
        Err(AutomationError::Trigger(TriggerError::Expression { .. }))
    ));
}

#[test]
fn test_deeply_nested_expression_fails_setup() {
    let h = Harness::new();
    let expression = format!("{}1{}", "(".repeat(50_000), ")".repeat(50_000));
    let config = ActionConfig {
        triggers: vec![json!({"conditional": {"when": [expression]}})],
        ..Default::default()
    };
    let clock: Arc<dyn Clock> = h.clock.clone();

    let result = Action::new("deep", &config, h.endpoints.clone(), &h.triggers, clock);
    assert!(matches!(
        result,
        Err(AutomationError::Trigger(TriggerError::Expression { .. }))
    ));

    // Other actions still set up normally
    assert!(h.action("greet", "then: [{host1.notify: {msg: hi}}]").is_ok());
}

#[test]
fn test_malformed_shapes_fail_setup() {
    let h = Harness::new();

    for yaml in [
        "trigger: [{conditional: {when: ['1']}, other: {}}]",
        "trigger: [conditional]",
        "then: [{notify: {msg: hi}}]",
        "then: [{host1.notify: hi}]",
    ] {
        assert!(
            matches!(h.action("bad", yaml), Err(AutomationError::InvalidConfig(_))),
            "expected configuration error for {}",
            yaml
        );
    }
    assert!(!h.triggers.get("conditional").unwrap().has_instance("bad"));
}

#[test]
fn test_step_shape_only_checked_at_setup() {
    let h = Harness::new();
    let action = h
        .action("later", "then: [{nowhere.nothing: null}]")
        .unwrap();

    assert_eq!(action.steps().len(), 1);
    assert_eq!(action.steps()[0].args, json!({}));
}
