//! Automation engine
//!
//! ```text
//! ACTION = TRIGGERS (AND) → GATING (repeat, cooldown) → PIPELINE
//! ```
//!
//! - **Expressions**: boolean/arithmetic conditions over endpoint state
//! - **Triggers**: named conditions with a cached result per action
//! - **Actions**: gated command pipelines, executed once per tick
//!
//! # Key Types
//!
//! - [`Expression`] - Parsed trigger expression
//! - [`Trigger`] / [`TriggerRegistry`] - Trigger definitions and their instances
//! - [`Action`] - Complete action with its gating state

pub mod action;
pub mod condition;
pub mod expr;
pub mod trigger;

pub use action::{Action, ActionConfig, AutomationError, AutomationResult, Step};
pub use condition::{Condition, TimeWindow, WeekdaySpec};
pub use expr::{ExprError, ExprResult, Expression, Value};
pub use trigger::{
    InstanceConfig, Trigger, TriggerConfig, TriggerError, TriggerRegistry, TriggerResult,
    DEFAULT_INTERVAL_SECS,
};
