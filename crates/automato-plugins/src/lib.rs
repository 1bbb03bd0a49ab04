//! Plugins for automato endpoints
//!
//! Every transport, state source and command is a variant of a closed,
//! serde-tagged enum (`type: http`, `type: linux_memory`, ...). Building an
//! endpoint from its configuration is a table lookup over those variants; there
//! is no name-based loading at runtime.
//!
//! # Capabilities
//!
//! | Variant          | Kind      | Transport  |
//! |------------------|-----------|------------|
//! | `http`           | transport | -          |
//! | `shell`          | transport | -          |
//! | `linux_memory`   | state     | shell      |
//! | `linux_load`     | state     | shell      |
//! | `user_sessions`  | state     | shell      |
//! | `http_json`      | state     | http       |
//! | `notify`         | command   | shell      |
//! | `http`           | command   | http       |
//! | `wake_on_lan`    | command   | none       |

pub mod command;
pub mod config;
mod error;
mod factory;
pub mod state;
pub mod transport;

pub use config::{
    CommandConfig, CommandKind, EndpointConfig, StateConfig, StateKind, TransportConfig,
};
pub use error::{PluginError, PluginResult};
pub use factory::build_endpoint;
pub use transport::TransportHandle;
