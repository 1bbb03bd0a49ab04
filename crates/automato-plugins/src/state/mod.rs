//! State sources

mod http_json;
mod linux;

pub use http_json::{HttpJsonState, HttpJsonStateConfig};
pub use linux::{
    parse_loadavg, parse_meminfo, parse_who, LinuxLoadState, LinuxMemoryState, UserSessionState,
};
