//! Waypost control-channel wire format.
//!
//! Shared between the relay server and Rust clients:
//! - the `{type, id?, payload}` frame envelope
//! - typed payloads for every client→server and server→client message
//! - wire error codes
//! - machine/user view types returned over the channel and the HTTP API

mod error;
mod frame;
mod messages;
mod types;

pub use error::ErrorCode;
pub use frame::Frame;
pub use messages::*;
pub use types::{Capabilities, MachineInfo, Platform, UserView};
