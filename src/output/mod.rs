//! The outbound pipeline: raw sink, flood control, command façades.

mod cap;
mod dcc;
mod irc;
mod raw;

pub use cap::OutputCap;
pub use dcc::OutputDcc;
pub use irc::OutputIrc;
pub use raw::OutputRaw;
