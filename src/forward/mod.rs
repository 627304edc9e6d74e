//! Secondary store forwarding (analytics / CRM mirror).

mod forwarder;
mod log;

pub use forwarder::{ForwardError, NoopForwarder, SecondaryForwarder};
pub use log::LogForwarder;
