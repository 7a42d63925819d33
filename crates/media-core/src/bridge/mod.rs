//! Conference bridge

mod conference;
pub mod mixer;
mod owned;

pub use conference::{ConferenceBridge, PortState, TickReport};
pub use owned::OwnedPort;
