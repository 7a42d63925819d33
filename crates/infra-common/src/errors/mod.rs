/*!
Error Handling

Standardized error type shared by the fdport crates.
*/

pub mod types;

pub use types::{Error, Result};
