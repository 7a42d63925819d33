/*!
Configuration System

Layered configuration loading for fdport components:

1. serde defaults of the target type
2. an optional TOML file
3. environment variables (`<PREFIX>__SECTION__KEY`)

Command-line overrides are applied by the binary after loading.
*/

pub mod loader;

pub use loader::ConfigLoader;
