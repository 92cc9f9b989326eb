//! Remote configuration: fetching and three-tier resolution.
//!
//! [`RemoteFetchGateway`] talks to the remote source and keeps the last
//! successfully fetched values. [`ConfigResolver`] answers every lookup by
//! walking remote → application default → library constant.

pub mod gateway;
pub mod keys;
pub mod resolver;
pub mod source;

pub use gateway::{FetchStatus, RemoteFetchGateway};
pub use keys::ConfigKey;
pub use resolver::{ConfigResolver, ConfigSource, ConfigValue};
pub use source::{FetchCallback, FetchError, NoopConfigSource, RemoteConfigSource};
