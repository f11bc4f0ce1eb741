//! blockd - administrative block storage and resolution.
//!
//! Stores blocks against user accounts, single IP addresses, and CIDR
//! ranges, and answers which single block applies to a request identity
//! (username plus an ordered candidate address list, e.g. an XFF chain).
//! The winner is always the most specific matching block, with a
//! configurable tie-break chain and newest-id as the final deterministic
//! step.

pub mod block;
pub mod cache;
pub mod config;
pub mod policy;
pub mod resolver;
pub mod service;
pub mod store;
pub mod target;

pub use block::{Block, NewBlock, Restriction};
pub use cache::BlockCache;
pub use config::{Config, ConfigError};
pub use policy::{PrecedencePolicy, TieBreaker};
pub use service::BlockService;
pub use store::{Database, DbError};
pub use target::{AddressFamily, BlockTarget, TargetParseError};
