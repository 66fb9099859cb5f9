//! Client code for swcache.
//!
//! This crate provides the network capability used by the fetch strategies
//! and lifecycle manager, plus URL canonicalization shared with the host.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, Network, UrlError, canonicalize, resolve};
