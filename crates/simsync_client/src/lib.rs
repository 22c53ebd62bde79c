//! # simsync client
//!
//! Token-gated REST client for the simsync document store.
//!
//! This crate provides:
//! - HTTP transport abstraction (`HttpClient`) with a `reqwest` backend
//! - `RemoteClient`, issuing `get`/`list`/`set`/`delete` against
//!   `{base}/{collection}/{id}` and classifying failures into `SyncError`
//! - A pending queue that holds requests issued before a bearer token exists
//!   and replays them in issue order once one is set
//! - `MemoryServer`, an in-memory document store for tests
//!
//! ## Key Invariants
//!
//! - No request is ever sent without `Authorization: Bearer <token>`
//! - Requests parked before a token are submitted in the order they were issued
//! - Parked requests are submitted ahead of any request issued after the token
//! - Every non-success status becomes `SyncError::Db { code, message }`

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod gate;
mod http;
mod mock;

pub use client::{classify, RemoteClient};
pub use config::{
    ClientConfig, ConfigError, DEFAULT_QUEUE_CAPACITY, ENV_BASE_URL, ENV_QUEUE_TIMEOUT, ENV_TOKEN,
};
pub use http::{HttpClient, HttpRequest, HttpResponse, Method, ReqwestClient, ResponseFuture};
pub use mock::{MemoryServer, RecordedRequest};
