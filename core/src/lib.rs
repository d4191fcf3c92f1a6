//! Blocking client for the poll/voting HTTP API.
//!
//! # Overview
//! `PollyClient` logs in, creates, lists, fetches and deletes polls, casts
//! votes and reads results. Each method issues exactly one HTTP request and
//! returns the decoded JSON, with no retries and no caching.
//!
//! # Design
//! - Each operation has a pure `build_*` / `parse_*` pair; the blocking
//!   method runs them around a `Transport` (host-does-IO).
//! - The default transport is `ureq`; tests swap in a recording mock.
//! - The bearer token is per-instance state, set by `login` or `set_token`.
//! - Polls, votes and results stay untyped JSON objects.

pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use client::{PollyClient, DEFAULT_LIMIT, DEFAULT_SKIP};
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
pub use types::{CreatePoll, Poll, PollResults, TokenResponse, Vote, VoteRequest};
