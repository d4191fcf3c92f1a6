//! Payloads exchanged with the poll API.
//!
//! # Design
//! Only request bodies and the login response are typed. Polls, votes and
//! results are passed back to the caller as the JSON objects the server
//! sent, since the client reads none of their fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A poll as returned by the server: id, question, options, timestamps.
pub type Poll = Map<String, Value>;

/// A cast vote: id, user id, option id, creation time.
pub type Vote = Map<String, Value>;

/// Vote counts per option of a poll.
pub type PollResults = Map<String, Value>;

/// Successful `/login` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

/// JSON body for `POST /polls/{poll_id}/vote`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub option_id: i64,
}

/// JSON body for `POST /polls`. `options` holds the option texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePoll {
    pub question: String,
    pub options: Vec<String>,
}
