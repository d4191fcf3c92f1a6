use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Accounts seeded by `app()`.
pub const DEFAULT_USERS: &[(&str, &str)] = &[("alice", "secret"), ("bob", "hunter2")];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollOption {
    pub id: i64,
    pub text: String,
    pub poll_id: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Poll {
    pub id: i64,
    pub question: String,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub options: Vec<PollOption>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub user_id: i64,
    pub option_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptionResult {
    pub option_id: i64,
    pub text: String,
    pub vote_count: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollResults {
    pub poll_id: i64,
    pub question: String,
    pub results: Vec<OptionResult>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct CreatePoll {
    pub question: String,
    pub options: Vec<String>,
}

#[derive(Deserialize)]
pub struct VoteRequest {
    pub option_id: i64,
}

#[derive(Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    10
}

struct User {
    id: i64,
    password: String,
}

#[derive(Default)]
pub struct Store {
    users: HashMap<String, User>,
    tokens: HashMap<String, i64>,
    polls: BTreeMap<i64, Poll>,
    votes: Vec<Vote>,
    next_poll_id: i64,
    next_option_id: i64,
    next_vote_id: i64,
}

impl Store {
    fn with_users(users: &[(&str, &str)]) -> Self {
        let mut store = Store::default();
        for (i, (name, password)) in users.iter().enumerate() {
            store.users.insert(
                name.to_string(),
                User {
                    id: i as i64 + 1,
                    password: password.to_string(),
                },
            );
        }
        store
    }
}

pub type Db = Arc<RwLock<Store>>;

/// Error body shaped like `{"detail": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Not authenticated")]
    Unauthorized,
    #[error("Incorrect username or password")]
    BadCredentials,
    #[error("{0}")]
    NotFound(&'static str),
    #[error("Not authorized to delete this poll")]
    Forbidden,
    #[error("User has already voted on this poll")]
    AlreadyVoted,
    #[error("{0}")]
    Invalid(&'static str),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Unauthorized | ServerError::BadCredentials => StatusCode::UNAUTHORIZED,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::Forbidden => StatusCode::FORBIDDEN,
            ServerError::AlreadyVoted => StatusCode::CONFLICT,
            ServerError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        tracing::warn!(status = status.as_u16(), error = %self, "request rejected");
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

pub fn app() -> Router {
    app_with_users(DEFAULT_USERS)
}

pub fn app_with_users(users: &[(&str, &str)]) -> Router {
    let db: Db = Arc::new(RwLock::new(Store::with_users(users)));
    Router::new()
        .route("/login", post(login))
        .route("/polls", get(list_polls).post(create_poll))
        .route("/polls/{id}", get(get_poll).delete(delete_poll))
        .route("/polls/{id}/vote", post(vote_on_poll))
        .route("/polls/{id}/results", get(poll_results))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Resolve the `Authorization: Bearer` header to a user id.
fn authenticate(store: &Store, headers: &HeaderMap) -> Result<i64, ServerError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| store.tokens.get(token).copied())
        .ok_or(ServerError::Unauthorized)
}

async fn login(State(db): State<Db>, Form(form): Form<LoginForm>) -> Result<Json<Token>, ServerError> {
    let mut store = db.write().await;
    let user_id = match store.users.get(&form.username) {
        Some(user) if user.password == form.password => user.id,
        _ => return Err(ServerError::BadCredentials),
    };
    let access_token = Uuid::new_v4().to_string();
    store.tokens.insert(access_token.clone(), user_id);
    tracing::info!(username = %form.username, "issued token");
    Ok(Json(Token {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

async fn list_polls(State(db): State<Db>, Query(page): Query<Pagination>) -> Json<Vec<Poll>> {
    let store = db.read().await;
    Json(
        store
            .polls
            .values()
            .skip(page.skip)
            .take(page.limit)
            .cloned()
            .collect(),
    )
}

async fn create_poll(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<CreatePoll>,
) -> Result<(StatusCode, Json<Poll>), ServerError> {
    let mut store = db.write().await;
    let owner_id = authenticate(&store, &headers)?;
    if input.question.trim().is_empty() {
        return Err(ServerError::Invalid("Question must not be empty"));
    }
    if input.options.len() < 2 {
        return Err(ServerError::Invalid("A poll needs at least two options"));
    }

    store.next_poll_id += 1;
    let poll_id = store.next_poll_id;
    let mut options = Vec::with_capacity(input.options.len());
    for text in input.options {
        store.next_option_id += 1;
        options.push(PollOption {
            id: store.next_option_id,
            text,
            poll_id,
        });
    }
    let poll = Poll {
        id: poll_id,
        question: input.question,
        owner_id,
        created_at: Utc::now(),
        options,
    };
    store.polls.insert(poll_id, poll.clone());
    tracing::info!(poll_id, owner_id, "created poll");
    Ok((StatusCode::CREATED, Json(poll)))
}

async fn get_poll(State(db): State<Db>, Path(id): Path<i64>) -> Result<Json<Poll>, ServerError> {
    let store = db.read().await;
    store
        .polls
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(ServerError::NotFound("Poll not found"))
}

async fn delete_poll(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<StatusCode, ServerError> {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &headers)?;
    let poll = store.polls.get(&id).ok_or(ServerError::NotFound("Poll not found"))?;
    if poll.owner_id != user_id {
        return Err(ServerError::Forbidden);
    }
    if let Some(poll) = store.polls.remove(&id) {
        store
            .votes
            .retain(|v| !poll.options.iter().any(|o| o.id == v.option_id));
    }
    tracing::info!(poll_id = id, "deleted poll");
    Ok(StatusCode::NO_CONTENT)
}

async fn vote_on_poll(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(input): Json<VoteRequest>,
) -> Result<(StatusCode, Json<Vote>), ServerError> {
    let mut store = db.write().await;
    let user_id = authenticate(&store, &headers)?;
    let poll = store.polls.get(&id).ok_or(ServerError::NotFound("Poll not found"))?;
    if !poll.options.iter().any(|o| o.id == input.option_id) {
        return Err(ServerError::NotFound("Option not found"));
    }
    let already_voted = store
        .votes
        .iter()
        .any(|v| v.user_id == user_id && poll.options.iter().any(|o| o.id == v.option_id));
    if already_voted {
        return Err(ServerError::AlreadyVoted);
    }

    store.next_vote_id += 1;
    let vote = Vote {
        id: store.next_vote_id,
        user_id,
        option_id: input.option_id,
        created_at: Utc::now(),
    };
    store.votes.push(vote.clone());
    tracing::info!(poll_id = id, option_id = input.option_id, user_id, "recorded vote");
    Ok((StatusCode::CREATED, Json(vote)))
}

async fn poll_results(State(db): State<Db>, Path(id): Path<i64>) -> Result<Json<PollResults>, ServerError> {
    let store = db.read().await;
    let poll = store.polls.get(&id).ok_or(ServerError::NotFound("Poll not found"))?;
    let results = poll
        .options
        .iter()
        .map(|o| OptionResult {
            option_id: o.id,
            text: o.text.clone(),
            vote_count: store.votes.iter().filter(|v| v.option_id == o.id).count() as u64,
        })
        .collect();
    Ok(Json(PollResults {
        poll_id: poll.id,
        question: poll.question.clone(),
        results,
    }))
}
