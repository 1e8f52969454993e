//! HTTP request handlers.

use crate::auth::is_valid_phone_number;
use crate::error::{AppError, Resource, Result};
use crate::library::book::{
    self, BookDetailView, BookSummary, ReviewView, SearchResult, ShelfBook, UpcomingBook,
};
use crate::library::{self as shelf, ShelfOrder};
use crate::server::AppState;
use crate::server::extract::{AuthUser, JsonBody, PathParam, QueryParams, authorization_token};
use crate::stats;
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reviews must be shorter than this many characters.
const MAX_REVIEW_CHARS: usize = 200;

/// JSON body used by every successful response.
type JsonResult = Result<Json<Value>>;

/// `{"message": message, key: payload}`.
fn respond<T: Serialize>(message: &str, key: &str, payload: T) -> JsonResult {
    let payload = serde_json::to_value(payload)
        .map_err(|e| AppError::Internal(format!("Failed to encode response: {}", e)))?;

    let mut body = Map::new();
    body.insert("message".to_string(), Value::from(message));
    body.insert(key.to_string(), payload);
    Ok(Json(Value::Object(body)))
}

fn success<T: Serialize>(key: &str, payload: T) -> JsonResult {
    respond("SUCCESS", key, payload)
}

fn message(message: &str) -> Json<Value> {
    let mut body = Map::new();
    body.insert("message".to_string(), Value::from(message));
    Json(Value::Object(body))
}

fn non_negative(name: &str, value: i64) -> Result<i64> {
    if value < 0 {
        return Err(AppError::InvalidRequest(format!(
            "{} must not be negative",
            name
        )));
    }
    Ok(value)
}

fn ensure_book(state: &AppState, book_id: i64) -> Result<()> {
    match state.db.get_book(book_id)? {
        Some(_) => Ok(()),
        None => Err(AppError::NotExist(Resource::Book)),
    }
}

fn default_limit() -> i64 {
    10
}

/// Liveness probe.
pub async fn health() -> Json<Value> {
    message("SUCCESS")
}

// ============================================================================
// BOOKS
// ============================================================================

/// Book detail page.
pub async fn book_detail(
    State(state): State<AppState>,
    PathParam(book_id): PathParam<i64>,
) -> JsonResult {
    let detail = state
        .db
        .get_book_detail(book_id)?
        .ok_or(AppError::NotExist(Resource::Book))?;

    success("book_detail", BookDetailView::from(detail))
}

/// Completion rate and expected reading time.
pub async fn book_statistics(
    State(state): State<AppState>,
    PathParam(book_id): PathParam<i64>,
) -> JsonResult {
    ensure_book(&state, book_id)?;
    success("statistics", stats::reading_numeric(&state.db, book_id)?)
}

/// Progress request.
#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    page: i64,
    time: i64,
}

/// Record one reading attempt.
pub async fn record_progress(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParam(book_id): PathParam<i64>,
    JsonBody(req): JsonBody<ProgressRequest>,
) -> JsonResult {
    let page = non_negative("page", req.page)?;
    let time = non_negative("time", req.time)?;

    let progress = state.db.add_progress(auth.user.id, book_id, page, time)?;
    tracing::info!(user_id = auth.user.id, book_id, page, time, "Progress recorded");

    success("progress", progress)
}

/// Search parameters. Empty values are ignored.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    author: Option<String>,
    title: Option<String>,
    company: Option<String>,
}

/// Search by author, title or publisher.
pub async fn search_books(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<SearchParams>,
) -> JsonResult {
    let field = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    let author = field(&params.author);
    let title = field(&params.title);
    let company = field(&params.company);

    if author.is_none() && title.is_none() && company.is_none() {
        return Err(AppError::InvalidRequest(
            "Search needs author, title or company".to_string(),
        ));
    }

    let books = state
        .db
        .search_books(author.as_deref(), title.as_deref(), company.as_deref())?;

    success(
        "books",
        books.iter().map(SearchResult::from).collect::<Vec<_>>(),
    )
}

/// Recently published parameters.
#[derive(Debug, Deserialize)]
pub struct RecentParams {
    #[serde(default = "default_recent_days")]
    day: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_recent_days() -> i64 {
    30
}

/// Books published within the last `day` days.
pub async fn recent_books(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<RecentParams>,
) -> JsonResult {
    let day = non_negative("day", params.day)?;
    let limit = non_negative("limit", params.limit)?;

    let today = book::today();
    let from = TimeDelta::try_days(day)
        .and_then(|span| today.checked_sub_signed(span))
        .ok_or_else(|| AppError::InvalidRequest(format!("day out of range: {}", day)))?;
    let books = state.db.books_published_between(
        &book::format_date(from),
        &book::format_date(today),
        limit,
    )?;

    if books.is_empty() {
        return Err(AppError::NoBooks);
    }

    success("books", books.iter().map(BookSummary::from).collect::<Vec<_>>())
}

/// Listing size parameter.
#[derive(Debug, Deserialize)]
pub struct LimitParams {
    #[serde(default = "default_limit")]
    limit: i64,
}

/// Books not published yet.
pub async fn upcoming_books(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<LimitParams>,
) -> JsonResult {
    let limit = non_negative("limit", params.limit)?;

    let today = book::today();
    let books = state
        .db
        .books_published_after(&book::format_date(today), limit)?;

    if books.is_empty() {
        return Err(AppError::NoBooks);
    }

    let upcoming = books
        .iter()
        .map(|b| UpcomingBook::new(b, today))
        .collect::<Result<Vec<_>>>()?;

    success("books", upcoming)
}

/// Landing page parameters.
#[derive(Debug, Deserialize)]
pub struct LandingParams {
    #[serde(default = "default_limit")]
    maximum: i64,
}

/// Books with cover art for the landing page.
pub async fn landing_books(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<LandingParams>,
) -> JsonResult {
    let maximum = non_negative("maximum", params.maximum)?;
    let books = state.db.books_with_cover(maximum)?;

    success("books", books.iter().map(BookSummary::from).collect::<Vec<_>>())
}

/// Books with the most readers.
pub async fn best_sellers(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<LimitParams>,
) -> JsonResult {
    let limit = non_negative("limit", params.limit)?;
    let books = state.db.best_sellers(limit)?;

    success("books", books.iter().map(BookSummary::from).collect::<Vec<_>>())
}

// ============================================================================
// REVIEWS
// ============================================================================

/// Reviews of a book, oldest first.
pub async fn list_reviews(
    State(state): State<AppState>,
    PathParam(book_id): PathParam<i64>,
) -> JsonResult {
    ensure_book(&state, book_id)?;

    let reviews: Vec<ReviewView> = state
        .db
        .list_reviews(book_id)?
        .into_iter()
        .map(ReviewView::from)
        .collect();

    success("review_list", reviews)
}

/// Review request.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    contents: String,
}

/// Write a review.
pub async fn create_review(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParam(book_id): PathParam<i64>,
    JsonBody(req): JsonBody<ReviewRequest>,
) -> JsonResult {
    if req.contents.chars().count() >= MAX_REVIEW_CHARS {
        return Err(AppError::LongContents);
    }

    let review = state.db.create_review(auth.user.id, book_id, &req.contents)?;
    tracing::info!(user_id = auth.user.id, book_id, review_id = review.id, "Review created");

    success("review_id", review.id)
}

/// Review deletion parameters.
#[derive(Debug, Deserialize)]
pub struct ReviewDeleteParams {
    review_id: Option<i64>,
}

/// Delete one of the caller's reviews.
pub async fn delete_review(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParam(book_id): PathParam<i64>,
    QueryParams(params): QueryParams<ReviewDeleteParams>,
) -> Result<Json<Value>> {
    let review_id = params.review_id.ok_or(AppError::KeyError)?;

    state.db.delete_review(review_id, book_id, auth.user.id)?;
    tracing::info!(user_id = auth.user.id, book_id, review_id, "Review deleted");

    Ok(message("SUCCESS"))
}

/// Like request.
#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    review_id: i64,
}

/// Like a review, or take the like back.
pub async fn toggle_like(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(req): JsonBody<LikeRequest>,
) -> JsonResult {
    let liked = state.db.toggle_like(auth.user.id, req.review_id)?;
    tracing::debug!(user_id = auth.user.id, review_id = req.review_id, liked, "Like toggled");

    if liked {
        respond("SUCCESS", "like", true)
    } else {
        respond("CANCEL", "like", false)
    }
}

// ============================================================================
// LIBRARY
// ============================================================================

/// Library page header; `null` until the first book is shelved.
pub async fn library_info(State(state): State<AppState>, auth: AuthUser) -> JsonResult {
    success("library", shelf::library_info(&state.db, &auth.user)?)
}

/// Shelve request.
#[derive(Debug, Deserialize)]
pub struct ShelveRequest {
    book_id: i64,
}

/// Put a book on the caller's shelf.
pub async fn add_to_library(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(req): JsonBody<ShelveRequest>,
) -> JsonResult {
    let created = state
        .db
        .add_to_library(auth.user.id, &auth.user.nickname, req.book_id)?;

    if created {
        tracing::info!(user_id = auth.user.id, "Library created");
    }
    tracing::info!(user_id = auth.user.id, book_id = req.book_id, "Book shelved");

    success("library_created", created)
}

/// Shelf listing parameters.
#[derive(Debug, Deserialize)]
pub struct ShelfParams {
    #[serde(default = "default_ordering")]
    ordering: i64,
}

fn default_ordering() -> i64 {
    1
}

/// Books on the caller's shelf.
pub async fn library_books(
    State(state): State<AppState>,
    auth: AuthUser,
    QueryParams(params): QueryParams<ShelfParams>,
) -> JsonResult {
    let order = ShelfOrder::from_code(params.ordering)?;
    let books = state.db.list_library_books(auth.user.id, order)?;

    success("books", books.iter().map(ShelfBook::from).collect::<Vec<_>>())
}

/// Reading totals and a recommendation.
pub async fn library_statistics(State(state): State<AppState>, auth: AuthUser) -> JsonResult {
    let today = book::format_date(book::today());
    success(
        "data",
        shelf::reading_summary(&state.db, auth.user.id, &today)?,
    )
}

// ============================================================================
// USERS
// ============================================================================

/// Sign-up request.
#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    phone_number: String,
    password: String,
    nickname: String,
}

/// Create an account.
pub async fn sign_up(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SignUpRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    state
        .auth
        .sign_up(&req.phone_number, &req.password, &req.nickname)?;

    Ok((StatusCode::CREATED, message("SUCCESS")))
}

/// Sign-in request.
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    phone_number: String,
    password: String,
}

/// Sign in with phone number and password.
pub async fn sign_in(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SignInRequest>,
) -> JsonResult {
    let (user, token) = state.auth.sign_in(&req.phone_number, &req.password)?;
    tracing::info!(user_id = user.id, "User signed in");

    success("access_token", token)
}

/// Sign in with a Kakao access token passed in `Authorization`.
pub async fn kakao_sign_in(State(state): State<AppState>, headers: HeaderMap) -> JsonResult {
    let provider_token = authorization_token(&headers).ok_or(AppError::KeyError)?;

    let profile = state.oauth.fetch_profile(&provider_token).await?;
    let (user, token) = state.auth.sign_in_with_profile(&profile)?;
    tracing::info!(user_id = user.id, "User signed in via Kakao");

    success("access_token", token)
}

/// End the caller's session.
pub async fn sign_out(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Value>> {
    state.auth.logout(&auth.token)?;
    Ok(message("SUCCESS"))
}

/// SMS code request.
#[derive(Debug, Deserialize)]
pub struct SmsRequest {
    phone_number: String,
}

/// Send a verification code.
pub async fn request_sms(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SmsRequest>,
) -> Result<Json<Value>> {
    if !is_valid_phone_number(&req.phone_number) {
        return Err(AppError::InvalidRequest(format!(
            "Invalid phone number: {}",
            req.phone_number
        )));
    }

    state.sms.request(&req.phone_number).await?;
    Ok(message("SUCCESS"))
}

/// SMS code check parameters.
#[derive(Debug, Deserialize)]
pub struct SmsCheckParams {
    phone_number: Option<String>,
    auth_number: Option<u32>,
}

/// Check a verification code.
pub async fn check_sms(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<SmsCheckParams>,
) -> JsonResult {
    let (Some(phone_number), Some(auth_number)) = (params.phone_number, params.auth_number) else {
        return Err(AppError::KeyError);
    };

    success("result", state.sms.check(&phone_number, auth_number)?)
}
