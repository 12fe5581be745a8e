use crate::calendar::{CalendarError, DayClock, day_key};
use crate::config::Config;
use crate::db::tasks::TaskChange;
use crate::db::{
    CategoryUpdate, Database, DiaryEntryUpdate, Mood, NewCategory, NewDiaryEntry, NewQuote,
    NewTask, Priority, QuoteUpdate, StreakRecord, TableCounts, TaskUpdate,
    diary::MOOD_SCORE_RANGE, is_unique_violation,
};
use crate::insights::{self, report::InsightRange};
use crate::prompts::FALLBACK_PROMPT;
use crate::streak::{JOURNAL_ACTIVITY, TASKS_ACTIVITY};
use anyhow::{Context, Result};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
    pub clock: DayClock,
    pub streak_failures: Arc<AtomicU64>,
}

impl ApiState {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let clock = config.clock()?;

        Ok(Self {
            config,
            clock,
            streak_failures: Arc::new(AtomicU64::new(0)),
        })
    }

    fn open_database(&self) -> Result<Database> {
        Database::open(&self.config.db_path)
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/tasks", get(tasks_list).post(task_create))
        .route(
            "/api/tasks/migrate-dates",
            get(task_migration_preview).post(task_migration_apply),
        )
        .route(
            "/api/tasks/:id",
            get(task_get).patch(task_update).delete(task_delete),
        )
        .route("/api/categories", get(categories_list).post(category_create))
        .route(
            "/api/categories/:id",
            get(category_get)
                .patch(category_update)
                .delete(category_delete),
        )
        .route("/api/diary", get(diary_list).post(diary_create))
        .route(
            "/api/diary/:id",
            get(diary_get).patch(diary_update).delete(diary_delete),
        )
        .route("/api/streaks", get(streaks_list).post(streak_record))
        .route("/api/prompts", get(prompt_of_the_day))
        .route("/api/quotes", get(quotes_list).post(quote_create))
        .route(
            "/api/quotes/:id",
            get(quote_get).patch(quote_update).delete(quote_delete),
        )
        .route("/api/insights", get(insights_report))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Applies one streak event without letting a failure reach the caller.
///
/// Failures are logged and counted in `streak_failures`; there is no retry.
fn record_streak_best_effort(
    state: &ApiState,
    database: &mut Database,
    activity_type: &str,
    now: DateTime<Utc>,
) {
    match database.record_activity(activity_type, now, &state.clock) {
        Ok(update) => {
            info!(
                activity_type,
                transition = ?update.transition,
                current_streak = update.streak.current_streak,
                "streak updated"
            );
        }
        Err(error) => {
            let failures = state.streak_failures.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(activity_type, error = %error, failures, "streak update failed");
        }
    }
}

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn required_text(value: &str, field: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }

    Ok(trimmed.to_string())
}

fn not_found(kind: &str, id: &str) -> ApiError {
    ApiError::NotFound(format!("{kind} not found: {id}"))
}

fn deleted() -> Json<Value> {
    Json(json!({ "success": true }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusPayload {
    today: String,
    utc_offset_minutes: i32,
    api_port: u16,
    streak_failures: u64,
    counts: TableCounts,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let database = state.open_database()?;

    Ok(Json(StatusPayload {
        today: day_key(state.clock.today()),
        utc_offset_minutes: state.clock.offset_minutes(),
        api_port: state.config.api_port,
        streak_failures: state.streak_failures.load(Ordering::Relaxed),
        counts: database.table_counts()?,
    }))
}

#[derive(Debug, Deserialize)]
struct DayQuery {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTaskPayload {
    #[serde(default)]
    title: String,
    description: Option<String>,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    duration: Option<i64>,
    #[serde(default)]
    priority: Priority,
    category_id: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateTaskPayload {
    title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    start_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    end_time: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    duration: Option<Option<i64>>,
    is_completed: Option<bool>,
    priority: Option<Priority>,
    #[serde(default, deserialize_with = "double_option")]
    category_id: Option<Option<String>>,
    date: Option<String>,
    order: Option<i64>,
}

fn ensure_category_exists(database: &Database, category_id: Option<&str>) -> ApiResult<()> {
    match category_id {
        Some(id) if database.get_category(id)?.is_none() => {
            Err(ApiError::BadRequest(format!("Unknown category: {id}")))
        }
        _ => Ok(()),
    }
}

async fn tasks_list(
    State(state): State<ApiState>,
    Query(query): Query<DayQuery>,
) -> ApiResult<Json<Vec<crate::db::Task>>> {
    let database = state.open_database()?;

    let tasks = match query.date.as_deref() {
        Some(raw) => {
            let (from, to) = state.clock.parse_bounds(raw)?;
            database.tasks_between(from, to)?
        }
        None => database.list_tasks()?,
    };

    Ok(Json(tasks))
}

async fn task_create(
    State(state): State<ApiState>,
    Json(payload): Json<CreateTaskPayload>,
) -> ApiResult<(StatusCode, Json<crate::db::Task>)> {
    let title = required_text(&payload.title, "title")?;
    let date = match payload.date.as_deref() {
        Some(raw) => state.clock.parse_instant(raw)?,
        None => state.clock.storage_instant(state.clock.today()),
    };

    let mut database = state.open_database()?;
    ensure_category_exists(&database, payload.category_id.as_deref())?;

    let task = database.create_task(
        &NewTask {
            title,
            description: payload.description,
            start_time: payload.start_time,
            end_time: payload.end_time,
            duration: payload.duration,
            priority: payload.priority,
            category_id: payload.category_id,
            date,
        },
        &state.clock,
        Utc::now(),
    )?;

    Ok((StatusCode::CREATED, Json(task)))
}

async fn task_get(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<crate::db::Task>> {
    let database = state.open_database()?;
    let task = database.get_task(&id)?.ok_or_else(|| not_found("Task", &id))?;

    Ok(Json(task))
}

async fn task_update(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTaskPayload>,
) -> ApiResult<Json<crate::db::Task>> {
    let title = payload
        .title
        .as_deref()
        .map(|raw| required_text(raw, "title"))
        .transpose()?;
    let date = payload
        .date
        .as_deref()
        .map(|raw| state.clock.parse_instant(raw))
        .transpose()?;

    let mut database = state.open_database()?;
    if let Some(category_id) = &payload.category_id {
        ensure_category_exists(&database, category_id.as_deref())?;
    }

    let update = TaskUpdate {
        title,
        description: payload.description,
        start_time: payload.start_time,
        end_time: payload.end_time,
        duration: payload.duration,
        is_completed: payload.is_completed,
        priority: payload.priority,
        category_id: payload.category_id,
        date,
        order: payload.order,
    };

    let now = Utc::now();
    let change: TaskChange = database
        .update_task(&id, &update, now)?
        .ok_or_else(|| not_found("Task", &id))?;

    if change.just_completed() {
        record_streak_best_effort(&state, &mut database, TASKS_ACTIVITY, now);
    }

    Ok(Json(change.task))
}

async fn task_delete(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let database = state.open_database()?;
    if !database.delete_task(&id)? {
        return Err(not_found("Task", &id));
    }

    Ok(deleted())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MigrationPayload {
    applied: bool,
    total: usize,
    needs_update: usize,
    tasks: Vec<crate::db::DateMigration>,
}

async fn task_migration_preview(
    State(state): State<ApiState>,
) -> ApiResult<Json<MigrationPayload>> {
    let database = state.open_database()?;
    let tasks = database.preview_date_migration(&state.clock)?;

    Ok(Json(MigrationPayload {
        applied: false,
        total: tasks.len(),
        needs_update: tasks.iter().filter(|task| task.needs_update).count(),
        tasks,
    }))
}

async fn task_migration_apply(State(state): State<ApiState>) -> ApiResult<Json<MigrationPayload>> {
    let mut database = state.open_database()?;
    let tasks = database.apply_date_migration(&state.clock, Utc::now())?;
    info!(migrated = tasks.len(), "task dates migrated");

    Ok(Json(MigrationPayload {
        applied: true,
        total: tasks.len(),
        needs_update: tasks.len(),
        tasks,
    }))
}

#[derive(Debug, Deserialize)]
struct CreateCategoryPayload {
    #[serde(default)]
    name: String,
    color: Option<String>,
    icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct UpdateCategoryPayload {
    name: Option<String>,
    color: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    icon: Option<Option<String>>,
}

fn category_name_conflict(name: &str) -> impl FnOnce(anyhow::Error) -> ApiError + '_ {
    move |error| {
        if is_unique_violation(&error) {
            ApiError::BadRequest(format!("Category already exists: {name}"))
        } else {
            ApiError::Internal(error)
        }
    }
}

async fn categories_list(
    State(state): State<ApiState>,
) -> ApiResult<Json<Vec<crate::db::Category>>> {
    let database = state.open_database()?;
    Ok(Json(database.list_categories()?))
}

async fn category_create(
    State(state): State<ApiState>,
    Json(payload): Json<CreateCategoryPayload>,
) -> ApiResult<(StatusCode, Json<crate::db::Category>)> {
    let name = required_text(&payload.name, "name")?;
    let database = state.open_database()?;

    let category = database
        .create_category(
            &NewCategory {
                name: name.clone(),
                color: payload.color,
                icon: payload.icon,
            },
            Utc::now(),
        )
        .map_err(category_name_conflict(&name))?;

    Ok((StatusCode::CREATED, Json(category)))
}

async fn category_get(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<crate::db::Category>> {
    let database = state.open_database()?;
    let category = database
        .get_category(&id)?
        .ok_or_else(|| not_found("Category", &id))?;

    Ok(Json(category))
}

async fn category_update(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateCategoryPayload>,
) -> ApiResult<Json<crate::db::Category>> {
    let name = payload
        .name
        .as_deref()
        .map(|raw| required_text(raw, "name"))
        .transpose()?;

    let database = state.open_database()?;

    let update = CategoryUpdate {
        name,
        color: payload.color,
        icon: payload.icon,
    };
    let category = database
        .update_category(&id, &update, Utc::now())
        .map_err(category_name_conflict(update.name.as_deref().unwrap_or_default()))?
        .ok_or_else(|| not_found("Category", &id))?;

    Ok(Json(category))
}

async fn category_delete(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let database = state.open_database()?;
    if !database.delete_category(&id)? {
        return Err(not_found("Category", &id));
    }

    Ok(deleted())
}

#[derive(Debug, Deserialize)]
struct DiaryQuery {
    date: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateDiaryPayload {
    title: Option<String>,
    #[serde(default)]
    content: String,
    mood: Option<Mood>,
    mood_score: Option<i64>,
    prompt: Option<String>,
    weather: Option<String>,
    location: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateDiaryPayload {
    #[serde(default, deserialize_with = "double_option")]
    title: Option<Option<String>>,
    content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    mood: Option<Option<Mood>>,
    #[serde(default, deserialize_with = "double_option")]
    mood_score: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    weather: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    location: Option<Option<String>>,
}

fn validate_mood_score(mood_score: Option<i64>) -> ApiResult<()> {
    match mood_score {
        Some(score) if !MOOD_SCORE_RANGE.contains(&score) => Err(ApiError::BadRequest(format!(
            "moodScore must be between {} and {}",
            MOOD_SCORE_RANGE.start(),
            MOOD_SCORE_RANGE.end()
        ))),
        _ => Ok(()),
    }
}

async fn diary_list(
    State(state): State<ApiState>,
    Query(query): Query<DiaryQuery>,
) -> ApiResult<Json<Vec<crate::db::DiaryEntry>>> {
    let range = query
        .date
        .as_deref()
        .map(|raw| state.clock.parse_bounds(raw))
        .transpose()?;
    let limit = Config::diary_limit(query.limit);

    let database = state.open_database()?;
    Ok(Json(database.list_diary_entries(range, limit)?))
}

async fn diary_create(
    State(state): State<ApiState>,
    Json(payload): Json<CreateDiaryPayload>,
) -> ApiResult<(StatusCode, Json<crate::db::DiaryEntry>)> {
    let content = required_text(&payload.content, "content")?;
    validate_mood_score(payload.mood_score)?;

    let now = Utc::now();
    let date = payload
        .date
        .as_deref()
        .map(|raw| state.clock.parse_instant(raw))
        .transpose()?
        .unwrap_or(now);

    let mut database = state.open_database()?;
    let entry = database.create_diary_entry(
        &NewDiaryEntry {
            title: payload.title,
            content,
            mood: payload.mood,
            mood_score: payload.mood_score,
            prompt: payload.prompt,
            weather: payload.weather,
            location: payload.location,
            date,
        },
        now,
    )?;

    record_streak_best_effort(&state, &mut database, JOURNAL_ACTIVITY, now);

    Ok((StatusCode::CREATED, Json(entry)))
}

async fn diary_get(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<crate::db::DiaryEntry>> {
    let database = state.open_database()?;
    let entry = database
        .get_diary_entry(&id)?
        .ok_or_else(|| not_found("Diary entry", &id))?;

    Ok(Json(entry))
}

async fn diary_update(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateDiaryPayload>,
) -> ApiResult<Json<crate::db::DiaryEntry>> {
    let content = payload
        .content
        .as_deref()
        .map(|raw| required_text(raw, "content"))
        .transpose()?;
    validate_mood_score(payload.mood_score.flatten())?;

    let update = DiaryEntryUpdate {
        title: payload.title,
        content,
        mood: payload.mood,
        mood_score: payload.mood_score,
        weather: payload.weather,
        location: payload.location,
    };

    let database = state.open_database()?;
    let entry = database
        .update_diary_entry(&id, &update, Utc::now())?
        .ok_or_else(|| not_found("Diary entry", &id))?;

    Ok(Json(entry))
}

async fn diary_delete(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let database = state.open_database()?;
    if !database.delete_diary_entry(&id)? {
        return Err(not_found("Diary entry", &id));
    }

    Ok(deleted())
}

#[derive(Debug, Deserialize)]
struct StreakQuery {
    #[serde(rename = "type")]
    activity_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordStreakPayload {
    #[serde(rename = "type", default)]
    activity_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StreaksPayload {
    streaks: Vec<StreakRecord>,
    active_days: Vec<String>,
}

async fn streaks_list(
    State(state): State<ApiState>,
    Query(query): Query<StreakQuery>,
) -> ApiResult<Json<StreaksPayload>> {
    let activity_type = query
        .activity_type
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let today = state.clock.today();
    let window = i64::from(state.config.active_days_window.max(1));
    let first_day = today
        .checked_sub_signed(Duration::days(window - 1))
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "active_days_window out of range: {}",
                state.config.active_days_window
            ))
        })?;

    let database = state.open_database()?;
    let streaks = database.list_streaks(activity_type)?;

    let mut active_days = database
        .diary_dates_between(state.clock.start_of(first_day), state.clock.end_of(today))?
        .into_iter()
        .map(|instant| state.clock.local_day_of(instant))
        .collect::<Vec<_>>();
    active_days.dedup();

    Ok(Json(StreaksPayload {
        streaks,
        active_days: active_days.into_iter().map(day_key).collect(),
    }))
}

async fn streak_record(
    State(state): State<ApiState>,
    Json(payload): Json<RecordStreakPayload>,
) -> ApiResult<Json<crate::db::StreakUpdate>> {
    let activity_type = required_text(&payload.activity_type, "type")?;
    let mut database = state.open_database()?;
    let update = database.record_activity(&activity_type, Utc::now(), &state.clock)?;

    Ok(Json(update))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptPayload {
    date: String,
    content: String,
    is_fallback: bool,
    prompt: Option<crate::db::DailyPrompt>,
}

async fn prompt_of_the_day(State(state): State<ApiState>) -> ApiResult<Json<PromptPayload>> {
    let now = Utc::now();
    let today = state.clock.local_day_of(now);
    let mut database = state.open_database()?;
    let prompt = database.prompt_for_day(today, now)?;

    Ok(Json(PromptPayload {
        date: day_key(today),
        content: prompt
            .as_ref()
            .map_or_else(|| FALLBACK_PROMPT.to_string(), |prompt| prompt.content.clone()),
        is_fallback: prompt.is_none(),
        prompt,
    }))
}

#[derive(Debug, Deserialize)]
struct QuotesQuery {
    random: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateQuotePayload {
    #[serde(default)]
    content: String,
    author: Option<String>,
    #[serde(default)]
    is_favorite: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateQuotePayload {
    content: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    author: Option<Option<String>>,
    is_favorite: Option<bool>,
}

async fn quotes_list(
    State(state): State<ApiState>,
    Query(query): Query<QuotesQuery>,
) -> ApiResult<Json<Value>> {
    let database = state.open_database()?;

    let payload = if query.random.unwrap_or(false) {
        serde_json::to_value(database.random_quote()?)
    } else {
        serde_json::to_value(database.list_quotes()?)
    }
    .context("Failed to serialize quotes")?;

    Ok(Json(payload))
}

async fn quote_create(
    State(state): State<ApiState>,
    Json(payload): Json<CreateQuotePayload>,
) -> ApiResult<(StatusCode, Json<crate::db::MotivationalQuote>)> {
    let content = required_text(&payload.content, "content")?;
    let database = state.open_database()?;

    let quote = database.create_quote(
        &NewQuote {
            content,
            author: payload.author,
            is_favorite: payload.is_favorite,
        },
        Utc::now(),
    )?;

    Ok((StatusCode::CREATED, Json(quote)))
}

async fn quote_get(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<crate::db::MotivationalQuote>> {
    let database = state.open_database()?;
    let quote = database
        .get_quote(&id)?
        .ok_or_else(|| not_found("Quote", &id))?;

    Ok(Json(quote))
}

async fn quote_update(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateQuotePayload>,
) -> ApiResult<Json<crate::db::MotivationalQuote>> {
    let content = payload
        .content
        .as_deref()
        .map(|raw| required_text(raw, "content"))
        .transpose()?;

    let update = QuoteUpdate {
        content,
        author: payload.author,
        is_favorite: payload.is_favorite,
    };

    let database = state.open_database()?;
    let quote = database
        .update_quote(&id, &update, Utc::now())?
        .ok_or_else(|| not_found("Quote", &id))?;

    Ok(Json(quote))
}

async fn quote_delete(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let database = state.open_database()?;
    if !database.delete_quote(&id)? {
        return Err(not_found("Quote", &id));
    }

    Ok(deleted())
}

#[derive(Debug, Deserialize)]
struct InsightsQuery {
    range: Option<String>,
}

async fn insights_report(
    State(state): State<ApiState>,
    Query(query): Query<InsightsQuery>,
) -> ApiResult<Json<insights::report::InsightsReport>> {
    let range = query
        .range
        .as_deref()
        .map(str::parse::<InsightRange>)
        .transpose()
        .map_err(ApiError::BadRequest)?
        .unwrap_or_default();

    let database = state.open_database()?;
    let report = insights::generate_insights(&database, &state.clock, range, Utc::now())?;

    Ok(Json(report))
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl From<CalendarError> for ApiError {
    fn from(value: CalendarError) -> Self {
        Self::BadRequest(value.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => {
                error!(error = %format!("{error:#}"), "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": error.to_string() })),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiState, router};
    use crate::config::Config;
    use axum::Router;
    use axum::body::Body;
    use http::{Method, Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn test_app() -> (TempDir, Config, Router) {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = Config {
            db_path: dir.path().join("diary.db"),
            ..Config::default()
        };
        let state = ApiState::new(Arc::new(config.clone())).expect("state");

        (dir, config, router(state))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.map_or_else(Body::empty, |value| Body::from(value.to_string())))
            .expect("request");

        let response = app.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };

        (status, value)
    }

    #[tokio::test]
    async fn diary_create_starts_the_journal_streak() {
        let (_dir, _config, app) = test_app();

        let (status, entry) = send(
            &app,
            Method::POST,
            "/api/diary",
            Some(json!({ "content": "First entry", "mood": "happy", "moodScore": 8 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(entry["mood"], "happy");

        send(
            &app,
            Method::POST,
            "/api/diary",
            Some(json!({ "content": "Second entry, same day" })),
        )
        .await;

        let (status, payload) = send(&app, Method::GET, "/api/streaks?type=journal", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload["streaks"][0]["type"], "journal");
        assert_eq!(payload["streaks"][0]["currentStreak"], 1);
        assert_eq!(payload["streaks"][0]["longestStreak"], 1);
        assert_eq!(payload["activeDays"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn diary_validation_rejects_bad_input() {
        let (_dir, _config, app) = test_app();

        let (status, body) = send(&app, Method::POST, "/api/diary", Some(json!({ "content": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some());

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/diary",
            Some(json!({ "content": "ok", "moodScore": 11 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::GET, "/api/diary?date=2024-02-30", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::GET, "/api/diary/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn diary_list_returns_every_entry_unless_limited() {
        let (_dir, _config, app) = test_app();

        for index in 0..60 {
            let (status, _) = send(
                &app,
                Method::POST,
                "/api/diary",
                Some(json!({ "content": format!("Entry {index}") })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (status, all) = send(&app, Method::GET, "/api/diary", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().map(Vec::len), Some(60));

        let (_, page) = send(&app, Method::GET, "/api/diary?limit=5", None).await;
        assert_eq!(page.as_array().map(Vec::len), Some(5));

        let (_, clamped) = send(&app, Method::GET, "/api/diary?limit=0", None).await;
        assert_eq!(clamped.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn oversized_active_days_window_is_rejected_not_panicking() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = Config {
            db_path: dir.path().join("diary.db"),
            active_days_window: 100_000_000,
            ..Config::default()
        };
        let app = router(ApiState::new(Arc::new(config)).expect("state"));

        let (status, body) = send(&app, Method::GET, "/api/streaks", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(
            body["error"]
                .as_str()
                .is_some_and(|message| message.contains("active_days_window"))
        );
    }

    #[tokio::test]
    async fn diary_create_succeeds_when_the_streak_update_fails() {
        let (_dir, config, app) = test_app();
        send(&app, Method::GET, "/api/status", None).await;

        let conn = rusqlite::Connection::open(&config.db_path).expect("open");
        conn.execute_batch(
            "CREATE TRIGGER reject_streaks BEFORE INSERT ON streaks
             BEGIN SELECT RAISE(ABORT, 'streaks unavailable'); END;",
        )
        .expect("trigger");
        drop(conn);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/diary",
            Some(json!({ "content": "Still saved" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, status_body) = send(&app, Method::GET, "/api/status", None).await;
        assert_eq!(status_body["streakFailures"], 1);
        assert_eq!(status_body["counts"]["diaryEntries"], 1);
        assert_eq!(status_body["counts"]["streaks"], 0);
    }

    #[tokio::test]
    async fn completing_tasks_extends_the_tasks_streak_once_per_day() {
        let (_dir, _config, app) = test_app();

        let mut ids = Vec::new();
        for title in ["Write", "Read"] {
            let (status, task) = send(
                &app,
                Method::POST,
                "/api/tasks",
                Some(json!({ "title": title, "priority": "high" })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            ids.push(task["id"].as_str().expect("id").to_string());
        }

        for id in &ids {
            let (status, task) = send(
                &app,
                Method::PATCH,
                &format!("/api/tasks/{id}"),
                Some(json!({ "isCompleted": true })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(task["isCompleted"], true);
        }

        let (_, payload) = send(&app, Method::GET, "/api/streaks?type=tasks", None).await;
        assert_eq!(payload["streaks"][0]["currentStreak"], 1);

        let (status, _) = send(&app, Method::POST, "/api/tasks", Some(json!({ "title": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tasks_are_filtered_by_local_day_and_nullable_fields_clear() {
        let (_dir, _config, app) = test_app();

        let (_, task) = send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(json!({ "title": "Dentist", "date": "2024-03-10", "description": "bring card" })),
        )
        .await;
        assert_eq!(task["date"], "2024-03-10T06:30:00Z");
        assert_eq!(task["order"], 0);

        let (_, second) = send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(json!({ "title": "Groceries", "date": "2024-03-10" })),
        )
        .await;
        assert_eq!(second["order"], 1);
        send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(json!({ "title": "Elsewhere", "date": "2024-03-11" })),
        )
        .await;

        let (_, day) = send(&app, Method::GET, "/api/tasks?date=2024-03-10", None).await;
        assert_eq!(day.as_array().map(Vec::len), Some(2));

        let id = task["id"].as_str().expect("id");
        let (_, cleared) = send(
            &app,
            Method::PATCH,
            &format!("/api/tasks/{id}"),
            Some(json!({ "description": null })),
        )
        .await;
        assert_eq!(cleared["description"], Value::Null);
        assert_eq!(cleared["title"], "Dentist");

        let (status, _) = send(&app, Method::DELETE, &format!("/api/tasks/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::GET, &format!("/api/tasks/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn explicit_streak_event_requires_a_type() {
        let (_dir, _config, app) = test_app();

        let (status, _) = send(&app, Method::POST, "/api/streaks", Some(json!({ "type": " " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/streaks",
            Some(json!({ "type": "meditation" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["transition"], "started");
        assert_eq!(body["streak"]["type"], "meditation");

        let (_, again) = send(
            &app,
            Method::POST,
            "/api/streaks",
            Some(json!({ "type": "meditation" })),
        )
        .await;
        assert_eq!(again["transition"], "same_day");
    }

    #[tokio::test]
    async fn prompt_of_the_day_is_seeded_and_stable() {
        let (_dir, _config, app) = test_app();

        let (status, first) = send(&app, Method::GET, "/api/prompts", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["isFallback"], false);

        let (_, second) = send(&app, Method::GET, "/api/prompts", None).await;
        assert_eq!(first["content"], second["content"]);

        let (_, status_body) = send(&app, Method::GET, "/api/status", None).await;
        assert_eq!(status_body["counts"]["prompts"], 10);
    }

    #[tokio::test]
    async fn categories_and_quotes_round_trip() {
        let (_dir, _config, app) = test_app();

        let (status, category) = send(
            &app,
            Method::POST,
            "/api/categories",
            Some(json!({ "name": "Health" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(category["color"], "#6366f1");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/categories",
            Some(json!({ "name": "Health" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, work) = send(
            &app,
            Method::POST,
            "/api/categories",
            Some(json!({ "name": "Work" })),
        )
        .await;
        let work_id = work["id"].as_str().expect("id");
        let (status, body) = send(
            &app,
            Method::PATCH,
            &format!("/api/categories/{work_id}"),
            Some(json!({ "name": "Health" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Category already exists: Health");

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/tasks",
            Some(json!({ "title": "Run", "categoryId": "missing" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, random) = send(&app, Method::GET, "/api/quotes?random=true", None).await;
        assert_eq!(random, Value::Null);

        let (status, quote) = send(
            &app,
            Method::POST,
            "/api/quotes",
            Some(json!({ "content": "Keep going.", "author": "Anon" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(quote["isFavorite"], false);

        let (_, random) = send(&app, Method::GET, "/api/quotes?random=true", None).await;
        assert_eq!(random["content"], "Keep going.");
    }

    #[tokio::test]
    async fn insights_reject_unknown_ranges() {
        let (_dir, _config, app) = test_app();

        let (status, _) = send(&app, Method::GET, "/api/insights?range=decade", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, report) = send(&app, Method::GET, "/api/insights?range=month", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["range"], "month");
        assert_eq!(report["weeklyActivity"].as_array().map(Vec::len), Some(7));
    }
}
