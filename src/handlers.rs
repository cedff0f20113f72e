use crate::ai::{analyze_episode, generate_comment, AiError, GenerativeModel};
use crate::errors::AppError;
use crate::models::{
    AdjustRequest, AnalyzeRequest, CalendarResponse, CommentResponse, DeleteResponse, NewPost,
    PartialStats, Post, PostChangeResponse, PostListResponse, PostQuery, PostUpdate,
    ProfileResponse, ProfileUpdate, StatKind, Stats, TrendsResponse, UserData,
};
use crate::state::AppState;
use crate::stats::{build_calendar, build_trends};
use crate::storage::persist_data;
use crate::ui::render_index;
use axum::{
    extract::{Path, Query, State},
    response::{Html, Redirect},
    Form, Json,
};
use chrono::Local;
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

const USER_ID_MAX_LEN: usize = 64;

pub async fn index(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let data = state.data.lock().await;
    let page = match data.user(&state.default_user) {
        Some(user) => render_index(&user.user_name, &user.status, &user.list_posts(&PostQuery::default())?),
        None => render_index(&state.default_user, &Stats::INITIAL, &[]),
    };
    Ok(Html(page))
}

#[derive(Debug, Deserialize)]
pub struct PostForm {
    pub episode: String,
    #[serde(default)]
    pub health: String,
    #[serde(default)]
    pub happiness: String,
    #[serde(default, rename = "mentalState")]
    pub mental_state: String,
    #[serde(default)]
    pub hunger: String,
}

impl PostForm {
    fn into_new_post(self) -> Result<NewPost, AppError> {
        Ok(NewPost {
            episode: self.episode,
            date: None,
            time: None,
            parameters: PartialStats {
                health: form_number("health", &self.health)?,
                happiness: form_number("happiness", &self.happiness)?,
                mental_state: form_number("mentalState", &self.mental_state)?,
                hunger: form_number("hunger", &self.hunger)?,
            },
        })
    }
}

/// Blank and lone "-" inputs mean "no change".
fn form_number(field: &str, value: &str) -> Result<Option<i64>, AppError> {
    let value = value.trim();
    if value.is_empty() || value == "-" {
        return Ok(None);
    }
    value
        .parse::<i64>()
        .map(Some)
        .map_err(|_| AppError::bad_request(format!("{field} must be an integer")))
}

#[derive(Debug, Deserialize)]
pub struct AdjustForm {
    pub stat: String,
    pub amount: i64,
}

pub async fn submit_post(
    State(state): State<AppState>,
    Form(form): Form<PostForm>,
) -> Result<Redirect, AppError> {
    let input = form.into_new_post()?;
    let user_id = state.default_user.clone();
    create_post_for(&state, &user_id, input).await?;
    Ok(Redirect::to("/"))
}

pub async fn submit_adjust(
    State(state): State<AppState>,
    Form(form): Form<AdjustForm>,
) -> Result<Redirect, AppError> {
    let kind = parse_stat(&form.stat)?;
    let user_id = state.default_user.clone();
    mutate_user(&state, &user_id, |user| Ok(user.adjust_stat(kind, form.amount))).await?;
    Ok(Redirect::to("/"))
}

pub async fn submit_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let user_id = state.default_user.clone();
    mutate_user(&state, &user_id, |user| user.delete_post(&id)).await?;
    Ok(Redirect::to("/"))
}

pub async fn get_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Stats>, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let data = state.data.lock().await;
    let status = data.user(&user_id).map(|user| user.status).unwrap_or(Stats::INITIAL);
    Ok(Json(status))
}

pub async fn set_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(values): Json<PartialStats>,
) -> Result<Json<Stats>, AppError> {
    let status = mutate_user(&state, &user_id, |user| Ok(user.set_status(&values))).await?;
    Ok(Json(status))
}

pub async fn add_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(delta): Json<PartialStats>,
) -> Result<Json<Stats>, AppError> {
    let status = mutate_user(&state, &user_id, |user| Ok(user.add_status(delta.or_zero()))).await?;
    Ok(Json(status))
}

pub async fn reset_status(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Stats>, AppError> {
    let status = mutate_user(&state, &user_id, |user| Ok(user.reset_status())).await?;
    Ok(Json(status))
}

pub async fn adjust_stat(
    State(state): State<AppState>,
    Path((user_id, stat)): Path<(String, String)>,
    Json(payload): Json<AdjustRequest>,
) -> Result<Json<Stats>, AppError> {
    let kind = parse_stat(&stat)?;
    let status =
        mutate_user(&state, &user_id, |user| Ok(user.adjust_stat(kind, payload.amount))).await?;
    Ok(Json(status))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let data = state.data.lock().await;
    let (user_name, post_count) = data
        .user(&user_id)
        .map(|user| (user.user_name.clone(), user.posts.len()))
        .unwrap_or_else(|| (user_id.clone(), 0));
    Ok(Json(ProfileResponse {
        user_id,
        user_name,
        post_count,
    }))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Json<ProfileResponse>, AppError> {
    let (user_name, post_count) = mutate_user(&state, &user_id, |user| {
        user.rename(&payload.user_name)?;
        Ok((user.user_name.clone(), user.posts.len()))
    })
    .await?;
    Ok(Json(ProfileResponse {
        user_id: validate_user_id(&user_id)?,
        user_name,
        post_count,
    }))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<PostQuery>,
) -> Result<Json<PostListResponse>, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let data = state.data.lock().await;
    let posts = match data.user(&user_id) {
        Some(user) => user.list_posts(&query)?,
        None => Vec::new(),
    };
    Ok(Json(PostListResponse {
        count: posts.len(),
        posts,
    }))
}

pub async fn create_post(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<NewPost>,
) -> Result<Json<PostChangeResponse>, AppError> {
    Ok(Json(create_post_for(&state, &user_id, payload).await?))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(String, String)>,
) -> Result<Json<Post>, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let data = state.data.lock().await;
    let user = data
        .user(&user_id)
        .ok_or_else(|| AppError::not_found(format!("post not found: {id}")))?;
    Ok(Json(user.post(&id)?.clone()))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(String, String)>,
    Json(payload): Json<PostUpdate>,
) -> Result<Json<PostChangeResponse>, AppError> {
    let (post, status) = mutate_user(&state, &user_id, |user| {
        let post = user.update_post(&id, payload)?;
        Ok((post, user.status))
    })
    .await?;
    info!(user = %user_id, post = %post.id, "post updated");
    Ok(Json(PostChangeResponse { post, status }))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>, AppError> {
    let status = mutate_user(&state, &user_id, |user| {
        user.delete_post(&id)?;
        Ok(user.status)
    })
    .await?;
    info!(user = %user_id, post = %id, "post deleted");
    Ok(Json(DeleteResponse { id, status }))
}

/// Returns the cached comment when present; otherwise asks the model and
/// stores its answer on the post.
pub async fn comment_post(
    State(state): State<AppState>,
    Path((user_id, id)): Path<(String, String)>,
) -> Result<Json<CommentResponse>, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let post = {
        let data = state.data.lock().await;
        let user = data
            .user(&user_id)
            .ok_or_else(|| AppError::not_found(format!("post not found: {id}")))?;
        user.post(&id)?.clone()
    };

    if let Some(comment) = post.ai_comment.clone() {
        return Ok(Json(CommentResponse {
            id,
            comment,
            cached: true,
        }));
    }

    let model = require_model(&state)?;
    let comment = generate_comment(model.as_ref(), &post).await?;
    let stored = mutate_user(&state, &user_id, |user| {
        user.set_comment(&id, &post.episode, comment.clone())
    })
    .await?;
    if !stored {
        info!(user = %user_id, post = %id, "episode edited during comment request; not caching");
    }
    Ok(Json(CommentResponse {
        id,
        comment,
        cached: false,
    }))
}

pub async fn analyze(
    State(state): State<AppState>,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<Stats>, AppError> {
    if payload.episode.trim().is_empty() {
        return Err(AiError::EmptyInput.into());
    }
    let model = require_model(&state)?;
    Ok(Json(analyze_episode(model.as_ref(), &payload.episode).await?))
}

pub async fn get_calendar(
    State(state): State<AppState>,
    Path((user_id, month)): Path<(String, String)>,
) -> Result<Json<CalendarResponse>, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let data = state.data.lock().await;
    let calendar = match data.user(&user_id) {
        Some(user) => build_calendar(user, &month)?,
        None => build_calendar(&UserData::new(&user_id), &month)?,
    };
    Ok(Json(calendar))
}

pub async fn get_trends(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<TrendsResponse>, AppError> {
    let user_id = validate_user_id(&user_id)?;
    let data = state.data.lock().await;
    let trends = match data.user(&user_id) {
        Some(user) => build_trends(user),
        None => build_trends(&UserData::new(&user_id)),
    };
    Ok(Json(trends))
}

async fn create_post_for(
    state: &AppState,
    user_id: &str,
    input: NewPost,
) -> Result<PostChangeResponse, AppError> {
    let (post, status) = mutate_user(state, user_id, |user| {
        let post = user.create_post(input, Local::now())?;
        Ok((post, user.status))
    })
    .await?;
    info!(user = %user_id, post = %post.id, date = %post.date, "post created");
    Ok(PostChangeResponse { post, status })
}

/// Runs `apply` against the user's record and persists the document when it
/// succeeds. A missing user is only inserted if `apply` succeeds.
async fn mutate_user<T>(
    state: &AppState,
    user_id: &str,
    apply: impl FnOnce(&mut UserData) -> Result<T, AppError>,
) -> Result<T, AppError> {
    let user_id = validate_user_id(user_id)?;
    let mut data = state.data.lock().await;
    let result = match data.users.get_mut(&user_id) {
        Some(user) => apply(user)?,
        None => {
            let mut user = UserData::new(&user_id);
            let result = apply(&mut user)?;
            data.users.insert(user_id, user);
            result
        }
    };
    persist_data(&state.data_path, &data).await?;
    Ok(result)
}

fn require_model(state: &AppState) -> Result<Arc<dyn GenerativeModel>, AppError> {
    state
        .model
        .clone()
        .ok_or_else(|| AiError::NotConfigured.into())
}

fn parse_stat(value: &str) -> Result<StatKind, AppError> {
    StatKind::parse(value).ok_or_else(|| {
        AppError::bad_request("stat must be one of health, happiness, mentalState, hunger")
    })
}

fn validate_user_id(user_id: &str) -> Result<String, AppError> {
    let user_id = user_id.trim();
    let valid = !user_id.is_empty()
        && user_id.len() <= USER_ID_MAX_LEN
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if !valid {
        return Err(AppError::bad_request(
            "user id must be 1-64 characters of letters, digits, '-', '_' or '.'",
        ));
    }
    Ok(user_id.to_string())
}
