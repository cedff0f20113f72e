use crate::errors::AppError;
use crate::models::{
    NewPost, PartialStats, Post, PostQuery, PostUpdate, StatKind, Stats, UserData,
};
use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use std::cmp::Reverse;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";
pub const MONTH_FORMAT: &str = "%Y-%m";

impl UserData {
    pub fn set_status(&mut self, values: &PartialStats) -> Stats {
        for kind in StatKind::ALL {
            if let Some(value) = values.get(kind) {
                *self.status.get_mut(kind) = value;
            }
        }
        self.status = self.status.clamped_status();
        self.status
    }

    pub fn add_status(&mut self, delta: Stats) -> Stats {
        self.status = self.status.plus(delta).clamped_status();
        self.status
    }

    pub fn adjust_stat(&mut self, kind: StatKind, amount: i64) -> Stats {
        let value = self.status.get_mut(kind);
        *value = value.saturating_add(amount);
        self.status = self.status.clamped_status();
        self.status
    }

    pub fn reset_status(&mut self) -> Stats {
        self.status = Stats::INITIAL;
        self.status
    }

    pub fn rename(&mut self, user_name: &str) -> Result<(), AppError> {
        let user_name = user_name.trim();
        if user_name.is_empty() {
            return Err(AppError::bad_request("user_name must not be empty"));
        }
        self.user_name = user_name.to_string();
        Ok(())
    }

    /// Records a new episode and applies its deltas to the status.
    pub fn create_post(&mut self, input: NewPost, now: DateTime<Local>) -> Result<Post, AppError> {
        let episode = required_episode(&input.episode)?;
        let date = match input.date.as_deref().map(str::trim).filter(|d| !d.is_empty()) {
            Some(date) => validate_date(date)?,
            None => now.format(DATE_FORMAT).to_string(),
        };
        let time = match input.time.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(time) => validate_time(time)?,
            None => now.format(TIME_FORMAT).to_string(),
        };

        let post = Post {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now.to_rfc3339(),
            date,
            time,
            episode,
            parameters: input.parameters.or_zero(),
            ai_comment: None,
        };

        self.add_status(post.parameters);
        self.posts.insert(post.id.clone(), post.clone());
        Ok(post)
    }

    /// Applies an edit. The status moves by the difference between the new
    /// and old deltas.
    pub fn update_post(&mut self, id: &str, update: PostUpdate) -> Result<Post, AppError> {
        let existing = self
            .posts
            .get(id)
            .cloned()
            .ok_or_else(|| post_not_found(id))?;
        let mut post = existing.clone();

        if let Some(episode) = update.episode.as_deref() {
            let episode = required_episode(episode)?;
            if episode != post.episode {
                post.ai_comment = None;
            }
            post.episode = episode;
        }
        if let Some(date) = update.date.as_deref() {
            post.date = validate_date(date.trim())?;
        }
        if let Some(time) = update.time.as_deref() {
            post.time = validate_time(time.trim())?;
        }
        if let Some(parameters) = update.parameters {
            for kind in StatKind::ALL {
                if let Some(value) = parameters.get(kind) {
                    *post.parameters.get_mut(kind) = value;
                }
            }
        }

        self.add_status(post.parameters.minus(existing.parameters));
        self.posts.insert(post.id.clone(), post.clone());
        Ok(post)
    }

    /// Removes a post and reverts its deltas.
    pub fn delete_post(&mut self, id: &str) -> Result<Post, AppError> {
        let post = self.posts.remove(id).ok_or_else(|| post_not_found(id))?;
        self.add_status(Stats::default().minus(post.parameters));
        Ok(post)
    }

    pub fn post(&self, id: &str) -> Result<&Post, AppError> {
        self.posts.get(id).ok_or_else(|| post_not_found(id))
    }

    /// Caches `comment` on the post only while its episode still reads
    /// `generated_for`. Returns whether the comment was stored.
    pub fn set_comment(
        &mut self,
        id: &str,
        generated_for: &str,
        comment: String,
    ) -> Result<bool, AppError> {
        let post = self.posts.get_mut(id).ok_or_else(|| post_not_found(id))?;
        if post.episode != generated_for {
            return Ok(false);
        }
        post.ai_comment = Some(comment);
        Ok(true)
    }

    /// Timeline order: newest first.
    pub fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>, AppError> {
        let date = query
            .date
            .as_deref()
            .map(|d| validate_date(d.trim()))
            .transpose()?;
        let month = query
            .month
            .as_deref()
            .map(|m| validate_month(m.trim()).map(|(year, month)| format!("{year:04}-{month:02}-")))
            .transpose()?;

        let mut posts: Vec<Post> = self
            .posts
            .values()
            .filter(|post| date.as_ref().is_none_or(|d| &post.date == d))
            .filter(|post| month.as_ref().is_none_or(|m| post.date.starts_with(m.as_str())))
            .cloned()
            .collect();
        posts.sort_by_key(|post| Reverse((post.date.clone(), post.time.clone(), post.timestamp.clone())));
        Ok(posts)
    }
}

fn post_not_found(id: &str) -> AppError {
    AppError::not_found(format!("post not found: {id}"))
}

fn required_episode(episode: &str) -> Result<String, AppError> {
    let episode = episode.trim();
    if episode.is_empty() {
        return Err(AppError::bad_request("episode must not be empty"));
    }
    Ok(episode.to_string())
}

pub fn validate_date(value: &str) -> Result<String, AppError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .ok()
        .map(|date| date.format(DATE_FORMAT).to_string())
        .filter(|normalized| normalized == value)
        .ok_or_else(|| AppError::bad_request(format!("date must be YYYY-MM-DD, got '{value}'")))
}

pub fn validate_time(value: &str) -> Result<String, AppError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .ok()
        .map(|time| time.format(TIME_FORMAT).to_string())
        .filter(|normalized| normalized == value)
        .ok_or_else(|| AppError::bad_request(format!("time must be HH:MM, got '{value}'")))
}

/// Parses `YYYY-MM` into (year, month).
pub fn validate_month(value: &str) -> Result<(i32, u32), AppError> {
    let invalid = || AppError::bad_request(format!("month must be YYYY-MM, got '{value}'"));
    let (year, month) = value.split_once('-').ok_or_else(invalid)?;
    let digits = |part: &str, len: usize| part.len() == len && part.bytes().all(|b| b.is_ascii_digit());
    if !digits(year, 4) || !digits(month, 2) {
        return Err(invalid());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    let month: u32 = month.parse().map_err(|_| invalid())?;
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    Ok((year, month))
}
