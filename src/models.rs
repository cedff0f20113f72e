use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const STAT_MIN: i64 = 0;
pub const STAT_MAX: i64 = 100;
pub const DELTA_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatKind {
    Health,
    Happiness,
    MentalState,
    Hunger,
}

impl StatKind {
    pub const ALL: [StatKind; 4] = [
        StatKind::Health,
        StatKind::Happiness,
        StatKind::MentalState,
        StatKind::Hunger,
    ];

    pub fn key(self) -> &'static str {
        match self {
            StatKind::Health => "health",
            StatKind::Happiness => "happiness",
            StatKind::MentalState => "mentalState",
            StatKind::Hunger => "hunger",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StatKind::Health => "Health",
            StatKind::Happiness => "Happiness",
            StatKind::MentalState => "Mental state",
            StatKind::Hunger => "Hunger",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == value.trim())
    }
}

/// One value per stat. Used both for a user's absolute status and for the
/// deltas recorded on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Stats {
    pub health: i64,
    pub happiness: i64,
    pub mental_state: i64,
    pub hunger: i64,
}

impl Stats {
    pub const INITIAL: Stats = Stats {
        health: 100,
        happiness: 50,
        mental_state: 25,
        hunger: 10,
    };

    pub fn get(&self, kind: StatKind) -> i64 {
        match kind {
            StatKind::Health => self.health,
            StatKind::Happiness => self.happiness,
            StatKind::MentalState => self.mental_state,
            StatKind::Hunger => self.hunger,
        }
    }

    pub fn get_mut(&mut self, kind: StatKind) -> &mut i64 {
        match kind {
            StatKind::Health => &mut self.health,
            StatKind::Happiness => &mut self.happiness,
            StatKind::MentalState => &mut self.mental_state,
            StatKind::Hunger => &mut self.hunger,
        }
    }

    pub fn map(self, f: impl Fn(i64) -> i64) -> Stats {
        Stats {
            health: f(self.health),
            happiness: f(self.happiness),
            mental_state: f(self.mental_state),
            hunger: f(self.hunger),
        }
    }

    pub fn zip(self, other: Stats, f: impl Fn(i64, i64) -> i64) -> Stats {
        Stats {
            health: f(self.health, other.health),
            happiness: f(self.happiness, other.happiness),
            mental_state: f(self.mental_state, other.mental_state),
            hunger: f(self.hunger, other.hunger),
        }
    }

    pub fn plus(self, other: Stats) -> Stats {
        self.zip(other, i64::saturating_add)
    }

    pub fn minus(self, other: Stats) -> Stats {
        self.zip(other, i64::saturating_sub)
    }

    pub fn clamped_status(self) -> Stats {
        self.map(|value| value.clamp(STAT_MIN, STAT_MAX))
    }

    pub fn clamped_delta(self) -> Stats {
        self.map(|value| value.clamp(-DELTA_LIMIT, DELTA_LIMIT))
    }

    pub fn is_zero(&self) -> bool {
        *self == Stats::default()
    }
}

/// Sparse stat set: only the provided keys are applied.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialStats {
    pub health: Option<i64>,
    pub happiness: Option<i64>,
    pub mental_state: Option<i64>,
    pub hunger: Option<i64>,
}

impl PartialStats {
    pub fn get(&self, kind: StatKind) -> Option<i64> {
        match kind {
            StatKind::Health => self.health,
            StatKind::Happiness => self.happiness,
            StatKind::MentalState => self.mental_state,
            StatKind::Hunger => self.hunger,
        }
    }

    pub fn or_zero(&self) -> Stats {
        Stats {
            health: self.health.unwrap_or(0),
            happiness: self.happiness.unwrap_or(0),
            mental_state: self.mental_state.unwrap_or(0),
            hunger: self.hunger.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub timestamp: String,
    pub date: String,
    pub time: String,
    pub episode: String,
    pub parameters: Stats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserData {
    pub user_name: String,
    pub status: Stats,
    #[serde(default)]
    pub posts: BTreeMap<String, Post>,
}

impl UserData {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_name: user_id.to_string(),
            status: Stats::INITIAL,
            posts: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppData {
    #[serde(default)]
    pub users: BTreeMap<String, UserData>,
}

impl AppData {
    pub fn user(&self, user_id: &str) -> Option<&UserData> {
        self.users.get(user_id)
    }

    /// Returns the user's record, creating it with default status on first use.
    pub fn user_mut(&mut self, user_id: &str) -> &mut UserData {
        self.users
            .entry(user_id.to_string())
            .or_insert_with(|| UserData::new(user_id))
    }
}

#[derive(Debug, Deserialize)]
pub struct NewPost {
    pub episode: String,
    pub date: Option<String>,
    pub time: Option<String>,
    #[serde(default)]
    pub parameters: PartialStats,
}

#[derive(Debug, Deserialize, Default)]
pub struct PostUpdate {
    pub episode: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub parameters: Option<PartialStats>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PostQuery {
    pub date: Option<String>,
    pub month: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub user_name: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub episode: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user_id: String,
    pub user_name: String,
    pub post_count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostListResponse {
    pub count: usize,
    pub posts: Vec<Post>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostChangeResponse {
    pub post: Post,
    pub status: Stats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub id: String,
    pub status: Stats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: String,
    pub comment: String,
    pub cached: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CalendarDay {
    pub date: String,
    pub post_count: usize,
    pub deltas: Stats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CalendarResponse {
    pub month: String,
    pub days: Vec<CalendarDay>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: String,
    pub post_count: usize,
    pub deltas: Stats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeeklyPoint {
    pub week: String,
    pub start_date: String,
    pub end_date: String,
    pub post_count: usize,
    pub deltas: Stats,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeeklyAverages {
    pub health: f64,
    pub happiness: f64,
    pub mental_state: f64,
    pub hunger: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WeeklyAveragePoint {
    pub week: String,
    pub days_counted: u8,
    pub averages: WeeklyAverages,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TrendsResponse {
    pub status: Stats,
    pub last_7_days: Vec<DailyPoint>,
    pub weekly_totals: Vec<WeeklyPoint>,
    pub weekly_averages: Vec<WeeklyAveragePoint>,
}
