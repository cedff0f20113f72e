use crate::diary::validate_month;
use crate::errors::AppError;
use crate::models::{
    CalendarDay, CalendarResponse, DailyPoint, Stats, TrendsResponse, UserData, WeeklyAverages,
    WeeklyAveragePoint, WeeklyPoint,
};
use chrono::{Datelike, Duration, Local, NaiveDate};
use std::collections::BTreeMap;

const WEEK_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
struct DayTotals {
    post_count: usize,
    deltas: Stats,
}

fn daily_totals(user: &UserData) -> BTreeMap<String, DayTotals> {
    let mut days: BTreeMap<String, DayTotals> = BTreeMap::new();
    for post in user.posts.values() {
        let day = days.entry(post.date.clone()).or_default();
        day.post_count += 1;
        day.deltas = day.deltas.plus(post.parameters);
    }
    days
}

pub fn build_trends(user: &UserData) -> TrendsResponse {
    build_trends_at(Local::now().date_naive(), user)
}

pub fn build_trends_at(today: NaiveDate, user: &UserData) -> TrendsResponse {
    let days = daily_totals(user);
    let totals_for = |date: NaiveDate| days.get(&date_key(date)).copied().unwrap_or_default();

    let mut last_7_days = Vec::with_capacity(7);
    for offset in (0..7).rev() {
        let date = today - Duration::days(offset);
        let totals = totals_for(date);
        last_7_days.push(DailyPoint {
            date: date_key(date),
            post_count: totals.post_count,
            deltas: totals.deltas,
        });
    }

    let current_week_start = week_start(today);
    let mut weekly_totals = Vec::with_capacity(WEEK_COUNT);
    let mut weekly_averages = Vec::with_capacity(WEEK_COUNT);

    for offset in (0..WEEK_COUNT).rev() {
        let start = current_week_start - Duration::weeks(offset as i64);
        let end = start + Duration::days(6);

        let mut week = DayTotals::default();
        for day_offset in 0..7 {
            let totals = totals_for(start + Duration::days(day_offset));
            week.post_count += totals.post_count;
            week.deltas = week.deltas.plus(totals.deltas);
        }

        let days_counted = if today < start {
            0
        } else if today > end {
            7
        } else {
            (today - start).num_days() as u8 + 1
        };
        let denom = if days_counted == 0 { 1.0 } else { f64::from(days_counted) };

        weekly_totals.push(WeeklyPoint {
            week: week_label(start),
            start_date: date_key(start),
            end_date: date_key(end),
            post_count: week.post_count,
            deltas: week.deltas,
        });

        weekly_averages.push(WeeklyAveragePoint {
            week: week_label(start),
            days_counted,
            averages: WeeklyAverages {
                health: week.deltas.health as f64 / denom,
                happiness: week.deltas.happiness as f64 / denom,
                mental_state: week.deltas.mental_state as f64 / denom,
                hunger: week.deltas.hunger as f64 / denom,
            },
        });
    }

    TrendsResponse {
        status: user.status,
        last_7_days,
        weekly_totals,
        weekly_averages,
    }
}

/// One entry per day of `month` (`YYYY-MM`).
pub fn build_calendar(user: &UserData, month: &str) -> Result<CalendarResponse, AppError> {
    let (year, month_number) = validate_month(month.trim())?;
    let days = daily_totals(user);

    let mut entries = Vec::with_capacity(31);
    let mut date = NaiveDate::from_ymd_opt(year, month_number, 1)
        .ok_or_else(|| AppError::bad_request(format!("invalid month '{month}'")))?;
    while date.month() == month_number {
        let totals = days.get(&date_key(date)).copied().unwrap_or_default();
        entries.push(CalendarDay {
            date: date_key(date),
            post_count: totals.post_count,
            deltas: totals.deltas,
        });
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    Ok(CalendarResponse {
        month: format!("{year:04}-{month_number:02}"),
        days: entries,
    })
}

fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

fn week_label(date: NaiveDate) -> String {
    let iso = date.iso_week();
    format!("{}-W{:02}", iso.year(), iso.week())
}
