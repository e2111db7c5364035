use std::collections::BTreeMap;

use axum::{extract::State, Json};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::handlers::round2;
use crate::services::ai::{parse_json_reply, AiGateway, AiJson};
use crate::AppState;

/// Daily rows returned to the client; older history still feeds the
/// aggregates.
const RECENT_DAYS: usize = 30;

/// Daily rows summarized in the AI prompt.
const PROMPT_DAYS: usize = 7;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAverage {
    pub date: NaiveDate,
    pub average_mood: f64,
    pub entry_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsResponse {
    pub average_mood: f64,
    pub streak: i64,
    pub total_days: i64,
    pub total_entries: i64,
    pub daily_averages: Vec<DailyAverage>,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub source: String, // "ai" or "computed"
}

#[derive(Debug, Deserialize)]
struct AiSummaryPayload {
    insights: Vec<String>,
    recommendations: Vec<String>,
}

pub async fn get_insights(State(state): State<AppState>) -> AppResult<Json<InsightsResponse>> {
    let rows = sqlx::query_as::<_, (DateTime<Utc>, i32)>(
        r#"SELECT "timestamp", mood FROM mood_entries ORDER BY "timestamp" DESC"#,
    )
    .fetch_all(&state.db)
    .await?;

    let entries: Vec<(NaiveDate, i32)> = rows
        .iter()
        .map(|(timestamp, mood)| (timestamp.date_naive(), *mood))
        .collect();

    let daily = daily_averages(&entries);
    let today = Utc::now().date_naive();
    let streak = current_streak(&daily, today);
    let average_mood = overall_average(&daily);
    let total_days = daily.len() as i64;
    let total_entries = entries.len() as i64;

    let (insights, recommendations, source) = match ai_summary(&state.ai, &daily).await {
        Some(payload) => (payload.insights, payload.recommendations, "ai"),
        None => {
            let (insights, recommendations) =
                computed_summary(average_mood, streak, total_days);
            (insights, recommendations, "computed")
        }
    };

    let mut daily_averages = daily;
    daily_averages.truncate(RECENT_DAYS);

    Ok(Json(InsightsResponse {
        average_mood,
        streak,
        total_days,
        total_entries,
        daily_averages,
        insights,
        recommendations,
        source: source.into(),
    }))
}

/// Group entries by calendar date, most recent date first.
fn daily_averages(entries: &[(NaiveDate, i32)]) -> Vec<DailyAverage> {
    let mut by_day: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
    for (date, mood) in entries {
        let slot = by_day.entry(*date).or_insert((0, 0));
        slot.0 += *mood as i64;
        slot.1 += 1;
    }

    by_day
        .into_iter()
        .rev()
        .map(|(date, (sum, count))| DailyAverage {
            date,
            average_mood: round2(sum as f64 / count as f64),
            entry_count: count,
        })
        .collect()
}

/// Consecutive days with at least one entry, walking backward from today.
/// The walk stops at the first missing day, today included.
fn current_streak(daily_desc: &[DailyAverage], today: NaiveDate) -> i64 {
    let mut streak = 0;
    let mut check_date = today;

    for row in daily_desc {
        if row.date == check_date {
            streak += 1;
            check_date -= Duration::days(1);
        } else if row.date < check_date {
            break;
        }
    }

    streak
}

/// Mean of the daily means. Each day weighs equally no matter how many
/// entries were logged on it.
fn overall_average(daily: &[DailyAverage]) -> f64 {
    if daily.is_empty() {
        return 0.0;
    }
    let sum: f64 = daily.iter().map(|d| d.average_mood).sum();
    round2(sum / daily.len() as f64)
}

async fn ai_summary(ai: &AiGateway, daily: &[DailyAverage]) -> Option<AiSummaryPayload> {
    if daily.is_empty() {
        return None;
    }

    let text = match ai.generate_text(&summary_prompt(daily)).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "AI summary unavailable, using computed fallback");
            return None;
        }
    };

    match parse_json_reply::<AiSummaryPayload>(&text) {
        AiJson::Parsed(payload) if !payload.insights.is_empty() => Some(payload),
        AiJson::Parsed(_) => {
            tracing::warn!("AI summary was empty, using computed fallback");
            None
        }
        AiJson::ParseFailure(_) => {
            tracing::warn!("AI summary was not valid JSON, using computed fallback");
            None
        }
    }
}

fn summary_prompt(daily: &[DailyAverage]) -> String {
    let lines: Vec<String> = daily
        .iter()
        .take(PROMPT_DAYS)
        .map(|d| {
            format!(
                "- {}: average mood {:.2} out of 4 across {} entries",
                d.date, d.average_mood, d.entry_count
            )
        })
        .collect();

    format!(
        r#"You are a supportive mood-journal coach. A user's mood scale runs 0 (very sad) to 4 (very happy). Their recent daily averages, most recent first:
{}

Respond with JSON only, exactly this schema:
{{"insights": ["observation 1", "observation 2"], "recommendations": ["suggestion 1", "suggestion 2"]}}"#,
        lines.join("\n")
    )
}

fn computed_summary(
    average_mood: f64,
    streak: i64,
    total_days: i64,
) -> (Vec<String>, Vec<String>) {
    let first = if total_days == 0 {
        "You haven't logged any moods yet. Your first entry starts the picture.".to_string()
    } else {
        format!(
            "Your average mood across {} tracked day{} is {:.1} out of 4.",
            total_days,
            if total_days == 1 { "" } else { "s" },
            average_mood
        )
    };

    let second = if streak > 1 {
        format!(
            "You're on a {}-day logging streak — keep the chain going.",
            streak
        )
    } else {
        "Logging every day, even briefly, makes the trends much more meaningful.".to_string()
    };

    let recommendations = vec![
        "Pair a tough day with one small comfort: a walk, a favorite song, a short break.".into(),
        "Add a note to your entries — patterns usually hide in the context.".into(),
    ];

    (vec![first, second], recommendations)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ── daily_averages ───────────────────────────────────────────────────

    #[test]
    fn test_daily_averages_same_day_entries_merge() {
        let entries = vec![(day(2026, 8, 1), 1), (day(2026, 8, 1), 3)];
        let daily = daily_averages(&entries);
        assert_eq!(daily.len(), 1);
        assert_eq!(daily[0].average_mood, 2.0);
        assert_eq!(daily[0].entry_count, 2);
    }

    #[test]
    fn test_daily_averages_most_recent_first() {
        let entries = vec![
            (day(2026, 8, 1), 2),
            (day(2026, 8, 3), 4),
            (day(2026, 8, 2), 0),
        ];
        let daily = daily_averages(&entries);
        let dates: Vec<NaiveDate> = daily.iter().map(|d| d.date).collect();
        assert_eq!(
            dates,
            vec![day(2026, 8, 3), day(2026, 8, 2), day(2026, 8, 1)]
        );
    }

    #[test]
    fn test_daily_averages_rounds_to_two_decimals() {
        let entries = vec![
            (day(2026, 8, 1), 1),
            (day(2026, 8, 1), 1),
            (day(2026, 8, 1), 2),
        ];
        let daily = daily_averages(&entries);
        assert_eq!(daily[0].average_mood, 1.33);
    }

    #[test]
    fn test_daily_averages_empty() {
        assert!(daily_averages(&[]).is_empty());
    }

    // ── current_streak ───────────────────────────────────────────────────

    #[test]
    fn test_streak_breaks_at_first_gap() {
        let today = day(2026, 8, 7);
        let entries = vec![
            (today, 2),
            (day(2026, 8, 6), 3),
            (day(2026, 8, 5), 1),
            (day(2026, 8, 3), 4), // gap on the 4th
        ];
        let daily = daily_averages(&entries);
        assert_eq!(current_streak(&daily, today), 3);
    }

    #[test]
    fn test_streak_zero_without_entry_today() {
        let today = day(2026, 8, 7);
        let entries = vec![(day(2026, 8, 6), 2), (day(2026, 8, 5), 2)];
        let daily = daily_averages(&entries);
        assert_eq!(current_streak(&daily, today), 0);
    }

    #[test]
    fn test_streak_single_day() {
        let today = day(2026, 8, 7);
        let daily = daily_averages(&[(today, 0)]);
        assert_eq!(current_streak(&daily, today), 1);
    }

    #[test]
    fn test_streak_empty() {
        assert_eq!(current_streak(&[], day(2026, 8, 7)), 0);
    }

    // ── overall_average ──────────────────────────────────────────────────

    #[test]
    fn test_overall_average_weights_days_equally() {
        // Three entries at 0 on one day, a single 4 on another. A raw mean
        // would say 1.0; day-weighting says 2.0.
        let entries = vec![
            (day(2026, 8, 1), 0),
            (day(2026, 8, 1), 0),
            (day(2026, 8, 1), 0),
            (day(2026, 8, 2), 4),
        ];
        let daily = daily_averages(&entries);
        assert_eq!(overall_average(&daily), 2.0);
    }

    #[test]
    fn test_overall_average_single_day() {
        let entries = vec![(day(2026, 8, 1), 1), (day(2026, 8, 1), 3)];
        let daily = daily_averages(&entries);
        assert_eq!(overall_average(&daily), 2.0);
    }

    #[test]
    fn test_overall_average_empty() {
        assert_eq!(overall_average(&[]), 0.0);
    }

    // ── prompt & fallback ────────────────────────────────────────────────

    #[test]
    fn test_summary_prompt_caps_at_seven_days() {
        let entries: Vec<(NaiveDate, i32)> =
            (1..=20).map(|d| (day(2026, 7, d), 2)).collect();
        let daily = daily_averages(&entries);
        let prompt = summary_prompt(&daily);
        assert_eq!(prompt.matches("average mood").count(), 7);
        // Most recent day is included, the oldest is not
        assert!(prompt.contains("2026-07-20"));
        assert!(!prompt.contains("2026-07-01"));
    }

    #[test]
    fn test_computed_summary_always_two_of_each() {
        let (insights, recommendations) = computed_summary(2.5, 4, 10);
        assert_eq!(insights.len(), 2);
        assert_eq!(recommendations.len(), 2);
        assert!(insights[0].contains("2.5"));
        assert!(insights[1].contains("4-day"));

        let (insights, recommendations) = computed_summary(0.0, 0, 0);
        assert_eq!(insights.len(), 2);
        assert_eq!(recommendations.len(), 2);
    }
}
