use crate::calendar::{DayClock, day_key};
use crate::db::{DiaryEntry, Priority, StreakRecord, Task};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightRange {
    #[default]
    Week,
    Month,
    Year,
}

impl InsightRange {
    pub fn days(self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Year => 365,
        }
    }

    /// Inclusive first and last local day of the window ending on `today`.
    pub fn window(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        (today - Duration::days(self.days() - 1), today)
    }
}

impl fmt::Display for InsightRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        })
    }
}

impl FromStr for InsightRange {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            other => Err(format!("Unknown range: {other}. Expected week|month|year")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodMetric {
    pub mood: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodSummary {
    pub counts: BTreeMap<String, u64>,
    pub total: u64,
    pub most_common: Option<MoodMetric>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub total: u64,
    pub completed: u64,
    pub completion_rate: u64,
    pub by_priority: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayActivity {
    pub day: String,
    pub weekday: String,
    pub entries: u64,
    pub completed_tasks: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakSummary {
    pub current: u32,
    pub longest: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsReport {
    pub range: InsightRange,
    pub from: String,
    pub to: String,
    pub generated_at: String,
    pub journal_entries: u64,
    pub moods: MoodSummary,
    pub tasks: TaskSummary,
    pub weekly_activity: Vec<DayActivity>,
    pub journal_streak: StreakSummary,
    pub highlights: Vec<String>,
}

/// Monday..Sunday of the local week containing `today`.
pub fn current_week(today: NaiveDate) -> Vec<NaiveDate> {
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    (0..7).map(|offset| monday + Duration::days(offset)).collect()
}

pub fn build_insights(
    range: InsightRange,
    today: NaiveDate,
    clock: &DayClock,
    entries: &[DiaryEntry],
    tasks: &[Task],
    journal_streak: Option<&StreakRecord>,
    generated_at: DateTime<Utc>,
) -> InsightsReport {
    let (from, to) = range.window(today);
    let in_window = |instant: DateTime<Utc>| {
        let day = clock.local_day_of(instant);
        from <= day && day <= to
    };

    let window_entries = entries
        .iter()
        .filter(|entry| in_window(entry.date))
        .collect::<Vec<_>>();
    let window_tasks = tasks
        .iter()
        .filter(|task| in_window(task.date))
        .collect::<Vec<_>>();

    let moods = summarize_moods(&window_entries);
    let task_summary = summarize_tasks(&window_tasks);
    let weekly_activity = weekly_activity(today, clock, entries, tasks);
    let journal_streak = journal_streak
        .map(|record| StreakSummary {
            current: record.current_streak,
            longest: record.longest_streak,
        })
        .unwrap_or_default();

    let highlights = detect_highlights(&moods, &task_summary, journal_streak);

    InsightsReport {
        range,
        from: day_key(from),
        to: day_key(to),
        generated_at: generated_at.to_rfc3339(),
        journal_entries: window_entries.len() as u64,
        moods,
        tasks: task_summary,
        weekly_activity,
        journal_streak,
        highlights,
    }
}

fn summarize_moods(entries: &[&DiaryEntry]) -> MoodSummary {
    let counts = entries
        .iter()
        .filter_map(|entry| entry.mood)
        .fold(BTreeMap::new(), |mut acc, mood| {
            *acc.entry(mood.as_str().to_string()).or_insert(0_u64) += 1;
            acc
        });

    let total = counts.values().sum::<u64>();
    let most_common = counts
        .iter()
        .map(|(mood, count)| MoodMetric {
            mood: mood.clone(),
            count: *count,
        })
        .min_by(|left, right| {
            right
                .count
                .cmp(&left.count)
                .then_with(|| left.mood.cmp(&right.mood))
        });

    MoodSummary {
        counts,
        total,
        most_common,
    }
}

fn summarize_tasks(tasks: &[&Task]) -> TaskSummary {
    let total = tasks.len() as u64;
    let completed = tasks.iter().filter(|task| task.is_completed).count() as u64;

    let priority_counts = tasks.iter().fold(HashMap::new(), |mut acc, task| {
        *acc.entry(task.priority).or_insert(0_u64) += 1;
        acc
    });
    let by_priority = Priority::ALL
        .into_iter()
        .map(|priority| {
            (
                priority.as_str().to_string(),
                priority_counts.get(&priority).copied().unwrap_or_default(),
            )
        })
        .collect::<BTreeMap<_, _>>();

    TaskSummary {
        total,
        completed,
        completion_rate: percentage(completed, total),
        by_priority,
    }
}

fn weekly_activity(
    today: NaiveDate,
    clock: &DayClock,
    entries: &[DiaryEntry],
    tasks: &[Task],
) -> Vec<DayActivity> {
    let entries_by_day = entries.iter().fold(HashMap::new(), |mut acc, entry| {
        *acc.entry(clock.local_day_of(entry.date)).or_insert(0_u64) += 1;
        acc
    });
    let completed_by_day = tasks
        .iter()
        .filter(|task| task.is_completed)
        .fold(HashMap::new(), |mut acc, task| {
            *acc.entry(clock.local_day_of(task.date)).or_insert(0_u64) += 1;
            acc
        });

    current_week(today)
        .into_iter()
        .map(|day| {
            let entries = entries_by_day.get(&day).copied().unwrap_or_default();
            let completed_tasks = completed_by_day.get(&day).copied().unwrap_or_default();

            DayActivity {
                day: day_key(day),
                weekday: day.format("%a").to_string(),
                entries,
                completed_tasks,
                total: entries + completed_tasks,
            }
        })
        .collect()
}

fn detect_highlights(
    moods: &MoodSummary,
    tasks: &TaskSummary,
    journal_streak: StreakSummary,
) -> Vec<String> {
    let streak_highlight = (journal_streak.current >= 3).then(|| {
        format!(
            "Journaling streak is on: {} days in a row",
            journal_streak.current
        )
    });

    let record_highlight = (journal_streak.current > 1
        && journal_streak.current == journal_streak.longest)
        .then_some("Current journaling streak is your longest yet".to_string());

    let mood_highlight = moods
        .most_common
        .as_ref()
        .map(|metric| format!("Most common mood: {} ({}x)", metric.mood, metric.count));

    let completion_highlight = (tasks.total >= 5 && tasks.completion_rate < 50).then(|| {
        format!(
            "Task completion rate is low: {}% of {} tasks",
            tasks.completion_rate, tasks.total
        )
    });

    [
        streak_highlight,
        record_highlight,
        mood_highlight,
        completion_highlight,
    ]
    .into_iter()
    .flatten()
    .collect()
}

pub fn render_text(report: &InsightsReport) -> String {
    let mood_rows = if report.moods.counts.is_empty() {
        "- No mood data".to_string()
    } else {
        report
            .moods
            .counts
            .iter()
            .map(|(mood, count)| {
                format!(
                    "- {mood}: {count} ({}%)",
                    percentage(*count, report.moods.total)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    let week_rows = report
        .weekly_activity
        .iter()
        .map(|day| {
            format!(
                "- {} {}: {} entries, {} tasks done",
                day.weekday, day.day, day.entries, day.completed_tasks
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let highlight_rows = if report.highlights.is_empty() {
        "- Nothing notable yet".to_string()
    } else {
        report
            .highlights
            .iter()
            .map(|entry| format!("- {entry}"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Insights ({}: {} to {})\n\nJournal\n- Entries: {}\n- Streak: {} (longest {})\n\nMoods\n{}\n\nTasks\n- Completed: {}/{} ({}%)\n- High/Medium/Low: {}/{}/{}\n\nThis week\n{}\n\nHighlights\n{}\n",
        report.range,
        report.from,
        report.to,
        report.journal_entries,
        report.journal_streak.current,
        report.journal_streak.longest,
        mood_rows,
        report.tasks.completed,
        report.tasks.total,
        report.tasks.completion_rate,
        report.tasks.by_priority.get("high").copied().unwrap_or_default(),
        report.tasks.by_priority.get("medium").copied().unwrap_or_default(),
        report.tasks.by_priority.get("low").copied().unwrap_or_default(),
        week_rows,
        highlight_rows
    )
}

fn percentage(part: u64, total: u64) -> u64 {
    if total == 0 {
        0
    } else {
        ((part as f64 / total as f64) * 100.0).round() as u64
    }
}
