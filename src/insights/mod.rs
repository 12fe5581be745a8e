pub mod report;

use crate::calendar::DayClock;
use crate::db::Database;
use crate::insights::report::{InsightRange, InsightsReport};
use crate::streak::JOURNAL_ACTIVITY;
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Builds the insights report for the window of `range` ending on the local
/// day of `now`.
pub fn generate_insights(
    database: &Database,
    clock: &DayClock,
    range: InsightRange,
    now: DateTime<Utc>,
) -> Result<InsightsReport> {
    let today = clock.local_day_of(now);
    let (window_start, window_end) = range.window(today);
    let week = report::current_week(today);

    // The current week may reach past today and before the window start.
    let from = week
        .first()
        .copied()
        .map_or(window_start, |monday| monday.min(window_start));
    let to = week
        .last()
        .copied()
        .map_or(window_end, |sunday| sunday.max(window_end));

    let entries = database.list_diary_entries(Some((clock.start_of(from), clock.end_of(to))), None)?;
    let tasks = database.tasks_between(clock.start_of(from), clock.end_of(to))?;
    let journal = database.get_streak(JOURNAL_ACTIVITY)?;

    Ok(report::build_insights(
        range,
        today,
        clock,
        &entries,
        &tasks,
        journal.as_ref(),
        now,
    ))
}

#[cfg(test)]
mod tests {
    use super::generate_insights;
    use crate::calendar::DayClock;
    use crate::db::test_support::temp_database;
    use crate::db::{Mood, NewDiaryEntry};
    use crate::insights::report::InsightRange;
    use chrono::{DateTime, Duration, Utc};

    fn instant(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .expect("valid rfc3339")
            .with_timezone(&Utc)
    }

    #[test]
    fn reads_entries_and_journal_streak_from_storage() {
        let (_dir, mut database) = temp_database();
        let clock = DayClock::new(330).expect("valid offset");
        let now = instant("2024-05-08T06:30:00Z");

        for days_back in 0..3 {
            let date = now - Duration::days(days_back);
            database
                .create_diary_entry(
                    &NewDiaryEntry {
                        title: None,
                        content: format!("day {days_back}"),
                        mood: Some(Mood::Happy),
                        mood_score: Some(8),
                        prompt: None,
                        weather: None,
                        location: None,
                        date,
                    },
                    date,
                )
                .expect("create");
        }
        for days_back in (0..3).rev() {
            database
                .record_activity("journal", now - Duration::days(days_back), &clock)
                .expect("streak");
        }

        let report = generate_insights(&database, &clock, InsightRange::Week, now).expect("insights");

        assert_eq!(report.to, "2024-05-08");
        assert_eq!(report.journal_entries, 3);
        assert_eq!(report.moods.counts.get("happy"), Some(&3));
        assert_eq!(report.journal_streak.current, 3);
        assert_eq!(report.journal_streak.longest, 3);
        // Mon 2024-05-06 .. Wed 2024-05-08 each carry one entry.
        assert_eq!(
            report
                .weekly_activity
                .iter()
                .map(|day| day.entries)
                .collect::<Vec<_>>(),
            vec![1, 1, 1, 0, 0, 0, 0]
        );
    }
}
