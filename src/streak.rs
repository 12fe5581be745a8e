use crate::calendar::DayClock;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const JOURNAL_ACTIVITY: &str = "journal";
pub const TASKS_ACTIVITY: &str = "tasks";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreakState {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakTransition {
    Started,
    SameDay,
    Extended,
    Reset,
}

impl StreakTransition {
    pub fn changes_state(self) -> bool {
        !matches!(self, Self::SameDay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreakAdvance {
    pub transition: StreakTransition,
    pub state: StreakState,
}

/// Applies one qualifying event at `now` to the prior streak state.
///
/// Days are compared as local calendar days of `clock`; "yesterday" is the
/// previous calendar day, not `now - 24h`. A second event on the same local
/// day leaves the state untouched, including `last_activity_at`.
pub fn advance(prior: Option<StreakState>, now: DateTime<Utc>, clock: &DayClock) -> StreakAdvance {
    let Some(prior) = prior else {
        return started(0, now);
    };

    let Some(last_activity_at) = prior.last_activity_at else {
        return started(prior.longest_streak, now);
    };

    let last_day = clock.local_day_of(last_activity_at);
    let today = clock.local_day_of(now);

    if last_day == today {
        return StreakAdvance {
            transition: StreakTransition::SameDay,
            state: prior,
        };
    }

    if clock.is_previous_day(last_day, today) {
        let current_streak = prior.current_streak.saturating_add(1);
        return StreakAdvance {
            transition: StreakTransition::Extended,
            state: StreakState {
                current_streak,
                longest_streak: current_streak.max(prior.longest_streak),
                last_activity_at: Some(now),
            },
        };
    }

    // Gaps and events dated before the last one (clock skew) both restart.
    StreakAdvance {
        transition: StreakTransition::Reset,
        state: StreakState {
            current_streak: 1,
            longest_streak: prior.longest_streak.max(1),
            last_activity_at: Some(now),
        },
    }
}

fn started(prior_longest: u32, now: DateTime<Utc>) -> StreakAdvance {
    StreakAdvance {
        transition: StreakTransition::Started,
        state: StreakState {
            current_streak: 1,
            longest_streak: prior_longest.max(1),
            last_activity_at: Some(now),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{StreakState, StreakTransition, advance};
    use crate::calendar::DayClock;
    use chrono::{DateTime, Duration, Utc};

    fn instant(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .expect("valid rfc3339")
            .with_timezone(&Utc)
    }

    fn state(current: u32, longest: u32, last: &str) -> StreakState {
        StreakState {
            current_streak: current,
            longest_streak: longest,
            last_activity_at: Some(instant(last)),
        }
    }

    #[test]
    fn first_event_starts_a_streak() {
        let clock = DayClock::default();
        let now = instant("2024-05-01T08:00:00Z");
        let next = advance(None, now, &clock);

        assert_eq!(next.transition, StreakTransition::Started);
        assert_eq!(next.state.current_streak, 1);
        assert_eq!(next.state.longest_streak, 1);
        assert_eq!(next.state.last_activity_at, Some(now));
    }

    #[test]
    fn record_without_last_activity_keeps_longest() {
        let clock = DayClock::default();
        let prior = StreakState {
            current_streak: 0,
            longest_streak: 7,
            last_activity_at: None,
        };
        let next = advance(Some(prior), instant("2024-05-01T08:00:00Z"), &clock);

        assert_eq!(next.transition, StreakTransition::Started);
        assert_eq!(next.state.current_streak, 1);
        assert_eq!(next.state.longest_streak, 7);
    }

    #[test]
    fn same_local_day_is_a_no_op() {
        let clock = DayClock::new(330).expect("valid offset");
        let prior = state(3, 4, "2024-05-01T00:00:00Z");
        let later_same_day = instant("2024-05-01T18:00:00Z");

        let next = advance(Some(prior), later_same_day, &clock);
        assert_eq!(next.transition, StreakTransition::SameDay);
        assert_eq!(next.state, prior);

        let again = advance(Some(next.state), later_same_day, &clock);
        assert_eq!(again.state, prior);
    }

    #[test]
    fn consecutive_day_extends_and_raises_high_water_mark() {
        let clock = DayClock::new(330).expect("valid offset");
        let prior = state(5, 5, "2024-05-01T06:30:00Z");
        let now = instant("2024-05-02T06:30:00Z");
        let next = advance(Some(prior), now, &clock);

        assert_eq!(next.transition, StreakTransition::Extended);
        assert_eq!(next.state.current_streak, 6);
        assert_eq!(next.state.longest_streak, 6);
        assert_eq!(next.state.last_activity_at, Some(now));
    }

    #[test]
    fn gap_resets_current_and_keeps_longest() {
        let clock = DayClock::new(330).expect("valid offset");
        let prior = state(5, 10, "2024-05-01T06:30:00Z");
        let next = advance(Some(prior), instant("2024-05-04T06:30:00Z"), &clock);

        assert_eq!(next.transition, StreakTransition::Reset);
        assert_eq!(next.state.current_streak, 1);
        assert_eq!(next.state.longest_streak, 10);
    }

    #[test]
    fn event_before_last_activity_resets() {
        let clock = DayClock::default();
        let prior = state(4, 4, "2024-05-10T06:30:00Z");
        let next = advance(Some(prior), instant("2024-05-08T06:30:00Z"), &clock);

        assert_eq!(next.transition, StreakTransition::Reset);
        assert_eq!(next.state.current_streak, 1);
        assert_eq!(next.state.longest_streak, 4);
    }

    #[test]
    fn yesterday_is_a_calendar_day_not_24_hours() {
        let clock = DayClock::new(330).expect("valid offset");
        // 2024-05-01 23:50 local, then 2024-05-02 00:10 local: twenty minutes apart.
        let prior = state(2, 2, "2024-05-01T18:20:00Z");
        let next = advance(Some(prior), instant("2024-05-01T18:40:00Z"), &clock);
        assert_eq!(next.transition, StreakTransition::Extended);
        assert_eq!(next.state.current_streak, 3);

        // 2024-05-01 00:10 local, then 2024-05-02 23:50 local: under 48 hours, still consecutive.
        let prior = state(2, 2, "2024-04-30T18:40:00Z");
        let next = advance(Some(prior), instant("2024-05-02T18:20:00Z"), &clock);
        assert_eq!(next.transition, StreakTransition::Extended);
    }

    #[test]
    fn utc_and_local_clocks_disagree_across_the_boundary() {
        let prior = state(1, 1, "2024-01-01T10:00:00Z");
        let now = instant("2024-01-01T19:00:00Z");

        let utc = advance(Some(prior), now, &DayClock::utc());
        let local = advance(Some(prior), now, &DayClock::new(330).expect("valid offset"));

        assert_eq!(utc.transition, StreakTransition::SameDay);
        assert_eq!(local.transition, StreakTransition::Extended);
    }

    #[test]
    fn longest_never_decreases_and_bounds_current() {
        let clock = DayClock::new(330).expect("valid offset");
        let start = instant("2024-01-01T06:30:00Z");
        let steps = [0, 1, 1, 2, 1, 1, 1, 1, 5, 0, 1, -3, 1];

        let mut at = start;
        let mut current = None;
        for step in steps {
            at += Duration::days(step);
            let before = current.map(|state: StreakState| state.longest_streak).unwrap_or(0);
            let next = advance(current, at, &clock);

            assert!(next.state.longest_streak >= before);
            assert!(next.state.longest_streak >= next.state.current_streak);
            current = Some(next.state);
        }
    }
}
