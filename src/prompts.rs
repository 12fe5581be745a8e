use chrono::{Datelike, NaiveDate};

pub const FALLBACK_PROMPT: &str = "Take a moment to reflect on your day.";

pub struct PromptSeed {
    pub content: &'static str,
    pub category: &'static str,
}

pub const DEFAULT_PROMPTS: [PromptSeed; 10] = [
    PromptSeed {
        content: "I slow down to hear the flowers bloom and feel the gentle touch of the breeze.",
        category: "mindfulness",
    },
    PromptSeed {
        content: "What are three things you're grateful for today?",
        category: "gratitude",
    },
    PromptSeed {
        content: "Describe a moment today that made you smile.",
        category: "reflection",
    },
    PromptSeed {
        content: "What would you tell your younger self?",
        category: "reflection",
    },
    PromptSeed {
        content: "What's one small step you can take today toward your dreams?",
        category: "motivation",
    },
    PromptSeed {
        content: "Notice five things you can see, four you can touch, three you can hear, two you can smell, and one you can taste.",
        category: "mindfulness",
    },
    PromptSeed {
        content: "What does your ideal day look like?",
        category: "reflection",
    },
    PromptSeed {
        content: "Write about something that's been on your mind lately.",
        category: "reflection",
    },
    PromptSeed {
        content: "What lesson did today teach you?",
        category: "reflection",
    },
    PromptSeed {
        content: "List three things that brought you peace today.",
        category: "gratitude",
    },
];

/// `year*10000 + month*100 + day`, e.g. 20240315.
pub fn day_seed(date: NaiveDate) -> u64 {
    let year = u64::try_from(date.year()).unwrap_or_default();
    year * 10_000 + u64::from(date.month()) * 100 + u64::from(date.day())
}

/// Index of the prompt of the day, or `None` when there is nothing to pick.
pub fn daily_index(date: NaiveDate, prompt_count: usize) -> Option<usize> {
    if prompt_count == 0 {
        return None;
    }

    let index = day_seed(date) % prompt_count as u64;
    usize::try_from(index).ok()
}

pub fn pick_for_day<T>(date: NaiveDate, prompts: &[T]) -> Option<&T> {
    daily_index(date, prompts.len()).and_then(|index| prompts.get(index))
}
