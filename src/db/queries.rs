pub const CREATE_CATEGORIES: &str = r#"
CREATE TABLE IF NOT EXISTS categories (
  id          TEXT PRIMARY KEY,
  name        TEXT NOT NULL UNIQUE,
  color       TEXT NOT NULL DEFAULT '#6366f1',
  icon        TEXT,
  created_at  INTEGER NOT NULL,
  updated_at  INTEGER NOT NULL
);
"#;

pub const CREATE_TASKS: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
  id            TEXT PRIMARY KEY,
  title         TEXT NOT NULL,
  description   TEXT,
  start_time    INTEGER,
  end_time      INTEGER,
  duration      INTEGER,
  is_completed  INTEGER NOT NULL DEFAULT 0,
  priority      TEXT NOT NULL DEFAULT 'medium',
  category_id   TEXT REFERENCES categories(id) ON DELETE SET NULL,
  date          INTEGER NOT NULL,
  sort_order    INTEGER NOT NULL DEFAULT 0,
  created_at    INTEGER NOT NULL,
  updated_at    INTEGER NOT NULL
);
"#;

pub const CREATE_DIARY_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS diary_entries (
  id          TEXT PRIMARY KEY,
  title       TEXT,
  content     TEXT NOT NULL,
  mood        TEXT,
  mood_score  INTEGER,
  prompt      TEXT,
  weather     TEXT,
  location    TEXT,
  date        INTEGER NOT NULL,
  created_at  INTEGER NOT NULL,
  updated_at  INTEGER NOT NULL
);
"#;

pub const CREATE_STREAKS: &str = r#"
CREATE TABLE IF NOT EXISTS streaks (
  id                TEXT PRIMARY KEY,
  activity_type     TEXT NOT NULL UNIQUE,
  current_streak    INTEGER NOT NULL DEFAULT 0,
  longest_streak    INTEGER NOT NULL DEFAULT 0,
  last_activity_at  INTEGER,
  created_at        INTEGER NOT NULL,
  updated_at        INTEGER NOT NULL
);
"#;

pub const CREATE_DAILY_PROMPTS: &str = r#"
CREATE TABLE IF NOT EXISTS daily_prompts (
  id          TEXT PRIMARY KEY,
  content     TEXT NOT NULL,
  author      TEXT,
  category    TEXT,
  is_active   INTEGER NOT NULL DEFAULT 1,
  created_at  INTEGER NOT NULL
);
"#;

pub const CREATE_QUOTES: &str = r#"
CREATE TABLE IF NOT EXISTS quotes (
  id           TEXT PRIMARY KEY,
  content      TEXT NOT NULL,
  author       TEXT,
  is_favorite  INTEGER NOT NULL DEFAULT 0,
  created_at   INTEGER NOT NULL,
  updated_at   INTEGER NOT NULL
);
"#;

pub const INDEX_TASKS_DATE: &str = "CREATE INDEX IF NOT EXISTS idx_tasks_date ON tasks(date);";

pub const INDEX_DIARY_ENTRIES_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_diary_entries_date ON diary_entries(date);";

pub const INDEX_DAILY_PROMPTS_ACTIVE: &str =
    "CREATE INDEX IF NOT EXISTS idx_daily_prompts_active ON daily_prompts(is_active, created_at);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_CATEGORIES,
        CREATE_TASKS,
        CREATE_DIARY_ENTRIES,
        CREATE_STREAKS,
        CREATE_DAILY_PROMPTS,
        CREATE_QUOTES,
        INDEX_TASKS_DATE,
        INDEX_DIARY_ENTRIES_DATE,
        INDEX_DAILY_PROMPTS_ACTIVE,
    ]
}
