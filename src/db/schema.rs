//! Database schema and migrations.
//!
//! Migrations are applied in order; the `schema_version` table records which
//! have run. Dates are stored as `YYYY-MM-DD` text in the tracker's timezone,
//! timestamps as RFC 3339 text, money as integer cents.

/// Database migrations.
#[cfg(feature = "sqlite")]
pub const MIGRATIONS: &[&str] = &[
    // v1: articles, per-day aggregates and the streak singleton
    r#"
CREATE TABLE articles (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    url             TEXT NOT NULL UNIQUE,
    title           TEXT NOT NULL,
    published_at    TEXT,
    detected_at     TEXT NOT NULL,
    detected_date   TEXT NOT NULL,        -- local calendar date of detection
    earning_cents   INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_articles_detected_at ON articles(detected_at);
CREATE INDEX idx_articles_detected_date ON articles(detected_date);

CREATE TABLE daily_stats (
    date            TEXT PRIMARY KEY,
    article_count   INTEGER NOT NULL DEFAULT 0,
    earned_cents    INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE streak_info (
    id                  INTEGER PRIMARY KEY DEFAULT 1 CHECK (id = 1),
    current_streak      INTEGER NOT NULL DEFAULT 0,
    last_publish_date   TEXT
);

INSERT INTO streak_info (id, current_streak, last_publish_date)
VALUES (1, 0, NULL)
ON CONFLICT (id) DO NOTHING;
"#,
];

/// Database migrations.
#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
pub const MIGRATIONS: &[&str] = &[
    // v1: articles, per-day aggregates and the streak singleton
    r#"
CREATE TABLE articles (
    id              BIGSERIAL PRIMARY KEY,
    url             TEXT NOT NULL UNIQUE,
    title           TEXT NOT NULL,
    published_at    TEXT,
    detected_at     TEXT NOT NULL,
    detected_date   TEXT NOT NULL,
    earning_cents   BIGINT NOT NULL DEFAULT 0
);

CREATE INDEX idx_articles_detected_at ON articles(detected_at);
CREATE INDEX idx_articles_detected_date ON articles(detected_date);

CREATE TABLE daily_stats (
    date            TEXT PRIMARY KEY,
    article_count   BIGINT NOT NULL DEFAULT 0,
    earned_cents    BIGINT NOT NULL DEFAULT 0
);

CREATE TABLE streak_info (
    id                  INTEGER PRIMARY KEY DEFAULT 1 CHECK (id = 1),
    current_streak      BIGINT NOT NULL DEFAULT 0,
    last_publish_date   TEXT
);

INSERT INTO streak_info (id, current_streak, last_publish_date)
VALUES (1, 0, NULL)
ON CONFLICT (id) DO NOTHING;
"#,
];
