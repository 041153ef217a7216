//! Ordered SQL migrations for the state store (C7, spec.md §4.6).
//!
//! Versions are zero-padded four-digit strings so lexicographic order is
//! also application order; `migration_versions()` is the single source of
//! truth both the migrator and the `[min_supported, max_supported]` range
//! check compare against.

pub fn migration_versions() -> Vec<&'static str> {
    MIGRATIONS.iter().map(|(version, _)| *version).collect()
}

pub fn migration_sql(version: &str) -> Option<&'static str> {
    MIGRATIONS
        .iter()
        .find(|(v, _)| *v == version)
        .map(|(_, sql)| *sql)
}

const MIGRATIONS: &[(&str, &str)] = &[
    ("0001", MIGRATION_0001_CHECKINS),
    ("0002", MIGRATION_0002_JOURNAL_ENTRIES),
    ("0003", MIGRATION_0003_MEMORIES),
];

const MIGRATION_0001_CHECKINS: &str = r#"
CREATE TABLE IF NOT EXISTS checkins (
    id UUID PRIMARY KEY,
    user_id TEXT NOT NULL,
    turn_id UUID NOT NULL,
    domain TEXT NOT NULL,
    track_type TEXT NOT NULL,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    outcome TEXT NOT NULL,
    confidence DOUBLE PRECISION NOT NULL,
    wins TEXT[] NOT NULL DEFAULT '{}',
    barriers TEXT[] NOT NULL DEFAULT '{}',
    next_actions TEXT[] NOT NULL DEFAULT '{}',
    tags TEXT[] NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    source_model TEXT,
    idempotency_key TEXT NOT NULL,
    UNIQUE (user_id, idempotency_key)
);
CREATE INDEX IF NOT EXISTS checkins_user_domain_created_idx
    ON checkins (user_id, domain, created_at DESC);
"#;

const MIGRATION_0002_JOURNAL_ENTRIES: &str = r#"
CREATE TABLE IF NOT EXISTS journal_entries (
    id UUID PRIMARY KEY,
    user_id TEXT NOT NULL,
    turn_id UUID NOT NULL,
    title TEXT NOT NULL,
    body_markdown TEXT NOT NULL,
    domain_hints TEXT[] NOT NULL DEFAULT '{}',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    idempotency_key TEXT NOT NULL,
    UNIQUE (user_id, idempotency_key)
);
CREATE INDEX IF NOT EXISTS journal_entries_user_created_idx
    ON journal_entries (user_id, created_at DESC);
"#;

const MIGRATION_0003_MEMORIES: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    domain TEXT NOT NULL,
    title TEXT NOT NULL,
    summary TEXT NOT NULL,
    narrative TEXT NOT NULL,
    confidence DOUBLE PRECISION NOT NULL,
    tags TEXT[] NOT NULL DEFAULT '{}',
    archived BOOLEAN NOT NULL DEFAULT false,
    tombstoned BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    created_by_agent TEXT NOT NULL,
    last_updated_by_agent TEXT NOT NULL,
    normalized_summary TEXT NOT NULL
);
-- Enforces the dedup invariant (spec.md §3/§8) directly in the schema: no two
-- non-tombstoned memories in the same (user_id, domain) may share a
-- normalized summary. The memory writer upserts against this index.
CREATE UNIQUE INDEX IF NOT EXISTS memories_active_dedup_idx
    ON memories (user_id, domain, normalized_summary)
    WHERE NOT tombstoned;
CREATE INDEX IF NOT EXISTS memories_user_domain_active_idx
    ON memories (user_id, domain)
    WHERE NOT tombstoned;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_are_lexicographically_ordered() {
        let versions = migration_versions();
        let mut sorted = versions.clone();
        sorted.sort();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn every_version_has_sql() {
        for version in migration_versions() {
            assert!(migration_sql(version).is_some());
        }
    }

    #[test]
    fn unknown_version_has_no_sql() {
        assert!(migration_sql("9999").is_none());
    }
}
