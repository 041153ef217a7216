//! File Projector (C12, spec.md §4.10).
//!
//! Mirrors successful writes under `state/users/<user_id>/<kind>/<yyyy>/…`
//! when `projection.mode` is `mirror` or `full`. Memory entries additionally
//! get a per-`(user, domain)` markdown file with YAML front-matter and
//! `- [<mem_id>] <summary>` entry lines — the domain-file design spec.md's
//! Open Question (a) canonicalizes (SPEC_FULL.md §3). Every write is
//! write-temp-then-rename so no reader observes a half-written file.
//! Projection failures are logged but never fail the turn (spec.md §4.10).

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use gateway_common::{CheckInRecord, JournalEntry, MemoryRecordRow, UserId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProjectionMode {
    Off,
    Mirror,
    Full,
}

impl ProjectionMode {
    pub fn from_config_str(s: &str) -> Self {
        match s {
            "mirror" => Self::Mirror,
            "full" => Self::Full,
            _ => Self::Off,
        }
    }

    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Off)
    }
}

pub struct FileProjector {
    mode: ProjectionMode,
    root: PathBuf,
}

#[derive(Serialize)]
struct MemoryFrontMatter<'a> {
    id: &'a str,
    domain: &'a str,
    created_at: String,
    updated_at: String,
    entry_count: usize,
    archived: bool,
    tombstone: bool,
    created_by_agent: &'a str,
    last_updated_by_agent: &'a str,
}

const REMOVED_PREFIX: &str = "[REMOVED] ";

impl FileProjector {
    pub fn new(mode: ProjectionMode, root: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            root: root.into(),
        }
    }

    pub fn mode(&self) -> ProjectionMode {
        self.mode
    }

    fn user_dir(&self, user_id: &UserId, kind: &str) -> PathBuf {
        self.root.join(user_id.as_str()).join(kind)
    }

    /// Atomically write `contents` to `path`: write to a sibling `.tmp` file
    /// in the same directory, then rename into place (spec.md §8 "Projection
    /// atomicity" — no reader ever observes a partial file).
    fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension(format!(
            "{}.tmp",
            path.extension().and_then(|e| e.to_str()).unwrap_or("")
        ));
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, path)
    }

    pub fn project_checkin(&self, user_id: &UserId, record: &CheckInRecord) {
        if !self.mode.is_enabled() {
            return;
        }
        let year = record.created_at.format("%Y").to_string();
        let filename = format!("{}.md", record.id);
        let path = self
            .user_dir(user_id, "checkins")
            .join(&year)
            .join(filename);

        let body = format!(
            "---\nid: {}\ndomain: {}\ntrack_type: {:?}\noutcome: {:?}\nconfidence: {}\ncreated_at: {}\n---\n\n\
             # {}\n\n{}\n\nWins: {}\nBarriers: {}\nNext actions: {}\nTags: {}\n",
            record.id,
            record.domain,
            record.track_type,
            record.outcome,
            record.confidence,
            record.created_at.to_rfc3339(),
            record.title,
            record.summary,
            record.wins.join(", "),
            record.barriers.join(", "),
            record.next_actions.join(", "),
            record.tags.join(", "),
        );

        if let Err(e) = Self::write_atomic(&path, &body) {
            tracing::warn!(error = %e, path = %path.display(), "failed to project check-in");
        }
    }

    pub fn project_journal(&self, user_id: &UserId, entry: &JournalEntry) {
        if !self.mode.is_enabled() {
            return;
        }
        let year = entry.created_at.format("%Y").to_string();
        let filename = format!("{}.md", entry.id);
        let path = self.user_dir(user_id, "journal").join(&year).join(filename);

        let body = format!(
            "---\nid: {}\ncreated_at: {}\ndomain_hints: {}\n---\n\n# {}\n\n{}\n",
            entry.id,
            entry.created_at.to_rfc3339(),
            entry.domain_hints.join(", "),
            entry.title,
            entry.body_markdown,
        );

        if let Err(e) = Self::write_atomic(&path, &body) {
            tracing::warn!(error = %e, path = %path.display(), "failed to project journal entry");
        }
    }

    fn memory_domain_path(&self, user_id: &UserId, domain: &str) -> PathBuf {
        self.user_dir(user_id, "memory").join(format!("{domain}.md"))
    }

    /// Re-render the whole domain memory file from the current set of
    /// records for `(user_id, domain)`. Called after create, tombstone, or
    /// edit so the projected file always matches the database.
    pub fn project_memory_domain(&self, user_id: &UserId, domain: &str, records: &[MemoryRecordRow]) {
        if !self.mode.is_enabled() {
            return;
        }
        let path = self.memory_domain_path(user_id, domain);

        let active_count = records.iter().filter(|m| !m.tombstoned).count();
        let created_at = records
            .iter()
            .map(|m| m.created_at)
            .min()
            .unwrap_or_else(Utc::now);
        let updated_at = records
            .iter()
            .map(|m| m.updated_at)
            .max()
            .unwrap_or_else(Utc::now);
        let created_by_agent = records
            .first()
            .map(|m| m.created_by_agent.as_str())
            .unwrap_or("state-pipeline");
        let last_updated_by_agent = records
            .last()
            .map(|m| m.last_updated_by_agent.as_str())
            .unwrap_or("state-pipeline");

        let front_matter = MemoryFrontMatter {
            id: domain,
            domain,
            created_at: created_at.to_rfc3339(),
            updated_at: updated_at.to_rfc3339(),
            entry_count: active_count,
            archived: false,
            tombstone: active_count == 0 && !records.is_empty(),
            created_by_agent,
            last_updated_by_agent,
        };
        let fm_yaml = serde_yaml::to_string(&front_matter).unwrap_or_default();

        let title = title_case_domain(domain);
        let mut body = format!("# {title} Memory\n\n");
        for record in records {
            let line = if record.tombstoned {
                format!("- [{}] {}{}\n", record.id, REMOVED_PREFIX, record.summary)
            } else {
                format!("- [{}] {}\n", record.id, record.summary)
            };
            body.push_str(&line);
        }

        let rendered = format!("---\n{}---\n\n{}", fm_yaml, body.trim_end());
        let rendered = format!("{rendered}\n");

        if let Err(e) = Self::write_atomic(&path, &rendered) {
            tracing::warn!(error = %e, path = %path.display(), "failed to project memory domain file");
        }
    }
}

fn title_case_domain(domain: &str) -> String {
    domain
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_common::{MemoryId, SpecialistDomain};

    fn memory_row(id: &str, summary: &str, tombstoned: bool) -> MemoryRecordRow {
        MemoryRecordRow {
            id: MemoryId(id.to_string()),
            user_id: UserId::from("alice"),
            domain: SpecialistDomain::Health,
            title: "t".into(),
            summary: summary.to_string(),
            narrative: "n".into(),
            confidence: 0.5,
            tags: vec![],
            archived: false,
            tombstoned,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by_agent: "state-pipeline".into(),
            last_updated_by_agent: "state-pipeline".into(),
            normalized_summary: gateway_common::normalize_summary(summary),
        }
    }

    #[test]
    fn mode_parsing_defaults_to_off() {
        assert_eq!(ProjectionMode::from_config_str("bogus"), ProjectionMode::Off);
        assert_eq!(ProjectionMode::from_config_str("mirror"), ProjectionMode::Mirror);
        assert_eq!(ProjectionMode::from_config_str("full"), ProjectionMode::Full);
        assert!(!ProjectionMode::Off.is_enabled());
        assert!(ProjectionMode::Mirror.is_enabled());
    }

    #[test]
    fn title_case_domain_splits_underscores() {
        assert_eq!(title_case_domain("personal_development"), "Personal Development");
        assert_eq!(title_case_domain("health"), "Health");
    }

    #[test]
    fn project_memory_domain_writes_entry_lines_and_removed_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let projector = FileProjector::new(ProjectionMode::Full, dir.path());
        let user = UserId::from("alice");
        let records = vec![
            memory_row("mem_2026-01-01_aaaaaaaa", "prefers short workouts", false),
            memory_row("mem_2026-01-02_bbbbbbbb", "dislikes running", true),
        ];
        projector.project_memory_domain(&user, "health", &records);

        let path = dir.path().join("alice/memory/health.md");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("- [mem_2026-01-01_aaaaaaaa] prefers short workouts"));
        assert!(contents.contains("- [mem_2026-01-02_bbbbbbbb] [REMOVED] dislikes running"));
        assert!(contents.contains("entry_count: 1"));
        assert!(!contents.ends_with(".tmp"));
        assert!(!dir.path().join("alice/memory/health.md.tmp").exists());
    }

    #[test]
    fn disabled_projection_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let projector = FileProjector::new(ProjectionMode::Off, dir.path());
        let user = UserId::from("alice");
        projector.project_memory_domain(&user, "health", &[memory_row("mem_1", "x", false)]);
        assert!(!dir.path().join("alice/memory/health.md").exists());
    }
}
