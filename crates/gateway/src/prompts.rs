//! Prompt Registry (C1, spec.md §4.1).
//!
//! Loads a prompt for each key in `{orchestrator} ∪ specialist_domains` from
//! a configured directory, falling back to a built-in default whenever the
//! file is missing, unreadable, or empty on first load. On a later reload, a
//! read failure instead falls back to the prompt the snapshot already held,
//! never to the built-in and never to empty (spec.md:170). `get` never
//! fails — it returns the latest on-disk prompt, the previous one, or the
//! built-in.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use gateway_common::SpecialistDomain;

const ORCHESTRATOR_KEY: &str = "orchestrator";
const ORCHESTRATOR_DEFAULT: &str =
    "You are the master orchestrator agent. Decide whether specialist guidance is \
     needed and synthesize one coherent final answer with no contradictions.";

fn prompt_keys() -> Vec<String> {
    let mut keys = vec![ORCHESTRATOR_KEY.to_string()];
    keys.extend(SpecialistDomain::ALL.iter().map(|d| d.as_str().to_string()));
    keys
}

fn default_for(key: &str) -> &'static str {
    if key == ORCHESTRATOR_KEY {
        return ORCHESTRATOR_DEFAULT;
    }
    SpecialistDomain::ALL
        .iter()
        .find(|d| d.as_str() == key)
        .map(|d| d.default_prompt())
        .unwrap_or("")
}

fn filename_for(key: &str, orchestrator_file: &str, by_domain_override: Option<&str>) -> String {
    if key == ORCHESTRATOR_KEY {
        return orchestrator_file.to_string();
    }
    if let Some(name) = by_domain_override {
        return name.to_string();
    }
    SpecialistDomain::ALL
        .iter()
        .find(|d| d.as_str() == key)
        .map(|d| d.prompt_file().to_string())
        .unwrap_or_else(|| format!("{key}.md"))
}

struct Snapshot {
    prompts: HashMap<String, String>,
    fingerprints: HashMap<String, String>,
}

/// Hot-reloading prompt registry. Readers never observe a half-built
/// snapshot: reload swaps in an entirely new `Snapshot` atomically under the
/// write lock (spec.md §9 "Hot-reload coordination").
pub struct PromptRegistry {
    dir: PathBuf,
    orchestrator_file: String,
    domain_files: HashMap<String, String>,
    auto_reload: bool,
    snapshot: RwLock<Snapshot>,
}

impl PromptRegistry {
    pub fn load(
        dir: impl Into<PathBuf>,
        orchestrator_file: impl Into<String>,
        domain_files: HashMap<String, String>,
        auto_reload: bool,
    ) -> Self {
        let dir = dir.into();
        let orchestrator_file = orchestrator_file.into();
        let _ = std::fs::create_dir_all(&dir);
        let snapshot = Self::load_snapshot(&dir, &orchestrator_file, &domain_files, None);
        Self {
            dir,
            orchestrator_file,
            domain_files,
            auto_reload,
            snapshot: RwLock::new(snapshot),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let filename = filename_for(
            key,
            &self.orchestrator_file,
            self.domain_files.get(key).map(|s| s.as_str()),
        );
        self.dir.join(filename)
    }

    fn fingerprint(path: &Path) -> String {
        match std::fs::metadata(path) {
            Ok(meta) => {
                let mtime_ns = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| d.as_nanos())
                    .unwrap_or(0);
                format!("{}:{}", mtime_ns, meta.len())
            }
            Err(_) => "missing".to_string(),
        }
    }

    /// Reads the prompt for `key`. On a missing, empty, or unreadable file,
    /// falls back to `previous` (the value already held in the snapshot being
    /// replaced) so a transient read error during reload never discards a
    /// real prompt; only the very first load, which has no previous
    /// snapshot, falls back to the built-in default (spec.md:170).
    fn read_prompt(key: &str, path: &Path, previous: Option<&str>) -> String {
        let fallback = || previous.map(str::to_string).unwrap_or_else(|| default_for(key).to_string());
        if !path.exists() {
            tracing::warn!(key, path = %path.display(), "Prompt file missing, using fallback");
            return fallback();
        }
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let trimmed = text.trim_end().to_string();
                if trimmed.is_empty() {
                    tracing::warn!(key, path = %path.display(), "Prompt file empty, using fallback");
                    fallback()
                } else {
                    trimmed
                }
            }
            Err(e) => {
                tracing::warn!(key, path = %path.display(), error = %e, "Prompt file unreadable, using fallback");
                fallback()
            }
        }
    }

    fn load_snapshot(
        dir: &Path,
        orchestrator_file: &str,
        domain_files: &HashMap<String, String>,
        previous: Option<&Snapshot>,
    ) -> Snapshot {
        let mut prompts = HashMap::new();
        let mut fingerprints = HashMap::new();
        for key in prompt_keys() {
            let filename = filename_for(&key, orchestrator_file, domain_files.get(&key).map(|s| s.as_str()));
            let path = dir.join(filename);
            let previous_value = previous.and_then(|s| s.prompts.get(&key)).map(|s| s.as_str());
            prompts.insert(key.clone(), Self::read_prompt(&key, &path, previous_value));
            fingerprints.insert(key, Self::fingerprint(&path));
        }
        Snapshot {
            prompts,
            fingerprints,
        }
    }

    fn has_changes(&self, snapshot: &Snapshot) -> bool {
        prompt_keys().iter().any(|key| {
            let current = Self::fingerprint(&self.path_for(key));
            snapshot.fingerprints.get(key) != Some(&current)
        })
    }

    fn maybe_reload(&self) {
        if !self.auto_reload {
            return;
        }
        let needs_reload = {
            let snapshot = self.snapshot.read().expect("prompt snapshot lock poisoned");
            self.has_changes(&snapshot)
        };
        if needs_reload {
            let fresh = {
                let previous = self.snapshot.read().expect("prompt snapshot lock poisoned");
                Self::load_snapshot(&self.dir, &self.orchestrator_file, &self.domain_files, Some(&previous))
            };
            let mut snapshot = self.snapshot.write().expect("prompt snapshot lock poisoned");
            *snapshot = fresh;
            tracing::info!(dir = %self.dir.display(), "Prompt files changed; prompts reloaded");
        }
    }

    /// Returns the latest prompt for `key`. Never fails: unknown keys fall
    /// back to an empty string rather than panicking, though in practice
    /// every caller passes a key produced by `SpecialistDomain` or
    /// `"orchestrator"`.
    pub fn get(&self, key: &str) -> String {
        self.maybe_reload();
        let snapshot = self.snapshot.read().expect("prompt snapshot lock poisoned");
        snapshot
            .prompts
            .get(key)
            .cloned()
            .unwrap_or_else(|| default_for(key).to_string())
    }

    pub fn get_orchestrator(&self) -> String {
        self.get(ORCHESTRATOR_KEY)
    }

    pub fn get_domain(&self, domain: SpecialistDomain) -> String {
        self.get(domain.as_str())
    }

    /// Resolved on-disk path per key, for the `/diagnostics` endpoint.
    pub fn resolved_prompt_files(&self) -> HashMap<String, String> {
        prompt_keys()
            .into_iter()
            .map(|key| {
                let path = self.path_for(&key).display().to_string();
                (key, path)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn falls_back_to_builtin_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PromptRegistry::load(dir.path(), "_orchestrator.md", HashMap::new(), true);
        assert_eq!(registry.get("health"), SpecialistDomain::Health.default_prompt());
    }

    #[test]
    fn reads_file_contents_and_strips_trailing_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health.md");
        std::fs::write(&path, "Be kind.\n\n  \n").unwrap();
        let registry = PromptRegistry::load(dir.path(), "_orchestrator.md", HashMap::new(), true);
        assert_eq!(registry.get("health"), "Be kind.");
    }

    #[test]
    fn empty_file_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("health.md"), "   \n").unwrap();
        let registry = PromptRegistry::load(dir.path(), "_orchestrator.md", HashMap::new(), true);
        assert_eq!(registry.get("health"), SpecialistDomain::Health.default_prompt());
    }

    #[test]
    fn auto_reload_picks_up_touched_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health.md");
        std::fs::write(&path, "Version one.").unwrap();
        let registry = PromptRegistry::load(dir.path(), "_orchestrator.md", HashMap::new(), true);
        assert_eq!(registry.get("health"), "Version one.");

        // Ensure the mtime actually advances on filesystems with coarse
        // resolution before rewriting.
        std::thread::sleep(Duration::from_millis(10));
        let mut f = std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .unwrap();
        f.write_all(b"Version two.").unwrap();
        drop(f);

        assert_eq!(registry.get("health"), "Version two.");
    }

    #[test]
    fn reload_read_failure_retains_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health.md");
        std::fs::write(&path, "Version one.").unwrap();
        let registry = PromptRegistry::load(dir.path(), "_orchestrator.md", HashMap::new(), true);
        assert_eq!(registry.get("health"), "Version one.");

        // Replace the file with a directory of the same name: the fingerprint
        // changes (triggering a reload) but reading it back fails. The
        // previously-loaded content must be retained, not the built-in.
        std::thread::sleep(Duration::from_millis(10));
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert_eq!(registry.get("health"), "Version one.");
    }

    #[test]
    fn disabled_auto_reload_keeps_initial_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health.md");
        std::fs::write(&path, "Version one.").unwrap();
        let registry = PromptRegistry::load(dir.path(), "_orchestrator.md", HashMap::new(), false);
        std::fs::write(&path, "Version two.").unwrap();
        assert_eq!(registry.get("health"), "Version one.");
    }
}
