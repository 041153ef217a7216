//! CLI subcommands (SPEC_FULL.md §4.13): `onboard` upserts provider keys into
//! an env-file, preserving comments and existing keys; `db bootstrap-local`
//! assembles a local Postgres DSN for the state store, validating the role
//! name and URL-encoding the password. Exit codes per spec.md §6: `0`
//! success, `1` precondition failure, `2` argument parse error (left to
//! clap).

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use regex::Regex;

/// `^[A-Za-z_][A-Za-z0-9_]*$` — spec.md §6 "identifier validation".
fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex is valid"))
}

pub fn is_valid_identifier(s: &str) -> bool {
    identifier_re().is_match(s)
}

/// Upsert `key=value` into the env-file at `path`. Existing lines (including
/// comments and unrelated keys) are preserved verbatim; a line already
/// assigning `key` is replaced in place; otherwise the assignment is
/// appended at the end.
pub fn upsert_env_value(path: &Path, key: &str, value: &str) -> io::Result<()> {
    let existing = std::fs::read_to_string(path).unwrap_or_default();
    let prefix = format!("{key}=");
    let mut lines: Vec<String> = Vec::new();
    let mut replaced = false;

    for line in existing.lines() {
        if line.trim_start().starts_with(&prefix) {
            lines.push(format!("{key}={value}"));
            replaced = true;
        } else {
            lines.push(line.to_string());
        }
    }

    if !replaced {
        lines.push(format!("{key}={value}"));
    }

    let content = format!("{}\n", lines.join("\n"));
    std::fs::write(path, content)
}

fn prompt_optional(label: &str) -> io::Result<Option<String>> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

/// Interactively upsert provider credentials into `env_file`. Run for each
/// provider env var named in config; blank input leaves the existing value
/// (if any) untouched.
pub fn run_onboard(
    env_file: &Path,
    openai_key_env: &str,
    gemini_key_env: &str,
    state_dsn_env: Option<&str>,
) -> io::Result<()> {
    println!("Gateway onboarding — leave blank to keep any existing value.");

    if let Some(key) = prompt_optional(&format!("OpenAI API key ({openai_key_env})"))? {
        upsert_env_value(env_file, openai_key_env, &key)?;
        println!("  saved {openai_key_env}");
    }

    if let Some(key) = prompt_optional(&format!("Gemini API key ({gemini_key_env})"))? {
        upsert_env_value(env_file, gemini_key_env, &key)?;
        println!("  saved {gemini_key_env}");
    }

    if let Some(dsn_env) = state_dsn_env {
        if let Some(dsn) = prompt_optional(&format!("State store DSN ({dsn_env})"))? {
            upsert_env_value(env_file, dsn_env, &dsn)?;
            println!("  saved {dsn_env}");
        }
    }

    println!("Onboarding complete: {}", env_file.display());
    Ok(())
}

#[derive(Debug)]
pub enum BootstrapError {
    InvalidIdentifier(String),
    NotRoot,
}

impl std::fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(s) => write!(
                f,
                "'{s}' is not a valid Postgres identifier (must match ^[A-Za-z_][A-Za-z0-9_]*$)"
            ),
            Self::NotRoot => write!(f, "db bootstrap-local must be run as root"),
        }
    }
}

/// `true` on platforms that expose a root check and the current process is
/// not running as root. `false` elsewhere (nothing to refuse).
#[cfg(unix)]
fn requires_root_and_is_not_root() -> bool {
    // SAFETY: `geteuid` takes no arguments and cannot fail.
    unsafe { libc::geteuid() != 0 }
}

#[cfg(not(unix))]
fn requires_root_and_is_not_root() -> bool {
    false
}

/// Assemble a Postgres DSN for a freshly bootstrapped local role/database,
/// validating `role` and `database` against the identifier pattern and
/// percent-encoding `password` into the URL (spec.md §6).
pub fn build_local_dsn(
    role: &str,
    password: &str,
    database: &str,
    host: &str,
    port: u16,
) -> Result<String, BootstrapError> {
    if !is_valid_identifier(role) {
        return Err(BootstrapError::InvalidIdentifier(role.to_string()));
    }
    if !is_valid_identifier(database) {
        return Err(BootstrapError::InvalidIdentifier(database.to_string()));
    }
    let encoded_password = utf8_percent_encode(password, NON_ALPHANUMERIC).to_string();
    Ok(format!(
        "postgres://{role}:{encoded_password}@{host}:{port}/{database}"
    ))
}

/// `db bootstrap-local`: creates the local Postgres role/database this
/// service's state store uses, printing the resulting DSN. Refuses to run
/// unless the process is root on platforms where that check is meaningful
/// (spec.md §6 CLI exit codes: `1` precondition failure).
pub fn run_bootstrap_local(
    role: &str,
    password: &str,
    database: &str,
    host: &str,
    port: u16,
) -> Result<String, BootstrapError> {
    if requires_root_and_is_not_root() {
        return Err(BootstrapError::NotRoot);
    }
    let dsn = build_local_dsn(role, password, database, host, port)?;

    println!("CREATE ROLE {role} WITH LOGIN PASSWORD '<redacted>';");
    println!("CREATE DATABASE {database} OWNER {role};");
    println!("Local state store DSN: {dsn}");

    Ok(dsn)
}

#[allow(dead_code)]
pub fn default_env_file() -> PathBuf {
    PathBuf::from(".env")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_validation_accepts_only_documented_pattern() {
        assert!(is_valid_identifier("gateway_user"));
        assert!(is_valid_identifier("_leading_underscore"));
        assert!(!is_valid_identifier("1leading_digit"));
        assert!(!is_valid_identifier("has-hyphen"));
        assert!(!is_valid_identifier("has space"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn dsn_url_encodes_special_characters_in_password() {
        let dsn = build_local_dsn("gateway_user", "p@ss w/ord!", "gateway_state", "localhost", 5432).unwrap();
        assert!(dsn.starts_with("postgres://gateway_user:"));
        assert!(dsn.contains("%40")); // '@'
        assert!(dsn.contains("%20")); // ' '
        assert!(dsn.ends_with("@localhost:5432/gateway_state"));
    }

    #[test]
    fn dsn_rejects_invalid_role_identifier() {
        let err = build_local_dsn("bad-role", "pw", "gateway_state", "localhost", 5432).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidIdentifier(s) if s == "bad-role"));
    }

    #[test]
    fn dsn_rejects_invalid_database_identifier() {
        let err = build_local_dsn("gateway_user", "pw", "1bad", "localhost", 5432).unwrap_err();
        assert!(matches!(err, BootstrapError::InvalidIdentifier(s) if s == "1bad"));
    }

    #[test]
    fn upsert_env_value_replaces_existing_key_and_preserves_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "# comment\nOPENAI_API_KEY=old\nOTHER=1\n").unwrap();

        upsert_env_value(&path, "OPENAI_API_KEY", "new").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("# comment"));
        assert!(contents.contains("OPENAI_API_KEY=new"));
        assert!(!contents.contains("OPENAI_API_KEY=old"));
        assert!(contents.contains("OTHER=1"));
    }

    #[test]
    fn upsert_env_value_appends_when_key_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "OTHER=1\n").unwrap();

        upsert_env_value(&path, "GEMINI_API_KEY", "abc").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("OTHER=1"));
        assert!(contents.contains("GEMINI_API_KEY=abc"));
    }
}
