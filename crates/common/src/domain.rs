use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed enumeration of specialist domains (spec.md §3). Unknown input
/// normalizes to `General` — the classifier and config loader both rely on
/// this so that a typo in a prompt-file key or a model's JSON reply degrades
/// to the safe default rather than failing the turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistDomain {
    General,
    Health,
    Parenting,
    Relationships,
    Homelab,
    PersonalDevelopment,
}

impl SpecialistDomain {
    pub const ALL: [SpecialistDomain; 6] = [
        SpecialistDomain::General,
        SpecialistDomain::Health,
        SpecialistDomain::Parenting,
        SpecialistDomain::Relationships,
        SpecialistDomain::Homelab,
        SpecialistDomain::PersonalDevelopment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Health => "health",
            Self::Parenting => "parenting",
            Self::Relationships => "relationships",
            Self::Homelab => "homelab",
            Self::PersonalDevelopment => "personal_development",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::General => "General Specialist",
            Self::Health => "Health Specialist",
            Self::Parenting => "Parenting Specialist",
            Self::Relationships => "Relationships Specialist",
            Self::Homelab => "Homelab Specialist",
            Self::PersonalDevelopment => "Personal Development Specialist",
        }
    }

    pub fn routing_hint(&self) -> &'static str {
        match self {
            Self::General => {
                "Use for broad requests, unclear intent, mixed topics, or anything that does \
                 not clearly belong to another specialist."
            }
            Self::Health => {
                "Physical or mental health, symptoms, rehabilitation, fitness, sleep, \
                 nutrition, recovery, injury, medical-care planning."
            }
            Self::Parenting => {
                "Parent-child challenges, discipline, routines, school behavior, \
                 communication with children, age-appropriate parenting guidance."
            }
            Self::Relationships => {
                "Couple/partner issues, communication conflicts, boundaries, trust, \
                 intimacy, repairing and maintaining relationships."
            }
            Self::Homelab => {
                "Homelab infrastructure, Proxmox, LXC, Docker, networking, server setup, \
                 backups, automation, observability, rollback-safe ops."
            }
            Self::PersonalDevelopment => {
                "Habits, goals, productivity, planning, accountability, self-improvement, \
                 learning and personal growth."
            }
        }
    }

    /// Default prompt filename for this domain's `get(key)` lookup (C1).
    pub fn prompt_file(&self) -> &'static str {
        match self {
            Self::General => "general.md",
            Self::Health => "health.md",
            Self::Parenting => "parenting.md",
            Self::Relationships => "relationships.md",
            Self::Homelab => "homelab.md",
            Self::PersonalDevelopment => "personal_development.md",
        }
    }

    /// Built-in fallback prompt text, used when the configured prompt file is
    /// missing, unreadable, or empty (C1 contract: `get` never fails).
    pub fn default_prompt(&self) -> &'static str {
        match self {
            Self::General => {
                "You are a reliable general assistant. Return one coherent answer with \
                 practical next steps."
            }
            Self::Health => {
                "You are the health specialist. Be practical and cautious. Do not provide \
                 diagnosis claims; recommend professional care for high-risk symptoms."
            }
            Self::Parenting => {
                "You are the parenting specialist. Give empathetic, actionable, \
                 age-appropriate guidance."
            }
            Self::Relationships => {
                "You are the relationships specialist. Support respectful communication, \
                 boundaries, and practical conflict resolution."
            }
            Self::Homelab => {
                "You are the homelab specialist. Prefer reliable, reproducible, \
                 rollback-friendly solutions."
            }
            Self::PersonalDevelopment => {
                "You are the personal development specialist. Help with habits, planning, \
                 accountability, and measurable progress."
            }
        }
    }

    /// Parse a normalized domain string from the catalog. Returns `None` for
    /// anything outside the six-member enumeration — callers fall back to
    /// `General` per spec (classifier reason `invalid-specialist`).
    pub fn from_normalized(s: &str) -> Option<Self> {
        match s {
            "general" => Some(Self::General),
            "health" => Some(Self::Health),
            "parenting" => Some(Self::Parenting),
            "relationships" => Some(Self::Relationships),
            "homelab" => Some(Self::Homelab),
            "personal_development" => Some(Self::PersonalDevelopment),
            _ => None,
        }
    }
}

impl fmt::Display for SpecialistDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for SpecialistDomain {
    fn default() -> Self {
        Self::General
    }
}

/// Normalize arbitrary model/user-supplied domain text the same way
/// `normalize_domain` does, but without the unknown-input fallback — `None`
/// means the text did not name any of the six domains at all (including
/// `general` itself). The classifier (C5) uses this to distinguish a model
/// legitimately choosing `general` from one emitting garbage that happens to
/// collapse to it.
pub fn parse_domain_strict(raw: &str) -> Option<SpecialistDomain> {
    let lowered = raw.trim().to_lowercase().replace('-', "_");
    let mut normalized = String::with_capacity(lowered.len());
    let mut last_was_sep = false;
    for ch in lowered.chars() {
        if ch.is_ascii_alphanumeric() {
            normalized.push(ch);
            last_was_sep = false;
        } else if !last_was_sep {
            normalized.push('_');
            last_was_sep = true;
        }
    }
    let trimmed = normalized.trim_matches('_');
    SpecialistDomain::from_normalized(trimmed)
}

/// Normalize arbitrary model/user-supplied domain text: lowercase, hyphens to
/// underscores, collapse any remaining non-alphanumerics to underscores.
/// Unknown input normalizes to `general` (spec.md §3).
pub fn normalize_domain(raw: &str) -> SpecialistDomain {
    parse_domain_strict(raw).unwrap_or(SpecialistDomain::General)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_hyphens_and_case() {
        assert_eq!(normalize_domain("Personal-Development"), SpecialistDomain::PersonalDevelopment);
        assert_eq!(normalize_domain("HEALTH"), SpecialistDomain::Health);
    }

    #[test]
    fn unknown_domain_falls_back_to_general() {
        assert_eq!(normalize_domain("finance"), SpecialistDomain::General);
        assert_eq!(normalize_domain(""), SpecialistDomain::General);
    }

    #[test]
    fn collapses_non_alphanumerics() {
        assert_eq!(normalize_domain("personal!!development"), SpecialistDomain::PersonalDevelopment);
    }
}
