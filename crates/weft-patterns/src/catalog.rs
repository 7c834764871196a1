//! Pattern catalog: named templates loaded once from a static store.
//!
//! A directory store holds one sub-directory per pattern:
//!
//! ```text
//! patterns/
//!   summarize/
//!     system.md      (required)
//!     user.md        (optional seed message)
//!     pattern.toml   (optional: category, description)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::builtin::builtin_patterns;
use crate::error::CatalogError;
use crate::types::{family_of, Pattern, PatternCategory};

const DESCRIPTION_MAX_CHARS: usize = 120;

#[derive(Debug, Default, Deserialize)]
struct PatternManifest {
    category: Option<String>,
    description: Option<String>,
}

/// Immutable `{name -> Pattern}` map plus the set of categories present.
#[derive(Debug, Clone, Default)]
pub struct PatternCatalog {
    patterns: BTreeMap<String, Pattern>,
    categories: BTreeSet<PatternCategory>,
}

impl PatternCatalog {
    /// Build a catalog from already-constructed patterns. Later duplicates win.
    pub fn from_patterns(patterns: impl IntoIterator<Item = Pattern>) -> Self {
        let mut catalog = Self::default();
        for pattern in patterns {
            catalog.categories.insert(pattern.category);
            catalog.patterns.insert(pattern.name.clone(), pattern);
        }
        catalog
    }

    /// The built-in pattern set.
    pub fn builtin() -> Self {
        Self::from_patterns(builtin_patterns())
    }

    /// An empty catalog. Suggestion and execution are disabled against it.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every pattern sub-directory of `dir`.
    ///
    /// Sub-directories without a `system.md` are skipped. A store that
    /// yields no patterns at all is an error.
    pub fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        let mut patterns = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            let system_path = path.join("system.md");
            if !system_path.exists() {
                debug!(pattern = %name, "Skipping directory without system.md");
                continue;
            }
            patterns.push(load_pattern(&name, &path)?);
        }

        if patterns.is_empty() {
            return Err(CatalogError::Empty(dir.display().to_string()));
        }

        let catalog = Self::from_patterns(patterns);
        info!(
            dir = %dir.display(),
            patterns = catalog.len(),
            categories = catalog.categories.len(),
            "Pattern catalog loaded"
        );
        Ok(catalog)
    }

    /// Load from `dir` when given, otherwise use the built-in set.
    ///
    /// A failed load yields an empty catalog so the caller can keep running
    /// with suggestion and execution disabled.
    pub fn load_or_empty(dir: Option<&Path>) -> Self {
        match dir {
            None => Self::builtin(),
            Some(dir) => match Self::load_dir(dir) {
                Ok(catalog) => catalog,
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "Pattern catalog unavailable");
                    Self::empty()
                }
            },
        }
    }

    pub fn get(&self, name: &str) -> Option<&Pattern> {
        self.patterns.get(name)
    }

    /// Look up a pattern, failing with [`CatalogError::NotFound`].
    pub fn require(&self, name: &str) -> Result<&Pattern, CatalogError> {
        self.get(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Pattern names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.patterns.keys().map(String::as_str)
    }

    /// Categories present in the catalog, in declaration order.
    pub fn categories(&self) -> impl Iterator<Item = PatternCategory> + '_ {
        self.categories.iter().copied()
    }

    /// Patterns of one category, sorted by name.
    pub fn patterns_in(&self, category: PatternCategory) -> Vec<&Pattern> {
        self.patterns
            .values()
            .filter(|p| p.category == category)
            .collect()
    }

    /// Find a same-family pattern for a name absent from the catalog.
    ///
    /// The family is the first `_`-separated token. An exact family-name
    /// pattern is preferred, then the first family member by name.
    pub fn family_fallback(&self, name: &str) -> Option<&Pattern> {
        let family = family_of(name);
        if family.is_empty() {
            return None;
        }
        if let Some(exact) = self.patterns.get(family) {
            return Some(exact);
        }
        self.patterns.values().find(|p| p.family() == family)
    }

    /// One line per pattern (`name [category]: description`) for backend prompts.
    pub fn describe_for_prompt(&self) -> String {
        self.patterns
            .values()
            .map(|p| format!("- {} [{}]: {}", p.name, p.category, p.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn load_pattern(name: &str, dir: &Path) -> Result<Pattern, CatalogError> {
    let system_prompt = std::fs::read_to_string(dir.join("system.md"))?;
    if system_prompt.trim().is_empty() {
        return Err(CatalogError::Invalid {
            name: name.to_string(),
            reason: "empty system prompt".to_string(),
        });
    }

    let user_path = dir.join("user.md");
    let user_prompt = if user_path.exists() {
        let text = std::fs::read_to_string(&user_path)?;
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    } else {
        None
    };

    let manifest_path = dir.join("pattern.toml");
    let manifest: PatternManifest = if manifest_path.exists() {
        let raw = std::fs::read_to_string(&manifest_path)?;
        toml::from_str(&raw).map_err(|e| CatalogError::Invalid {
            name: name.to_string(),
            reason: e.to_string(),
        })?
    } else {
        PatternManifest::default()
    };

    let category = match manifest.category.as_deref() {
        Some(raw) => raw.parse().map_err(|reason| CatalogError::Invalid {
            name: name.to_string(),
            reason,
        })?,
        None => PatternCategory::infer_from_name(name),
    };

    let description = manifest
        .description
        .unwrap_or_else(|| describe_from_prompt(&system_prompt));

    Ok(Pattern {
        name: name.to_string(),
        category,
        system_prompt,
        user_prompt,
        description,
    })
}

/// First prose line of a prompt, skipping markdown headings.
fn describe_from_prompt(prompt: &str) -> String {
    let line = prompt
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with('#'))
        .unwrap_or("");
    if line.chars().count() > DESCRIPTION_MAX_CHARS {
        let truncated: String = line.chars().take(DESCRIPTION_MAX_CHARS - 3).collect();
        format!("{}...", truncated)
    } else {
        line.to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
