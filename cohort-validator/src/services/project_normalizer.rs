//! Project name normalization
//!
//! Resolves a free-text project name against one directory snapshot. A single
//! suffix-completion retry is allowed ("en" → "enwiki"); nothing fuzzier.

use thiserror::Error;

use crate::directory::{ProjectMap, StoreLocation};

/// Canonical project and its store location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedProject {
    pub name: String,
    pub location: StoreLocation,
}

/// Neither the name nor the name plus suffix is in the directory
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown project: {0}")]
pub struct UnknownProject(pub String);

pub struct ProjectNormalizer<'a> {
    directory: &'a ProjectMap,
    suffix: &'a str,
}

impl<'a> ProjectNormalizer<'a> {
    pub fn new(directory: &'a ProjectMap, suffix: &'a str) -> Self {
        Self { directory, suffix }
    }

    /// **Algorithm:**
    /// 1. Trim and lower-case
    /// 2. Look up directly
    /// 3. If absent, append the suffix and look up once more
    /// 4. Otherwise fail with the raw input
    pub fn normalize(&self, raw: &str) -> Result<NormalizedProject, UnknownProject> {
        let name = raw.trim().to_lowercase();

        if let Some(location) = self.directory.get(&name) {
            return Ok(NormalizedProject {
                name,
                location: location.clone(),
            });
        }

        let suffixed = format!("{}{}", name, self.suffix);
        match self.directory.get(&suffixed) {
            Some(location) => Ok(NormalizedProject {
                name: suffixed,
                location: location.clone(),
            }),
            None => Err(UnknownProject(raw.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn directory(projects: &[&str]) -> ProjectMap {
        Arc::new(
            projects
                .iter()
                .map(|p| (p.to_string(), StoreLocation::new("s1")))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_direct_match() {
        let dir = directory(&["enwiki"]);
        let normalized = ProjectNormalizer::new(&dir, "wiki").normalize("enwiki").unwrap();
        assert_eq!(normalized.name, "enwiki");
        assert_eq!(normalized.location, StoreLocation::new("s1"));
    }

    #[test]
    fn test_suffix_fallback() {
        let dir = directory(&["enwiki"]);
        assert_eq!(ProjectNormalizer::new(&dir, "wiki").normalize("en").unwrap().name, "enwiki");
    }

    #[test]
    fn test_exact_entry_preferred_over_suffix() {
        let dir = directory(&["en", "enwiki"]);
        assert_eq!(ProjectNormalizer::new(&dir, "wiki").normalize("en").unwrap().name, "en");
    }

    #[test]
    fn test_short_name_fails_without_suffixed_entry() {
        let dir = directory(&["dewiki"]);
        assert_eq!(
            ProjectNormalizer::new(&dir, "wiki").normalize("en"),
            Err(UnknownProject("en".to_string()))
        );
    }

    #[test]
    fn test_unknown_project_keeps_raw_name() {
        let dir = directory(&["enwiki"]);
        let err = ProjectNormalizer::new(&dir, "wiki").normalize("bogus").unwrap_err();
        assert_eq!(err.0, "bogus");
    }

    #[test]
    fn test_whitespace_and_case_ignored() {
        let dir = directory(&["enwiki"]);
        assert_eq!(ProjectNormalizer::new(&dir, "wiki").normalize("  EnWiki ").unwrap().name, "enwiki");
        assert_eq!(ProjectNormalizer::new(&dir, "wiki").normalize(" EN").unwrap().name, "enwiki");
    }

    #[test]
    fn test_suffix_applied_only_once() {
        let dir = directory(&["enwikiwiki"]);
        assert!(ProjectNormalizer::new(&dir, "wiki").normalize("en").is_err());
    }
}
