//! Per-pattern attribution for list fields, and the matcher built on it.
//!
//! A pattern list is inherited whole, so every entry of a resolved list comes
//! from the same source. [`PatternMatcher`] uses that to say not only whether
//! a file is counted but which directory's setting left it out.

use glob::Pattern;

use crate::error::{Result, SettingsError};
use crate::field::Field;
use crate::resolve::{Resolution, Source};

/// One entry of a resolved pattern list and where the list came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSource {
    pub pattern: String,
    pub source: Source,
}

/// The resolved list for `field`, each entry attributed to its source.
pub fn pattern_sources(resolution: &Resolution, field: Field) -> Result<Vec<PatternSource>> {
    let patterns = resolution
        .resolved
        .patterns(field)
        .ok_or(SettingsError::NotAPatternField(field))?;
    let source = resolution.provenance.get(field);
    Ok(patterns
        .iter()
        .map(|pattern| PatternSource {
            pattern: pattern.clone(),
            source: source.clone(),
        })
        .collect())
}

/// Why a file is or is not counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Counted,
    Excluded { pattern: String, source: Source },
    /// Include patterns are set and none of them matched.
    NotIncluded,
}

/// A directory's include/exclude lists compiled to globs.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    exclude: Vec<(Pattern, PatternSource)>,
    include: Vec<Pattern>,
}

impl PatternMatcher {
    pub fn new(resolution: &Resolution) -> Result<Self> {
        let exclude = pattern_sources(resolution, Field::ExcludePatterns)?
            .into_iter()
            .map(|entry| Ok((compile(&entry.pattern)?, entry)))
            .collect::<Result<Vec<_>>>()?;
        let include = pattern_sources(resolution, Field::IncludePatterns)?
            .iter()
            .map(|entry| compile(&entry.pattern))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { exclude, include })
    }

    /// Judge a file path relative to the project root. Excludes are checked
    /// first; an empty include list admits everything.
    pub fn verdict(&self, relative_path: &str) -> Verdict {
        let path = relative_path.replace('\\', "/");
        let path = path.trim_start_matches("./");

        if let Some((_, entry)) = self.exclude.iter().find(|(p, _)| p.matches(path)) {
            return Verdict::Excluded {
                pattern: entry.pattern.clone(),
                source: entry.source.clone(),
            };
        }
        if self.include.is_empty() || self.include.iter().any(|p| p.matches(path)) {
            Verdict::Counted
        } else {
            Verdict::NotIncluded
        }
    }

    pub fn is_counted(&self, relative_path: &str) -> bool {
        self.verdict(relative_path) == Verdict::Counted
    }
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| SettingsError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}
