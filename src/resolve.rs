//! Inheritance resolution: effective settings for one directory.
//!
//! Operates on pre-loaded data (`ResolveInput`) with no I/O, so every
//! inheritance rule is testable with synthetic chains. For each field the
//! chain is scanned from the target up to the project root and the first
//! directory whose record defines the field wins. When nobody defines it, the
//! global default applies.
//!
//! Pattern lists are never merged: the nearest definer's list is taken whole,
//! including an explicitly empty one.

use std::fmt;

use crate::field::{Field, FieldValue};
use crate::path::DirectoryPath;
use crate::record::SettingsRecord;

/// A value for every field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSettings {
    values: [FieldValue; Field::ALL.len()],
}

impl ResolvedSettings {
    pub(crate) fn from_fn(mut value: impl FnMut(Field) -> FieldValue) -> Self {
        Self {
            values: Field::ALL.map(&mut value),
        }
    }

    pub fn get(&self, field: Field) -> &FieldValue {
        &self.values[field as usize]
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        self.get(field).as_text()
    }

    pub fn count(&self, field: Field) -> Option<u64> {
        self.get(field).as_count()
    }

    pub fn patterns(&self, field: Field) -> Option<&[String]> {
        self.get(field).as_patterns()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        Field::ALL.into_iter().zip(self.values.iter())
    }
}

/// Where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    Directory(DirectoryPath),
    Global,
}

impl Source {
    pub fn directory(&self) -> Option<&DirectoryPath> {
        match self {
            Source::Directory(dir) => Some(dir),
            Source::Global => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Directory(dir) => f.write_str(dir.key()),
            Source::Global => f.write_str("global default"),
        }
    }
}

/// The source of every resolved field. Derived on each resolve, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    sources: [Source; Field::ALL.len()],
}

impl Provenance {
    pub fn get(&self, field: Field) -> &Source {
        &self.sources[field as usize]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &Source)> {
        Field::ALL.into_iter().zip(self.sources.iter())
    }
}

/// One directory on the ancestor chain and its record, if it has one.
#[derive(Debug, Clone)]
pub struct ChainEntry<'a> {
    pub directory: DirectoryPath,
    pub record: Option<&'a SettingsRecord>,
}

/// All pre-loaded data needed to resolve one directory.
#[derive(Debug, Clone)]
pub struct ResolveInput<'a> {
    pub target: DirectoryPath,
    /// Root first, target last.
    pub chain: Vec<ChainEntry<'a>>,
    pub defaults: &'a ResolvedSettings,
}

impl<'a> ResolveInput<'a> {
    /// Build the chain for `target` by looking each ancestor up in `records`.
    pub fn new<F>(target: DirectoryPath, defaults: &'a ResolvedSettings, records: F) -> Self
    where
        F: Fn(&DirectoryPath) -> Option<&'a SettingsRecord>,
    {
        let chain = target
            .chain()
            .into_iter()
            .map(|directory| ChainEntry {
                record: records(&directory),
                directory,
            })
            .collect();
        Self {
            target,
            chain,
            defaults,
        }
    }
}

/// Effective settings for a directory, with enough context to explain them.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub directory: DirectoryPath,
    pub resolved: ResolvedSettings,
    /// The directory's own record; empty when it sets nothing.
    pub current: SettingsRecord,
    /// What the directory would inherit with an empty record. `None` at the
    /// project root, which inherits straight from the global defaults.
    pub parent: Option<ResolvedSettings>,
    pub provenance: Provenance,
}

impl Resolution {
    /// Whether `field` is set on this directory rather than inherited.
    pub fn is_overridden(&self, field: Field) -> bool {
        self.current.contains(field)
    }
}

pub fn resolve_chain(input: ResolveInput<'_>) -> Resolution {
    let entries: Vec<&ChainEntry<'_>> = input
        .chain
        .iter()
        .filter(|entry| entry.directory.is_ancestor_of(&input.target))
        .collect();

    let (resolved, provenance) = fold(&entries, input.defaults);

    let ancestors: Vec<&ChainEntry<'_>> = entries
        .iter()
        .copied()
        .filter(|entry| entry.directory != input.target)
        .collect();
    let parent =
        (!input.target.is_root()).then(|| fold(&ancestors, input.defaults).0);

    let current = entries
        .iter()
        .find(|entry| entry.directory == input.target)
        .and_then(|entry| entry.record)
        .cloned()
        .unwrap_or_default();

    Resolution {
        directory: input.target,
        resolved,
        current,
        parent,
        provenance,
    }
}

/// Nearest definer wins, scanning from the end of `entries` (the deepest).
fn fold(entries: &[&ChainEntry<'_>], defaults: &ResolvedSettings) -> (ResolvedSettings, Provenance) {
    let winner = |field: Field| {
        entries.iter().rev().find_map(|entry| {
            entry
                .record
                .and_then(|record| record.get(field))
                .map(|value| (value, &entry.directory))
        })
    };

    let resolved = ResolvedSettings::from_fn(|field| match winner(field) {
        Some((value, _)) => value.clone(),
        None => defaults.get(field).clone(),
    });
    let provenance = Provenance {
        sources: Field::ALL.map(|field| match winner(field) {
            Some((_, dir)) => Source::Directory(dir.clone()),
            None => Source::Global,
        }),
    };
    (resolved, provenance)
}
