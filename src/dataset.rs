//! Ceremony datasets.
//!
//! One JSON file per year lives in the data directory. Two layouts exist: the
//! current one (ids everywhere, `winners.my_choice`) and the legacy 2025 one
//! (`film` as a plain string, `my_winner` as a whole nominee). Legacy files
//! are normalized into the current layout at load time.

use crate::media::slugify;
use crate::types::*;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid dataset for {year}: {message}")]
    Invalid { year: Year, message: String },
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyNominee {
    #[serde(default)]
    pub actor: Option<String>,
    pub film: String,
    #[serde(default)]
    pub crew: Option<String>,
    #[serde(default)]
    pub not_seen: bool,
    #[serde(default)]
    pub trailer: Option<String>,
    #[serde(default)]
    pub photos: Vec<String>,
}

impl LegacyNominee {
    fn same_as(&self, other: &LegacyNominee) -> bool {
        self.film == other.film && self.actor == other.actor
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LegacyCategory {
    pub name: String,
    pub nominees: Vec<LegacyNominee>,
    #[serde(default)]
    pub my_winner: Option<LegacyNominee>,
    #[serde(default)]
    pub official_winner: Option<LegacyNominee>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LegacyCeremony {
    pub year: Year,
    pub categories: Vec<LegacyCategory>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DatasetFile {
    Current(Ceremony),
    Legacy(LegacyCeremony),
}

/// Parse a dataset in either layout
pub fn parse_ceremony(raw: &str) -> Result<Ceremony, serde_json::Error> {
    let file: DatasetFile = serde_json::from_str(raw)?;
    Ok(match file {
        DatasetFile::Current(ceremony) => ceremony,
        DatasetFile::Legacy(legacy) => adapt_legacy(legacy),
    })
}

/// Convert a legacy ceremony into the current layout
pub fn adapt_legacy(legacy: LegacyCeremony) -> Ceremony {
    Ceremony {
        year: legacy.year,
        categories: legacy.categories.into_iter().map(adapt_category).collect(),
    }
}

fn adapt_category(legacy: LegacyCategory) -> Category {
    let mut used = HashSet::new();
    let ids: Vec<NomineeId> = legacy
        .nominees
        .iter()
        .map(|n| {
            let base = match &n.actor {
                Some(actor) => format!("{}-{}", slugify(actor), slugify(&n.film)),
                None => slugify(&n.film),
            }
            .to_lowercase();
            let mut id = base.clone();
            let mut suffix = 2;
            while !used.insert(id.clone()) {
                id = format!("{}-{}", base, suffix);
                suffix += 1;
            }
            id
        })
        .collect();

    let resolve = |winner: &Option<LegacyNominee>| -> Option<NomineeId> {
        let winner = winner.as_ref()?;
        legacy
            .nominees
            .iter()
            .position(|n| n.same_as(winner))
            .map(|index| ids[index].clone())
    };

    let winners = Winners {
        my_choice: resolve(&legacy.my_winner),
        official: resolve(&legacy.official_winner),
    };

    let nominees = legacy
        .nominees
        .iter()
        .zip(&ids)
        .map(|(n, id)| adapt_nominee(n, id))
        .collect();

    Category {
        id: legacy.name.clone(),
        name: legacy.name,
        nominees,
        winners,
        reveal_video: None,
    }
}

fn adapt_nominee(legacy: &LegacyNominee, id: &str) -> Nominee {
    let person = legacy.actor.as_ref().map(|name| Person {
        id: slugify(name).to_lowercase(),
        name: name.clone(),
        images: legacy.photos.split_first().map(|(primary, rest)| PersonImages {
            primary: ImageAsset {
                path: primary.clone(),
                alt: Some(name.clone()),
            },
            secondary: None,
            additional: rest
                .iter()
                .map(|path| ImageAsset {
                    path: path.clone(),
                    alt: Some(name.clone()),
                })
                .collect(),
        }),
    });

    let crew = legacy
        .crew
        .as_deref()
        .map(|crew| {
            crew.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| CrewMember {
                    id: slugify(name).to_lowercase(),
                    name: name.to_string(),
                    role: None,
                })
                .collect()
        })
        .unwrap_or_default();

    Nominee {
        id: id.to_string(),
        film: Film {
            id: slugify(&legacy.film).to_lowercase(),
            title: legacy.film.clone(),
            poster: None,
            trailer: legacy.trailer.clone(),
        },
        person,
        crew,
        metadata: NomineeMetadata {
            not_seen: legacy.not_seen,
            notes: None,
        },
    }
}

/// Check the invariants the reveal and vote code relies on
pub fn validate(ceremony: &Ceremony) -> Result<(), DatasetError> {
    let invalid = |message: String| DatasetError::Invalid {
        year: ceremony.year,
        message,
    };

    let mut category_ids = HashSet::new();
    for category in &ceremony.categories {
        if !category_ids.insert(category.id.as_str()) {
            return Err(invalid(format!("duplicate category id '{}'", category.id)));
        }

        let mut nominee_ids = HashSet::new();
        for nominee in &category.nominees {
            if !nominee_ids.insert(nominee.id.as_str()) {
                return Err(invalid(format!(
                    "duplicate nominee id '{}' in '{}'",
                    nominee.id, category.name
                )));
            }
        }

        for (label, winner) in [
            ("my_choice", &category.winners.my_choice),
            ("official", &category.winners.official),
        ] {
            if let Some(id) = winner {
                if !nominee_ids.contains(id.as_str()) {
                    return Err(invalid(format!(
                        "{} '{}' is not a nominee of '{}'",
                        label, id, category.name
                    )));
                }
            }
        }
    }
    Ok(())
}

/// Load and validate one dataset file
pub fn load_file(path: &Path) -> Result<Ceremony, DatasetError> {
    let raw = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let ceremony = parse_ceremony(&raw).map_err(|e| DatasetError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    validate(&ceremony)?;
    Ok(ceremony)
}

/// Load every `*.json` dataset in `dir`, keyed by year.
///
/// Broken files are logged and skipped.
pub fn load_dir(dir: &Path) -> BTreeMap<Year, Ceremony> {
    let mut ceremonies = BTreeMap::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!("Failed to read data directory {}: {}", dir.display(), e);
            return ceremonies;
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    paths.sort();

    for path in paths {
        match load_file(&path) {
            Ok(ceremony) => {
                tracing::info!(
                    "Loaded {} ceremony ({} categories) from {}",
                    ceremony.year,
                    ceremony.categories.len(),
                    path.display()
                );
                if ceremonies.insert(ceremony.year, ceremony).is_some() {
                    tracing::warn!("{} overrides an earlier dataset for the same year", path.display());
                }
            }
            Err(e) => tracing::warn!("Skipping dataset: {}", e),
        }
    }

    ceremonies
}
