use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type CategoryId = String;
pub type NomineeId = String;
pub type VisitorId = String;
pub type Year = u16;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageAsset {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PersonImages {
    pub primary: ImageAsset,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<ImageAsset>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional: Vec<ImageAsset>,
}

impl PersonImages {
    /// All image paths in display order (primary, secondary, additional)
    pub fn paths(&self) -> Vec<String> {
        std::iter::once(&self.primary)
            .chain(self.secondary.iter())
            .chain(self.additional.iter())
            .map(|img| img.path.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<PersonImages>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Film {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<ImageAsset>,
    /// Trailer URL (usually YouTube)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailer: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CrewMember {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NomineeMetadata {
    #[serde(default)]
    pub not_seen: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Nominee {
    pub id: NomineeId,
    pub film: Film,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<Person>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub crew: Vec<CrewMember>,
    #[serde(default)]
    pub metadata: NomineeMetadata,
}

impl Nominee {
    /// Headline shown on the card: the person if there is one, else the film
    pub fn title(&self) -> &str {
        match &self.person {
            Some(person) => &person.name,
            None => &self.film.title,
        }
    }

    /// Secondary line: the film for person nominees, else the crew names
    pub fn description(&self) -> String {
        if self.person.is_some() {
            return self.film.title.clone();
        }
        self.crew
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Winners {
    /// The curator's pick
    #[serde(default)]
    pub my_choice: Option<NomineeId>,
    /// The Academy's winner (display only)
    #[serde(default)]
    pub official: Option<NomineeId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub nominees: Vec<Nominee>,
    pub winners: Winners,
    /// Video opened automatically once the curator's pick is revealed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reveal_video: Option<String>,
}

impl Category {
    pub fn nominee(&self, nominee_id: &str) -> Option<&Nominee> {
        self.nominees.iter().find(|n| n.id == nominee_id)
    }

    pub fn curator_pick(&self) -> Option<&NomineeId> {
        self.winners.my_choice.as_ref()
    }
}

/// A full year of categories, loaded once and never mutated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ceremony {
    pub year: Year,
    pub categories: Vec<Category>,
}

impl Ceremony {
    pub fn category(&self, category_id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == category_id)
    }

    pub fn position(&self, category_id: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.id == category_id)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Fr,
    En,
}

impl Language {
    pub fn toggled(self) -> Self {
        match self {
            Language::Fr => Language::En,
            Language::En => Language::Fr,
        }
    }
}
