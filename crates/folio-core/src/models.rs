//! Data models for Folio
//!
//! Defines the full resume document and its lightweight index projection.
//! Field names serialize as camelCase so exported files stay compatible
//! with documents produced by the browser editor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title given to a resume created without one
pub const DEFAULT_TITLE: &str = "Untitled resume";

/// Template applied to new resumes
pub const DEFAULT_TEMPLATE: &str = "modern";

/// Contact block at the top of a resume
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BasicInfo {
    pub name: String,
    /// Desired position
    pub title: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// A position held
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Experience {
    pub id: String,
    pub company: String,
    pub position: String,
    /// `YYYY-MM`
    pub start_date: String,
    /// `YYYY-MM` or `present`
    pub end_date: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Education {
    pub id: String,
    pub school: String,
    pub degree: String,
    pub major: String,
    pub start_date: String,
    pub end_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa: Option<String>,
}

/// Self-assessed proficiency for a skill group
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    /// Grouping such as "Languages" or "Frameworks"
    pub category: String,
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<SkillLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub role: String,
    pub start_date: String,
    pub end_date: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tech_stack: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Text,
    List,
    Timeline,
}

/// Free-form section defined by the user
///
/// `content` is opaque to storage and kept as raw JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CustomBlock {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub content: serde_json::Value,
    pub order: u32,
}

/// Visual settings applied by the template renderer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    pub color: String,
    pub font_family: String,
    pub font_size: u32,
    pub line_height: f32,
    pub spacing: u32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            color: "#2563eb".to_string(),
            font_family: "sans-serif".to_string(),
            font_size: 14,
            line_height: 1.5,
            spacing: 24,
        }
    }
}

fn default_section_order() -> Vec<String> {
    ["experience", "projects", "education", "skills"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

/// A complete resume document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resume {
    /// Unique identifier, never changes after creation
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub basic: BasicInfo,
    #[serde(default)]
    pub experiences: Vec<Experience>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub skills: Vec<Skill>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub custom_blocks: Vec<CustomBlock>,
    #[serde(default = "default_template")]
    pub template_id: String,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_section_order")]
    pub section_order: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Resume {
    /// Create an empty resume with a fresh id
    ///
    /// An empty title falls back to [`DEFAULT_TITLE`].
    pub fn new(title: impl Into<String>, template_id: impl Into<String>) -> Self {
        let title = title.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: if title.trim().is_empty() {
                DEFAULT_TITLE.to_string()
            } else {
                title
            },
            basic: BasicInfo::default(),
            experiences: Vec::new(),
            education: Vec::new(),
            skills: Vec::new(),
            projects: Vec::new(),
            custom_blocks: Vec::new(),
            template_id: template_id.into(),
            theme: Theme::default(),
            section_order: default_section_order(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a resume with a specific id (for tests and imports)
    pub fn with_id(id: impl Into<String>, title: impl Into<String>) -> Self {
        let mut resume = Self::new(title, DEFAULT_TEMPLATE);
        resume.id = id.into();
        resume
    }

    /// Update the title
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
        self.touch();
    }

    /// Switch the template
    pub fn set_template(&mut self, template_id: impl Into<String>) {
        self.template_id = template_id.into();
        self.touch();
    }

    /// Bump the update timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Copy this resume under a new id with fresh timestamps
    pub fn duplicate(&self) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: format!("{} (copy)", self.title),
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Project this document into its index entry
    pub fn meta(&self) -> ResumeMeta {
        ResumeMeta {
            id: self.id.clone(),
            title: self.title.clone(),
            template_id: self.template_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            thumbnail: None,
            is_synced: None,
        }
    }
}

/// Index entry for a resume
///
/// Listing reads only these, never the full documents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResumeMeta {
    pub id: String,
    pub title: String,
    pub template_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Base64 preview image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_synced: Option<bool>,
}

/// Insert or replace `meta` in `index`, keyed by id
///
/// Existing entries keep their position; new ones are appended.
pub(crate) fn upsert_meta(index: &mut Vec<ResumeMeta>, meta: ResumeMeta) {
    match index.iter_mut().find(|entry| entry.id == meta.id) {
        Some(entry) => *entry = meta,
        None => index.push(meta),
    }
}

/// Sort index entries newest first
pub(crate) fn sort_by_recent(index: &mut [ResumeMeta]) {
    index.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}
