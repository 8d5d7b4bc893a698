//! Requirement record produced by the extractor.
//!
//! The model may answer each category with a list, a bare string, or nothing at all.
//! `RequirementValue` normalizes that shape once so later stages never branch on raw JSON.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::JobRecord;

/// The seven categories the extractor asks the model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementCategory {
    RequiredSkills,
    SoftSkills,
    ExperienceLevel,
    EducationRequirements,
    KeyResponsibilities,
    IndustryKeywords,
    CompanyCulture,
}

impl RequirementCategory {
    pub const ALL: [RequirementCategory; 7] = [
        RequirementCategory::RequiredSkills,
        RequirementCategory::SoftSkills,
        RequirementCategory::ExperienceLevel,
        RequirementCategory::EducationRequirements,
        RequirementCategory::KeyResponsibilities,
        RequirementCategory::IndustryKeywords,
        RequirementCategory::CompanyCulture,
    ];

    pub fn key(self) -> &'static str {
        match self {
            RequirementCategory::RequiredSkills => "required_skills",
            RequirementCategory::SoftSkills => "soft_skills",
            RequirementCategory::ExperienceLevel => "experience_level",
            RequirementCategory::EducationRequirements => "education_requirements",
            RequirementCategory::KeyResponsibilities => "key_responsibilities",
            RequirementCategory::IndustryKeywords => "industry_keywords",
            RequirementCategory::CompanyCulture => "company_culture",
        }
    }
}

/// A requirement field after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequirementValue {
    #[default]
    Absent,
    Single(String),
    List(Vec<String>),
}

impl RequirementValue {
    /// Null, missing, and empty-string values are `Absent`. Non-string scalars
    /// and list items are stringified.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => RequirementValue::Absent,
            Some(Value::String(s)) if s.is_empty() => RequirementValue::Absent,
            Some(Value::String(s)) => RequirementValue::Single(s.clone()),
            Some(Value::Array(items)) => {
                RequirementValue::List(items.iter().map(item_to_string).collect())
            }
            Some(other) => RequirementValue::Single(other.to_string()),
        }
    }

    /// The value as a list: scalars become one element, absent becomes empty.
    pub fn items(&self) -> Vec<&str> {
        match self {
            RequirementValue::Absent => Vec::new(),
            RequirementValue::Single(s) => vec![s.as_str()],
            RequirementValue::List(items) => items.iter().map(String::as_str).collect(),
        }
    }

    /// Number of items that are not blank.
    pub fn non_empty_count(&self) -> usize {
        self.items()
            .into_iter()
            .filter(|item| !item.trim().is_empty())
            .count()
    }

    /// Comma-joined text for prompt assembly.
    pub fn joined(&self) -> String {
        self.items().join(", ")
    }

    pub fn is_present(&self) -> bool {
        !self.joined().trim().is_empty()
    }
}

fn item_to_string(item: &Value) -> String {
    match item {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Record substituted when the extraction reply is not a JSON object.
/// Carries the raw job fields verbatim and no requirement categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackRequirements {
    pub job_title: String,
    pub company: String,
    pub description: String,
    pub job_category: String,
    pub role: String,
}

impl FallbackRequirements {
    pub fn from_job(job: &JobRecord) -> Self {
        Self {
            job_title: job.title_raw.clone(),
            company: job.company.clone(),
            description: job.description.clone(),
            job_category: job.job_category.clone(),
            role: job.role_k50.clone(),
        }
    }
}

/// Outcome of the extraction stage. Serialized as
/// `{"source": "parsed" | "fallback", "requirements": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", content = "requirements", rename_all = "snake_case")]
pub enum ExtractedRequirements {
    /// The model's JSON object, exactly as returned.
    Parsed(Map<String, Value>),
    Fallback(FallbackRequirements),
}

impl ExtractedRequirements {
    pub fn field(&self, category: RequirementCategory) -> RequirementValue {
        match self {
            ExtractedRequirements::Parsed(map) => {
                RequirementValue::from_json(map.get(category.key()))
            }
            ExtractedRequirements::Fallback(_) => RequirementValue::Absent,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ExtractedRequirements::Fallback(_))
    }

    /// The plain record, without the source tag.
    pub fn to_json(&self) -> Value {
        match self {
            ExtractedRequirements::Parsed(map) => Value::Object(map.clone()),
            ExtractedRequirements::Fallback(fallback) => {
                serde_json::to_value(fallback).unwrap_or(Value::Null)
            }
        }
    }
}
