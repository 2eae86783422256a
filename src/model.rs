//! # Catalog records
//! One `Record` type covers both careers and universities; the API returns
//! Spanish camelCase field names, which are kept on the wire.

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};

/// Shown when a record carries no description.
pub const NO_DESCRIPTION: &str = "Sin descripción disponible";
/// Shown when a record carries no image.
pub const PLACEHOLDER_IMAGE: &str = "https://placehold.co/100x100?text=Uni";

/// Careers use UUID strings, universities use integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

/// Where a record's compatibility score came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreOrigin {
    /// Supplied by the API (> 0).
    Server,
    /// Placeholder generated during enrichment.
    Synthetic,
    /// Absent and not synthesized.
    #[default]
    Unknown,
}

/// Optional fields never fail a record: a value of the wrong type reads as
/// absent (numbers and booleans are kept as text). Only `id` and `nombre`
/// are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(rename = "nombre", deserialize_with = "required_text")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(
        rename = "descripcion",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    #[serde(
        rename = "duracion",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<String>,
    #[serde(
        rename = "modalidad",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub modality: Option<String>,
    #[serde(
        rename = "ubicacion",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub location: Option<String>,
    /// "Pública" / "Privada" for universities.
    #[serde(
        rename = "tipo",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(
        rename = "imagen",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub image: Option<String>,
    #[serde(default, deserialize_with = "lenient_text", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(
        rename = "salarioPromedio",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub average_salary: Option<String>,
    #[serde(
        rename = "universidades",
        default,
        deserialize_with = "lenient_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub universities: Vec<String>,
    /// Compatibility score ("AI match"), 0..=100.
    #[serde(
        rename = "matchIA",
        default,
        deserialize_with = "lenient_score",
        skip_serializing_if = "Option::is_none"
    )]
    pub match_score: Option<f64>,
    #[serde(
        rename = "motivoMatch",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub match_reason: Option<String>,
    #[serde(rename = "scoreOrigin", default, deserialize_with = "lenient_origin")]
    pub score_origin: ScoreOrigin,
}

fn text_of(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn required_text<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    text_of(Value::deserialize(d)?).ok_or_else(|| D::Error::custom("nombre is not text"))
}

fn lenient_text<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(text_of(Value::deserialize(d)?))
}

/// Non-text entries and `null` are dropped; a bare string becomes one entry.
fn lenient_list<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items.into_iter().filter_map(text_of).collect(),
        Value::String(s) => vec![s],
        _ => Vec::new(),
    })
}

/// Numbers, or numeric strings like "87".
fn lenient_score<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let score = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(score.filter(|s| s.is_finite()))
}

fn lenient_origin<'de, D>(d: D) -> Result<ScoreOrigin, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(serde_json::from_value(Value::deserialize(d)?).unwrap_or_default())
}

impl Record {
    /// Minimal record; the remaining fields start empty.
    pub fn new(id: RecordId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            area: None,
            description: None,
            duration: None,
            modality: None,
            location: None,
            kind: None,
            image: None,
            url: None,
            average_salary: None,
            universities: Vec::new(),
            match_score: None,
            match_reason: None,
            score_origin: ScoreOrigin::Unknown,
        }
    }

    pub fn description_or_default(&self) -> &str {
        match self.description.as_deref() {
            Some(d) if !d.trim().is_empty() => d,
            _ => NO_DESCRIPTION,
        }
    }

    pub fn image_or_default(&self) -> &str {
        match self.image.as_deref() {
            Some(i) if !i.trim().is_empty() => i,
            _ => PLACEHOLDER_IMAGE,
        }
    }

    /// Score used for ordering and thresholds; absent counts as 0.
    pub fn score_or_zero(&self) -> f64 {
        self.match_score.filter(|s| s.is_finite()).unwrap_or(0.0)
    }
}

/// Remote collections exposed by the directory API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Careers,
    Universities,
}

impl Collection {
    /// Path relative to the API base URL. The careers route only answers
    /// with its trailing slash.
    pub fn path(self) -> &'static str {
        match self {
            Collection::Careers => "careers/",
            Collection::Universities => "universities",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Collection::Careers => "careers",
            Collection::Universities => "universities",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "careers" | "carreras" => Ok(Collection::Careers),
            "universities" | "universidades" => Ok(Collection::Universities),
            other => anyhow::bail!("unknown collection: {other}"),
        }
    }
}
