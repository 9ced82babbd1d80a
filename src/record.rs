//! Record types shared by the store, the enrichment client, and the server.
//!
//! `EnrichedRecord` field order is the on-disk column order; `ENRICHED_COLUMNS`
//! must stay in sync with it.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column order of the enriched store.
pub const ENRICHED_COLUMNS: [&str; 18] = [
    "name",
    "url",
    "city",
    "state",
    "type",
    "size_category",
    "acceptance_rate",
    "sat_50th_percentile",
    "act_50th_percentile",
    "tuition_in_state",
    "tuition_out_state",
    "graduation_rate",
    "enrollment",
    "region",
    "popular_majors",
    "median_earnings_10_years",
    "campus_setting",
    "ipeds_id",
];

/// Header token that marks the first row of a base list or store as a header.
const HEADER_TOKEN: &str = "name";

/// Separator used when storing `popular_majors` as a single field.
const MAJORS_SEPARATOR: &str = ", ";

/// One entry of the base list: what must eventually be enriched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseRecord {
    pub name: String,
    pub url: String,
}

impl BaseRecord {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    pub fn key(&self) -> String {
        normalized_key(&self.name)
    }
}

/// Trimmed, case-folded form of a name used for uniqueness checks.
pub fn normalized_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Whether a first cell marks its row as a header.
pub(crate) fn is_header_cell(cell: &str) -> bool {
    cell.trim().eq_ignore_ascii_case(HEADER_TOKEN)
}

/// US region bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    Northeast,
    Southeast,
    Midwest,
    Southwest,
    West,
}

impl Region {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "northeast" => Some(Self::Northeast),
            "southeast" => Some(Self::Southeast),
            "midwest" => Some(Self::Midwest),
            "southwest" => Some(Self::Southwest),
            "west" => Some(Self::West),
            _ => None,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Northeast => "Northeast",
            Self::Southeast => "Southeast",
            Self::Midwest => "Midwest",
            Self::Southwest => "Southwest",
            Self::West => "West",
        };
        f.write_str(label)
    }
}

/// Campus surroundings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampusSetting {
    Urban,
    Suburban,
    Rural,
}

impl CampusSetting {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "urban" => Some(Self::Urban),
            "suburban" => Some(Self::Suburban),
            "rural" => Some(Self::Rural),
            _ => None,
        }
    }
}

/// A fully normalized store row.
///
/// Optional fields serialize as blank CSV cells so every row keeps the same
/// width.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub name: String,
    pub url: String,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "type")]
    pub institution_type: Option<String>,
    pub size_category: Option<String>,
    pub acceptance_rate: Option<f64>,
    pub sat_50th_percentile: Option<u32>,
    pub act_50th_percentile: Option<u32>,
    pub tuition_in_state: Option<u64>,
    pub tuition_out_state: Option<u64>,
    pub graduation_rate: Option<f64>,
    pub enrollment: Option<u64>,
    pub region: Option<Region>,
    #[serde(default)]
    pub popular_majors: String,
    pub median_earnings_10_years: Option<u64>,
    pub campus_setting: Option<CampusSetting>,
    pub ipeds_id: Option<String>,
}

impl EnrichedRecord {
    /// A record with only the identifying columns filled in.
    pub fn bare(base: &BaseRecord) -> Self {
        Self {
            name: base.name.clone(),
            url: base.url.clone(),
            ..Self::default()
        }
    }

    pub fn key(&self) -> String {
        normalized_key(&self.name)
    }
}

/// Join majors for storage; an empty list yields an empty field.
pub(crate) fn join_majors<S: AsRef<str>>(majors: &[S]) -> String {
    majors
        .iter()
        .map(|major| major.as_ref().trim())
        .filter(|major| !major.is_empty())
        .collect::<Vec<_>>()
        .join(MAJORS_SEPARATOR)
}
