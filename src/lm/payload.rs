//! LM response payload and its normalization into a store record.
//!
//! Models answer loosely: numbers arrive as strings, rates as percentages,
//! majors as a list or a sentence. Deserialization accepts those shapes and
//! `into_record` maps them onto the fixed store schema.
use crate::record::{join_majors, BaseRecord, CampusSetting, EnrichedRecord, Region};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Raw object returned by the LM.
#[derive(Debug, Default, Deserialize)]
pub struct CollegePayload {
    #[serde(default, deserialize_with = "lenient_text")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub state: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient_text")]
    pub institution_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub size_category: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub acceptance_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub sat_50th_percentile: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub act_50th_percentile: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub tuition_in_state: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub tuition_out_state: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub graduation_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub enrollment: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub region: Option<String>,
    #[serde(default)]
    pub popular_majors: Option<MajorsField>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub median_earnings_10_years: Option<f64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub campus_setting: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub ipeds_id: Option<String>,
}

/// `popular_majors` as either a JSON list or a pre-joined string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MajorsField {
    List(Vec<Option<String>>),
    Text(String),
}

impl MajorsField {
    fn joined(&self) -> String {
        match self {
            Self::List(items) => join_majors(&items.iter().flatten().collect::<Vec<_>>()),
            Self::Text(text) => text.trim().to_string(),
        }
    }
}

impl CollegePayload {
    /// Normalize into a store record for `base`.
    ///
    /// Name and url always come from the base entry so the store key cannot
    /// drift from what was requested.
    pub fn into_record(self, base: &BaseRecord) -> EnrichedRecord {
        let region = self.region.as_deref().and_then(|raw| {
            let parsed = Region::parse(raw);
            if parsed.is_none() {
                tracing::debug!(name = %base.name, region = raw, "dropping unknown region");
            }
            parsed
        });
        let campus_setting = self.campus_setting.as_deref().and_then(|raw| {
            let parsed = CampusSetting::parse(raw);
            if parsed.is_none() {
                tracing::debug!(name = %base.name, campus_setting = raw, "dropping unknown campus setting");
            }
            parsed
        });

        EnrichedRecord {
            name: base.name.clone(),
            url: base.url.clone(),
            city: self.city,
            state: self.state.map(|state| state.to_ascii_uppercase()),
            institution_type: self.institution_type,
            size_category: self.size_category,
            acceptance_rate: self.acceptance_rate.and_then(normalize_rate),
            sat_50th_percentile: self.sat_50th_percentile.and_then(whole_u32),
            act_50th_percentile: self.act_50th_percentile.and_then(whole_u32),
            tuition_in_state: self.tuition_in_state.and_then(whole_u64),
            tuition_out_state: self.tuition_out_state.and_then(whole_u64),
            graduation_rate: self.graduation_rate.and_then(normalize_rate),
            enrollment: self.enrollment.and_then(whole_u64),
            region,
            popular_majors: self
                .popular_majors
                .as_ref()
                .map(MajorsField::joined)
                .unwrap_or_default(),
            median_earnings_10_years: self.median_earnings_10_years.and_then(whole_u64),
            campus_setting,
            ipeds_id: self.ipeds_id,
        }
    }
}

/// Rates are stored as decimals in `[0, 1]`; percentages are scaled down.
fn normalize_rate(value: f64) -> Option<f64> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    if value <= 1.0 {
        return Some(value);
    }
    if value <= 100.0 {
        return Some(value / 100.0);
    }
    None
}

fn whole_u64(value: f64) -> Option<u64> {
    if !value.is_finite() || !(0.0..=u64::MAX as f64).contains(&value) {
        return None;
    }
    Some(value.round() as u64)
}

fn whole_u32(value: f64) -> Option<u32> {
    whole_u64(value).and_then(|whole| u32::try_from(whole).ok())
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => parse_numeric_text(&text),
        _ => None,
    })
}

fn parse_numeric_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, '$' | ',' | '%' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> CollegePayload {
        serde_json::from_str(json).expect("parse payload")
    }

    fn reed() -> BaseRecord {
        BaseRecord::new("Reed College", "https://www.reed.edu")
    }

    #[test]
    fn full_payload_normalizes() {
        let payload = parse(
            r#"{
                "name": "Reed",
                "url": "https://wrong.example",
                "city": "Portland",
                "state": "or",
                "type": "Private",
                "size_category": "Small",
                "acceptance_rate": 0.39,
                "sat_50th_percentile": 1380,
                "act_50th_percentile": 31,
                "tuition_in_state": 64810,
                "tuition_out_state": 64810,
                "graduation_rate": 0.8,
                "enrollment": 1500,
                "region": "West",
                "popular_majors": ["Biology", "Psychology", "Economics"],
                "median_earnings_10_years": 52000,
                "campus_setting": "Urban",
                "ipeds_id": "209922"
            }"#,
        );
        let record = payload.into_record(&reed());

        assert_eq!(record.name, "Reed College");
        assert_eq!(record.url, "https://www.reed.edu");
        assert_eq!(record.state.as_deref(), Some("OR"));
        assert_eq!(record.acceptance_rate, Some(0.39));
        assert_eq!(record.sat_50th_percentile, Some(1380));
        assert_eq!(record.region, Some(Region::West));
        assert_eq!(record.campus_setting, Some(CampusSetting::Urban));
        assert_eq!(record.popular_majors, "Biology, Psychology, Economics");
        assert_eq!(record.ipeds_id.as_deref(), Some("209922"));
    }

    #[test]
    fn empty_or_null_majors_become_empty_field() {
        let empty = parse(r#"{"popular_majors": []}"#).into_record(&reed());
        assert_eq!(empty.popular_majors, "");
        let null = parse(r#"{"popular_majors": null}"#).into_record(&reed());
        assert_eq!(null.popular_majors, "");
        let missing = parse("{}").into_record(&reed());
        assert_eq!(missing.popular_majors, "");
    }

    #[test]
    fn loose_numbers_are_coerced() {
        let record = parse(
            r#"{
                "acceptance_rate": "39%",
                "graduation_rate": 85,
                "tuition_in_state": "$12,345",
                "enrollment": 1499.6,
                "median_earnings_10_years": "unknown",
                "ipeds_id": 209922
            }"#,
        )
        .into_record(&reed());

        assert_eq!(record.acceptance_rate, Some(0.39));
        assert_eq!(record.graduation_rate, Some(0.85));
        assert_eq!(record.tuition_in_state, Some(12345));
        assert_eq!(record.enrollment, Some(1500));
        assert_eq!(record.median_earnings_10_years, None);
        assert_eq!(record.ipeds_id.as_deref(), Some("209922"));
    }

    #[test]
    fn out_of_range_values_are_dropped() {
        let record = parse(
            r#"{"acceptance_rate": 250, "graduation_rate": -0.2, "tuition_out_state": -5,
                "region": "Pacific", "campus_setting": "Online", "city": "  "}"#,
        )
        .into_record(&reed());

        assert_eq!(record.acceptance_rate, None);
        assert_eq!(record.graduation_rate, None);
        assert_eq!(record.tuition_out_state, None);
        assert_eq!(record.region, None);
        assert_eq!(record.campus_setting, None);
        assert_eq!(record.city, None);
    }

    #[test]
    fn majors_as_text_are_kept() {
        let record = parse(r#"{"popular_majors": " History, Art "}"#).into_record(&reed());
        assert_eq!(record.popular_majors, "History, Art");
    }
}
