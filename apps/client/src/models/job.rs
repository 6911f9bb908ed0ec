use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// A job posting snapshot as served by the backend. Never mutated client-side.
///
/// The last four fields are only populated by the match endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: String,
    pub job_title: String,
    pub company_name: String,
    /// Display company; may differ from the legal entity in `company_name`.
    pub affiliate_company_name: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub team_info: String,
    #[serde(default)]
    pub responsibilities: Vec<String>,
    #[serde(default)]
    pub qualifications: Vec<String>,
    #[serde(default)]
    pub preferred_qualifications: Vec<String>,
    #[serde(default)]
    pub hiring_process: Vec<String>,
    #[serde(default)]
    pub additional_info: Vec<String>,
    #[serde(default)]
    pub uploaded_date: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub cosine_similarity: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub uploaded_in_a_day: bool,
    #[serde(default)]
    pub uploaded_in_a_week: bool,
}

fn default_active() -> bool {
    true
}

/// Job ids arrive as strings or as integer primary keys depending on the endpoint.
fn id_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

impl Job {
    /// "{title} @ {company}", as shown in the cover-letter job picker.
    pub fn display_name(&self) -> String {
        format!("{} @ {}", self.job_title, self.company_name)
    }

    /// Upload day, if the backend timestamp starts with an ISO date.
    pub fn uploaded_on(&self) -> Option<NaiveDate> {
        let date = self.uploaded_date.get(..10)?;
        NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
    }
}

/// One facet value with the number of active jobs carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub name: String,
    pub job_count: u32,
}

#[cfg(test)]
pub(crate) fn sample_job(id: &str, company: &str, affiliate: &str, tags: &[&str]) -> Job {
    Job {
        id: id.to_string(),
        job_title: format!("Engineer {id}"),
        company_name: company.to_string(),
        affiliate_company_name: affiliate.to_string(),
        link: String::new(),
        team_info: String::new(),
        responsibilities: vec![],
        qualifications: vec![],
        preferred_qualifications: vec![],
        hiring_process: vec![],
        additional_info: vec![],
        uploaded_date: "2025-03-01".to_string(),
        created_at: String::new(),
        updated_at: String::new(),
        is_active: true,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        cosine_similarity: None,
        reason: None,
        uploaded_in_a_day: false,
        uploaded_in_a_week: false,
    }
}
