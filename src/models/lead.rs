//! Lead models.
//!
//! [`RawLead`] is what a scraper produces from one listing element.
//! [`Lead`] is a stored row, the shape handed to export and CRM consumers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-form per-lead metadata.
pub type LeadMetadata = serde_json::Map<String, serde_json::Value>;

/// Lead fields extracted from a listing, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLead {
    pub business_name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: LeadMetadata,
}

impl RawLead {
    pub fn named(business_name: &str) -> Self {
        Self {
            business_name: Some(business_name.to_string()),
            ..Default::default()
        }
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone = Some(phone.to_string());
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_website(mut self, website: &str) -> Self {
        self.website = Some(website.to_string());
        self
    }

    pub fn with_city(mut self, city: &str) -> Self {
        self.city = Some(city.to_string());
        self
    }

    /// Set a field by its selector name. Unknown names are stored in metadata.
    pub fn set_field(&mut self, field: &str, value: Option<String>) {
        let slot = match field {
            "business_name" => &mut self.business_name,
            "city" => &mut self.city,
            "state" => &mut self.state,
            "phone" => &mut self.phone,
            "email" => &mut self.email,
            "website" => &mut self.website,
            "address" => &mut self.address,
            "category" => &mut self.category,
            other => {
                if let Some(v) = value {
                    self.metadata
                        .insert(other.to_string(), serde_json::Value::String(v));
                }
                return;
            }
        };
        *slot = value;
    }

    /// Business name, if present and not blank.
    pub fn name(&self) -> Option<&str> {
        non_blank(self.business_name.as_deref())
    }

    /// True if at least one of phone, email or website is present.
    pub fn has_contact(&self) -> bool {
        non_blank(self.phone.as_deref()).is_some()
            || non_blank(self.email.as_deref()).is_some()
            || non_blank(self.website.as_deref()).is_some()
    }

    /// Trim every text field, turning blank values into `None`.
    pub fn normalized(mut self) -> Self {
        for slot in [
            &mut self.business_name,
            &mut self.city,
            &mut self.state,
            &mut self.phone,
            &mut self.email,
            &mut self.website,
            &mut self.address,
            &mut self.category,
        ] {
            *slot = slot
                .take()
                .map(|v| v.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|v| !v.is_empty());
        }
        self
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// A validated lead ready for storage.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLead {
    pub business_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub category: Option<String>,
    pub metadata: LeadMetadata,
    pub score: i32,
}

impl NewLead {
    /// Build from a raw lead. Returns `None` without a business name.
    pub fn from_raw(raw: RawLead, score: i32) -> Option<Self> {
        let raw = raw.normalized();
        let business_name = raw.business_name?;
        Some(Self {
            business_name,
            city: raw.city,
            state: raw.state,
            phone: raw.phone,
            email: raw.email,
            website: raw.website,
            address: raw.address,
            category: raw.category,
            metadata: raw.metadata,
            score: score.clamp(0, 100),
        })
    }
}

/// A stored lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    pub source_id: i64,
    pub business_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub address: Option<String>,
    pub category: Option<String>,
    pub metadata: LeadMetadata,
    pub score: i32,
    pub scraped_at: DateTime<Utc>,
}

/// Outcome of saving a single lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(i64),
    Duplicate,
}

/// Counts from a bulk save.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSaveResult {
    pub saved: usize,
    pub duplicates: usize,
}

/// Filters for lead queries.
#[derive(Debug, Clone)]
pub struct LeadQuery {
    pub source_id: Option<i64>,
    pub min_score: Option<i32>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for LeadQuery {
    fn default() -> Self {
        Self {
            source_id: None,
            min_score: None,
            limit: 1000,
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_contact_ignores_blank_values() {
        let mut lead = RawLead::named("Acme");
        lead.phone = Some("   ".to_string());
        assert!(!lead.has_contact());
        assert!(lead.with_website("https://acme.test").has_contact());
    }

    #[test]
    fn test_set_field_unknown_goes_to_metadata() {
        let mut lead = RawLead::default();
        lead.set_field("rating", Some("4.5".to_string()));
        lead.set_field("city", Some("Austin".to_string()));
        assert_eq!(lead.city.as_deref(), Some("Austin"));
        assert_eq!(lead.metadata.get("rating").unwrap(), "4.5");
    }

    #[test]
    fn test_new_lead_from_raw_normalizes() {
        let mut raw = RawLead::named("  Joe's   Diner ").with_phone("555-0100");
        raw.city = Some("".to_string());
        let lead = NewLead::from_raw(raw, 140).unwrap();
        assert_eq!(lead.business_name, "Joe's Diner");
        assert_eq!(lead.city, None);
        assert_eq!(lead.score, 100);

        assert!(NewLead::from_raw(RawLead::default().with_phone("1"), 0).is_none());
    }
}
