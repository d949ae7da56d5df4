//! Lead quality scoring.
//!
//! Scores range from 0 to 100 and reward reachable contact details.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::{Lead, LeadMetadata, RawLead};

const HAS_PHONE: i32 = 25;
const PHONE_VALID: i32 = 10;
const HAS_EMAIL: i32 = 20;
const EMAIL_VALID: i32 = 10;
const HAS_WEBSITE: i32 = 15;
const HAS_ADDRESS: i32 = 10;
const HAS_SOCIAL: i32 = 5;
const FRESHNESS: i32 = 5;

const SOCIAL_KEYS: &[&str] = &["linkedin", "facebook", "instagram"];
const FRESH_DAYS: i64 = 7;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());

/// True for phone numbers with 10 to 15 digits.
pub fn phone_looks_valid(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    (10..=15).contains(&digits)
}

pub fn email_looks_valid(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email.trim())
}

/// The lead fields that contribute to a score.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub phone: Option<&'a str>,
    pub email: Option<&'a str>,
    pub website: Option<&'a str>,
    pub address: Option<&'a str>,
    pub metadata: &'a LeadMetadata,
    pub scraped_at: Option<DateTime<Utc>>,
}

impl<'a> ScoreInput<'a> {
    /// Input for a lead about to be stored now.
    pub fn fresh(lead: &'a RawLead) -> Self {
        Self {
            phone: lead.phone.as_deref(),
            email: lead.email.as_deref(),
            website: lead.website.as_deref(),
            address: lead.address.as_deref(),
            metadata: &lead.metadata,
            scraped_at: Some(Utc::now()),
        }
    }
}

impl<'a> From<&'a Lead> for ScoreInput<'a> {
    fn from(lead: &'a Lead) -> Self {
        Self {
            phone: lead.phone.as_deref(),
            email: lead.email.as_deref(),
            website: lead.website.as_deref(),
            address: lead.address.as_deref(),
            metadata: &lead.metadata,
            scraped_at: Some(lead.scraped_at),
        }
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Score a lead as of `now`.
pub fn score_lead(input: &ScoreInput<'_>, now: DateTime<Utc>) -> i32 {
    let mut score = 0;

    if let Some(phone) = present(input.phone) {
        score += HAS_PHONE;
        if phone_looks_valid(phone) {
            score += PHONE_VALID;
        }
    }
    if let Some(email) = present(input.email) {
        score += HAS_EMAIL;
        if email_looks_valid(email) {
            score += EMAIL_VALID;
        }
    }
    if present(input.website).is_some() {
        score += HAS_WEBSITE;
    }
    if present(input.address).is_some() {
        score += HAS_ADDRESS;
    }
    if SOCIAL_KEYS.iter().any(|k| input.metadata.contains_key(*k)) {
        score += HAS_SOCIAL;
    }
    if let Some(scraped_at) = input.scraped_at {
        if now - scraped_at < Duration::days(FRESH_DAYS) {
            score += FRESHNESS;
        }
    }

    score.min(100)
}

/// Quality band for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadTier {
    Hot,
    Warm,
    Cold,
    Poor,
}

impl LeadTier {
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 80 => Self::Hot,
            s if s >= 60 => Self::Warm,
            s if s >= 40 => Self::Cold,
            _ => Self::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hot => "Hot",
            Self::Warm => "Warm",
            Self::Cold => "Cold",
            Self::Poor => "Poor",
        }
    }
}

impl fmt::Display for LeadTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_contact_caps_at_100() {
        let mut lead = RawLead::named("Acme")
            .with_phone("+1 (512) 555-0100")
            .with_email("hello@acme.test")
            .with_website("https://acme.test");
        lead.address = Some("1 Main St".into());
        lead.metadata
            .insert("linkedin".into(), serde_json::json!("acme"));

        // 25+10 + 20+10 + 15 + 10 + 5 + 5 = 100
        assert_eq!(score_lead(&ScoreInput::fresh(&lead), Utc::now()), 100);
    }

    #[test]
    fn test_partial_contact() {
        let lead = RawLead::named("Joe's").with_phone("555-0100");
        // Short phone: presence only, plus freshness.
        assert_eq!(score_lead(&ScoreInput::fresh(&lead), Utc::now()), 30);

        let lead = RawLead::named("Joe's").with_email("not-an-email");
        assert_eq!(score_lead(&ScoreInput::fresh(&lead), Utc::now()), 25);
    }

    #[test]
    fn test_stale_leads_lose_freshness() {
        let lead = RawLead::named("Old").with_website("https://old.test");
        let mut input = ScoreInput::fresh(&lead);
        input.scraped_at = Some(Utc::now() - Duration::days(30));
        assert_eq!(score_lead(&input, Utc::now()), 15);
    }

    #[test]
    fn test_tiers() {
        assert_eq!(LeadTier::from_score(100), LeadTier::Hot);
        assert_eq!(LeadTier::from_score(80), LeadTier::Hot);
        assert_eq!(LeadTier::from_score(79), LeadTier::Warm);
        assert_eq!(LeadTier::from_score(40), LeadTier::Cold);
        assert_eq!(LeadTier::from_score(0).to_string(), "Poor");
    }

    #[test]
    fn test_validators() {
        assert!(phone_looks_valid("512-555-0100"));
        assert!(!phone_looks_valid("555-0100"));
        assert!(email_looks_valid(" a.b@c.io "));
        assert!(!email_looks_valid("a@b"));
    }
}
