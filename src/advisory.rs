//! Advisory signals gathered outside the swap engine
//!
//! Token reputation, influencer reach and message sentiment may inform a
//! caller before it builds a `SwapRequest`. The engine never reads these
//! records. Concrete providers (site scrapers, social APIs) plug in behind
//! [`AdvisoryProvider`]; only the record shapes and text extraction live here.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::Address;

/// Maximum number of influencers kept in an [`InfluencerReport`]
pub const MAX_TOP_INFLUENCERS: usize = 5;

/// Social networks recognized by [`extract_project_info`]
pub const SOCIAL_NETWORKS: [&str; 5] = ["twitter", "telegram", "facebook", "instagram", "discord"];

/// Reputation summary for a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSecurityReport {
    pub token_address: Address,
    pub security_score: String,
    pub liquidity_info: String,
    pub contract_verification: String,
    pub warnings: Vec<String>,
}

/// Reach summary for a project's social account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "InfluencerReportFields")]
pub struct InfluencerReport {
    pub handle: String,
    pub influencer_count: u64,
    pub total_followers: u64,
    pub engagement_rate: f64,
    top_influencers: Vec<String>,
}

#[derive(Deserialize)]
struct InfluencerReportFields {
    handle: String,
    influencer_count: u64,
    total_followers: u64,
    engagement_rate: f64,
    top_influencers: Vec<String>,
}

impl From<InfluencerReportFields> for InfluencerReport {
    fn from(f: InfluencerReportFields) -> Self {
        Self::new(
            f.handle,
            f.influencer_count,
            f.total_followers,
            f.engagement_rate,
            f.top_influencers,
        )
    }
}

impl InfluencerReport {
    /// Keeps at most [`MAX_TOP_INFLUENCERS`] names, in the given order
    pub fn new(
        handle: impl Into<String>,
        influencer_count: u64,
        total_followers: u64,
        engagement_rate: f64,
        mut top_influencers: Vec<String>,
    ) -> Self {
        top_influencers.truncate(MAX_TOP_INFLUENCERS);
        Self {
            handle: handle.into(),
            influencer_count,
            total_followers,
            engagement_rate,
            top_influencers,
        }
    }

    pub fn top_influencers(&self) -> &[String] {
        &self.top_influencers
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    /// Classify a polarity score: above zero is positive, exactly zero neutral
    pub fn from_polarity(polarity: f64) -> Self {
        if polarity > 0.0 {
            Self::Positive
        } else if polarity == 0.0 {
            Self::Neutral
        } else {
            Self::Negative
        }
    }
}

/// Contract address and social links announced in a free-text message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub contract_address: Option<String>,
    /// `(network, link)` pairs in [`SOCIAL_NETWORKS`] order
    pub social_links: Vec<(String, String)>,
}

static CONTRACT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)smart\s+contract:\s*(\S+)").expect("valid contract regex"));

static SOCIAL_RES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    SOCIAL_NETWORKS
        .iter()
        .map(|network| {
            let pattern = format!(r"(?i)\b{}:\s*(\S+)", network);
            (*network, Regex::new(&pattern).expect("valid social regex"))
        })
        .collect()
});

/// Pull a `smart contract: <addr>` marker and `<network>: <link>` pairs out of text
///
/// Returns `None` when the message announces neither.
pub fn extract_project_info(text: &str) -> Option<ProjectInfo> {
    let contract_address = CONTRACT_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let social_links: Vec<(String, String)> = SOCIAL_RES
        .iter()
        .filter_map(|(network, re)| {
            re.captures(text)
                .and_then(|c| c.get(1))
                .map(|m| (network.to_string(), m.as_str().to_string()))
        })
        .collect();

    if contract_address.is_none() && social_links.is_empty() {
        return None;
    }
    Some(ProjectInfo {
        contract_address,
        social_links,
    })
}

/// Source of advisory records; `Ok(None)` when the source has nothing on the subject
#[async_trait]
pub trait AdvisoryProvider: Send + Sync {
    async fn token_security(&self, token: &Address) -> anyhow::Result<Option<TokenSecurityReport>>;

    async fn influencers(&self, handle: &str) -> anyhow::Result<Option<InfluencerReport>>;

    async fn sentiment(&self, text: &str) -> anyhow::Result<SentimentLabel>;
}
