#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Free-tier users get this many downloads per calendar month.
pub const FREE_MONTHLY_DOWNLOAD_LIMIT: i64 = 3;

/// Sentinel returned by the remaining-count query for paid tiers.
pub const UNLIMITED_DOWNLOADS: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Premium,
    Business,
}

impl SubscriptionTier {
    pub fn is_free(&self) -> bool {
        matches!(self, SubscriptionTier::Free)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Premium => "premium",
            SubscriptionTier::Business => "business",
        }
    }
}

impl FromStr for SubscriptionTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(SubscriptionTier::Free),
            "premium" => Ok(SubscriptionTier::Premium),
            "business" => Ok(SubscriptionTier::Business),
            other => Err(format!("unknown subscription tier '{other}'")),
        }
    }
}

impl Default for SubscriptionTier {
    // Users without a subscription row are free-tier.
    fn default() -> Self {
        SubscriptionTier::Free
    }
}
