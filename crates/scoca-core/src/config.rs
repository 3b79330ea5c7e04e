//! `scoca.toml`: upstream settings, the justice roster, and manual
//! classifications of concurring-and-dissenting opinions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::opinion::{EffectiveTypeTable, OpinionType};
use crate::{CoreError, Justice, Roster};

pub const DEFAULT_BASE_URL: &str = "https://www.courtlistener.com";
pub const DEFAULT_COURT: &str = "cal";

/// Start of the newest associate justice's tenure (Groban).
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 1, 3).unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub courtlistener: CourtListenerConfig,
    /// Ordered roster. Order is report order and reduction order.
    #[serde(default)]
    pub justices: Vec<Justice>,
    #[serde(default)]
    pub effective_types: Vec<EffectiveTypeEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CourtListenerConfig {
    pub base_url: String,
    pub court: String,
    pub start_date: NaiveDate,
}

impl Default for CourtListenerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            court: DEFAULT_COURT.to_string(),
            start_date: default_start_date(),
        }
    }
}

/// Manual classification of one concurring-and-dissenting opinion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EffectiveTypeEntry {
    pub docket_number: String,
    /// Author's short name as it appears in the opinion text.
    pub author: String,
    pub effective_type: OpinionType,
}

impl Config {
    pub fn from_toml_str(input: &str) -> Result<Self, CoreError> {
        let config: Config = toml::from_str(input)?;
        // Effective-type entries are checked at load.
        config.effective_types()?;
        Ok(config)
    }

    pub fn roster(&self) -> Result<Roster, CoreError> {
        Roster::new(self.justices.clone())
    }

    pub fn effective_types(&self) -> Result<EffectiveTypeTable, CoreError> {
        let mut table = EffectiveTypeTable::default();
        for entry in &self.effective_types {
            table.insert(&entry.docket_number, &entry.author, entry.effective_type)?;
        }
        Ok(table)
    }
}
