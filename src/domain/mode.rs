//! Hack strategy modes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction hint from a stock position on the target's company
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockBias {
    /// Holding long: only grow, never hack
    Long,
    /// Holding short: hack harder
    Short,
    Neutral,
}

/// Strategy selecting which cycle variant the composer produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "mode")]
pub enum HackMode {
    /// Maximize money extraction
    Normal,
    /// Maximize experience with single-thread hacks
    XpFarm,
    /// Bias hack/grow decisions using a stock position hint
    StockMarket { bias: StockBias },
    /// Dedicate all capacity to share
    ShareAll,
}

impl Default for HackMode {
    fn default() -> Self {
        HackMode::Normal
    }
}

impl FromStr for HackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(HackMode::Normal),
            "xp" | "xp-farm" | "xpfarm" => Ok(HackMode::XpFarm),
            "stock" | "stock-neutral" => Ok(HackMode::StockMarket {
                bias: StockBias::Neutral,
            }),
            "stock-long" => Ok(HackMode::StockMarket { bias: StockBias::Long }),
            "stock-short" => Ok(HackMode::StockMarket { bias: StockBias::Short }),
            "share" | "share-all" => Ok(HackMode::ShareAll),
            other => Err(format!("unknown hack mode: {}", other)),
        }
    }
}

impl fmt::Display for HackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HackMode::Normal => f.write_str("normal"),
            HackMode::XpFarm => f.write_str("xp-farm"),
            HackMode::StockMarket { bias: StockBias::Long } => f.write_str("stock-long"),
            HackMode::StockMarket { bias: StockBias::Short } => f.write_str("stock-short"),
            HackMode::StockMarket { bias: StockBias::Neutral } => f.write_str("stock"),
            HackMode::ShareAll => f.write_str("share-all"),
        }
    }
}
