//! Remote operation kinds

use serde::{Deserialize, Serialize};
use std::fmt;

/// The operations an execution agent can run against a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Weaken,
    Grow,
    Hack,
    /// Lends agent threads to the reputation pool; never touches a target
    Share,
}

impl OpKind {
    /// Returns true if the operation raises target security
    pub fn raises_security(&self) -> bool {
        matches!(self, OpKind::Grow | OpKind::Hack)
    }

    /// Returns true if the operation interacts with a target at all
    pub fn touches_target(&self) -> bool {
        !matches!(self, OpKind::Share)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Weaken => "weaken",
            OpKind::Grow => "grow",
            OpKind::Hack => "hack",
            OpKind::Share => "share",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raises_security() {
        assert!(OpKind::Hack.raises_security());
        assert!(OpKind::Grow.raises_security());
        assert!(!OpKind::Weaken.raises_security());
        assert!(!OpKind::Share.raises_security());
    }

    #[test]
    fn test_share_does_not_touch_target() {
        assert!(!OpKind::Share.touches_target());
        assert!(OpKind::Weaken.touches_target());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&OpKind::Weaken).unwrap();
        assert_eq!(json, "\"weaken\"");
        let op: OpKind = serde_json::from_str("\"hack\"").unwrap();
        assert_eq!(op, OpKind::Hack);
    }
}
