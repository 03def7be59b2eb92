//! Fork identifiers and validity ranges

use crate::error::{ForkError, ForkResult};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Protocol upgrade, totally ordered by activation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Fork {
    /// Frontier
    Frontier = 0,
    /// Homestead
    Homestead,
    /// Byzantium, including Tangerine Whistle and Spurious Dragon rules
    Byzantium,
    /// Constantinople
    Constantinople,
    /// Constantinople with EIP-1283 removed (Petersburg)
    ConstantinopleFix,
    /// Istanbul
    Istanbul,
    /// Berlin
    Berlin,
    /// London
    London,
    /// Paris (the Merge)
    Paris,
    /// Shanghai
    Shanghai,
    /// Cancun
    Cancun,
}

impl Fork {
    /// All forks in activation order
    pub const ALL: [Fork; 11] = [
        Fork::Frontier,
        Fork::Homestead,
        Fork::Byzantium,
        Fork::Constantinople,
        Fork::ConstantinopleFix,
        Fork::Istanbul,
        Fork::Berlin,
        Fork::London,
        Fork::Paris,
        Fork::Shanghai,
        Fork::Cancun,
    ];

    /// Most recent fork
    pub const LATEST: Fork = Fork::Cancun;

    /// Position in the total order
    pub fn index(self) -> usize {
        self as usize
    }

    /// Canonical name
    pub fn name(self) -> &'static str {
        match self {
            Fork::Frontier => "Frontier",
            Fork::Homestead => "Homestead",
            Fork::Byzantium => "Byzantium",
            Fork::Constantinople => "Constantinople",
            Fork::ConstantinopleFix => "ConstantinopleFix",
            Fork::Istanbul => "Istanbul",
            Fork::Berlin => "Berlin",
            Fork::London => "London",
            Fork::Paris => "Paris",
            Fork::Shanghai => "Shanghai",
            Fork::Cancun => "Cancun",
        }
    }

    /// Fork immediately before this one
    pub fn predecessor(self) -> Option<Fork> {
        self.index().checked_sub(1).map(|i| Fork::ALL[i])
    }

    /// Fork immediately after this one
    pub fn successor(self) -> Option<Fork> {
        Fork::ALL.get(self.index() + 1).copied()
    }
}

impl fmt::Display for Fork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Fork {
    type Err = ForkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fork = match s.trim() {
            "Frontier" => Fork::Frontier,
            "Homestead" => Fork::Homestead,
            "Byzantium" => Fork::Byzantium,
            "Constantinople" => Fork::Constantinople,
            "ConstantinopleFix" | "Petersburg" => Fork::ConstantinopleFix,
            "Istanbul" => Fork::Istanbul,
            "Berlin" => Fork::Berlin,
            "London" => Fork::London,
            "Paris" | "Merge" => Fork::Paris,
            "Shanghai" => Fork::Shanghai,
            "Cancun" => Fork::Cancun,
            other => return Err(ForkError::UnknownFork(other.to_string())),
        };
        Ok(fork)
    }
}

impl Serialize for Fork {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Fork {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Half-open range of forks a scenario is valid for: `[from, until)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForkRange {
    /// First fork included
    pub from: Fork,
    /// First fork excluded; `None` is open-ended
    #[serde(default)]
    pub until: Option<Fork>,
}

impl ForkRange {
    /// Range starting at `from` with no end
    pub fn starting(from: Fork) -> Self {
        ForkRange { from, until: None }
    }

    /// Range `[from, until)`
    pub fn between(from: Fork, until: Fork) -> ForkResult<Self> {
        if until <= from {
            return Err(ForkError::EmptyRange { from, until });
        }
        Ok(ForkRange {
            from,
            until: Some(until),
        })
    }

    /// Every fork
    pub fn all() -> Self {
        ForkRange::starting(Fork::Frontier)
    }

    /// Whether `fork` lies inside the range
    pub fn contains(&self, fork: Fork) -> bool {
        fork >= self.from && self.until.map_or(true, |until| fork < until)
    }

    /// Forks inside the range, in order
    pub fn forks(&self) -> impl Iterator<Item = Fork> + '_ {
        Fork::ALL.into_iter().filter(move |fork| self.contains(*fork))
    }
}

impl Default for ForkRange {
    fn default() -> Self {
        ForkRange::all()
    }
}

impl fmt::Display for ForkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.until {
            Some(until) => write!(f, "[{}, {})", self.from, until),
            None => write!(f, "[{}, ..)", self.from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fork_total_order() {
        for pair in Fork::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].successor(), Some(pair[1]));
            assert_eq!(pair[1].predecessor(), Some(pair[0]));
        }
        assert_eq!(Fork::Frontier.predecessor(), None);
        assert_eq!(Fork::LATEST.successor(), None);
    }

    #[test]
    fn test_fork_parse_roundtrip() {
        for fork in Fork::ALL {
            assert_eq!(fork.name().parse::<Fork>().unwrap(), fork);
        }
        assert_eq!("Petersburg".parse::<Fork>().unwrap(), Fork::ConstantinopleFix);
        assert_eq!("Merge".parse::<Fork>().unwrap(), Fork::Paris);
        assert_eq!(
            "Prague".parse::<Fork>(),
            Err(ForkError::UnknownFork("Prague".to_string()))
        );
    }

    #[test]
    fn test_range_is_half_open() {
        let range = ForkRange::between(Fork::London, Fork::Shanghai).unwrap();
        assert!(!range.contains(Fork::Berlin));
        assert!(range.contains(Fork::London));
        assert!(range.contains(Fork::Paris));
        assert!(!range.contains(Fork::Shanghai));
        assert_eq!(range.forks().collect::<Vec<_>>(), vec![Fork::London, Fork::Paris]);
    }

    #[test]
    fn test_open_range() {
        let range = ForkRange::starting(Fork::Berlin);
        assert_eq!(range.forks().count(), 5);
        assert!(range.contains(Fork::Cancun));
    }

    #[test]
    fn test_empty_range_rejected() {
        assert_eq!(
            ForkRange::between(Fork::Berlin, Fork::Berlin),
            Err(ForkError::EmptyRange {
                from: Fork::Berlin,
                until: Fork::Berlin
            })
        );
    }

    #[test]
    fn test_range_serde() {
        let range: ForkRange =
            serde_json::from_str(r#"{"from":"London","until":"Shanghai"}"#).unwrap();
        assert_eq!(range, ForkRange::between(Fork::London, Fork::Shanghai).unwrap());
        let open: ForkRange = serde_json::from_str(r#"{"from":"Istanbul"}"#).unwrap();
        assert_eq!(open.until, None);
    }
}
