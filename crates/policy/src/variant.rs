use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which build of the demo is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Vulnerable,
    Secure,
}

impl Variant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Vulnerable => "vulnerable",
            Variant::Secure => "secure",
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, Variant::Secure)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vulnerable" => Ok(Variant::Vulnerable),
            "secure" => Ok(Variant::Secure),
            other => Err(format!("unknown variant '{}' (expected vulnerable or secure)", other)),
        }
    }
}
