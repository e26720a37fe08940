use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two test kinds served by the platform. Stored uppercase in
/// `test_assignments`/`test_attempts` and lowercase in `configurations`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestType {
    #[serde(rename = "SJT")]
    Sjt,
    #[serde(rename = "JDT")]
    Jdt,
}

impl TestType {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_uppercase().as_str() {
            "SJT" => Ok(TestType::Sjt),
            "JDT" => Ok(TestType::Jdt),
            _ => Err(Error::BadRequest("Invalid test_type".to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Sjt => "SJT",
            TestType::Jdt => "JDT",
        }
    }

    /// Key used by the `configurations.config_type` column.
    pub fn config_type(&self) -> &'static str {
        match self {
            TestType::Sjt => "sjt",
            TestType::Jdt => "jdt",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_any_case() {
        assert_eq!(TestType::parse("sjt").unwrap(), TestType::Sjt);
        assert_eq!(TestType::parse("JDT").unwrap(), TestType::Jdt);
        assert_eq!(TestType::parse("Jdt").unwrap(), TestType::Jdt);
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!(TestType::parse("presentation").is_err());
        assert!(TestType::parse("").is_err());
    }

    #[test]
    fn column_keys() {
        assert_eq!(TestType::Sjt.as_str(), "SJT");
        assert_eq!(TestType::Sjt.config_type(), "sjt");
    }
}
