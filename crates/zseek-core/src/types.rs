use serde::{Deserialize, Serialize};

/// How a seek context builds its jump table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexMode {
    /// Scan the whole stream at creation, so every later seek is a table lookup
    #[default]
    Eager,
    /// Start with an empty table and record frames as reads and seeks reach them
    Lazy,
}

impl std::fmt::Display for IndexMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexMode::Eager => f.write_str("eager"),
            IndexMode::Lazy => f.write_str("lazy"),
        }
    }
}

impl std::str::FromStr for IndexMode {
    type Err = crate::ZseekError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eager" => Ok(IndexMode::Eager),
            "lazy" => Ok(IndexMode::Lazy),
            other => Err(crate::ZseekError::Config(format!(
                "unknown index mode {other:?} (expected \"eager\" or \"lazy\")"
            ))),
        }
    }
}
