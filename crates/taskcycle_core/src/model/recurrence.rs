use crate::error::AppError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurringSchedule {
    Daily,
    Weekly,
    Monthly,
    #[default]
    #[serde(rename = "none")]
    Never,
}

impl RecurringSchedule {
    pub fn is_recurring(self) -> bool {
        !matches!(self, Self::Never)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Never => "none",
        }
    }

    /// Treats an explicit `null` the same as a missing field.
    pub(crate) fn deserialize_nullable<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Self>::deserialize(deserializer)?.unwrap_or_default())
    }
}

impl fmt::Display for RecurringSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurringSchedule {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "none" | "" => Ok(Self::Never),
            other => Err(AppError::validation(format!(
                "unknown schedule '{other}' (expected daily, weekly, monthly or none)"
            ))),
        }
    }
}
