use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Display language for user-facing text produced by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Ar,
}

impl Locale {
    /// Pick the first supported language from an `Accept-Language` header
    /// value, honouring the order given and skipping tags weighted `q=0`.
    /// Falls back to English.
    pub fn from_accept_language(header: &str) -> Self {
        header
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.split(';').map(str::trim);
                let tag = pieces.next()?;
                let rejected = pieces.any(|p| {
                    p.strip_prefix("q=")
                        .and_then(|q| q.parse::<f32>().ok())
                        .is_some_and(|q| q <= 0.0)
                });
                if rejected {
                    return None;
                }
                tag.split('-').next()?.parse::<Locale>().ok()
            })
            .next()
            .unwrap_or_default()
    }

    pub fn is_rtl(self) -> bool {
        matches!(self, Self::Ar)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ar => "ar",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("en") {
            Ok(Self::En)
        } else if s.eq_ignore_ascii_case("ar") {
            Ok(Self::Ar)
        } else {
            Err(format!("unsupported locale '{s}': expected 'en' or 'ar'"))
        }
    }
}
