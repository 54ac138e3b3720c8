use serde::{Deserialize, Serialize};
use std::fmt;

/// A supported video-conference platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    GoogleMeet,
    Zoom,
    Teams,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Platform::GoogleMeet => "google_meet",
            Platform::Zoom => "zoom",
            Platform::Teams => "teams",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google_meet" => Ok(Platform::GoogleMeet),
            "zoom" => Ok(Platform::Zoom),
            "teams" => Ok(Platform::Teams),
            other => Err(format!("unknown platform: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_format() {
        assert_eq!(Platform::GoogleMeet.to_string(), "google_meet");
        assert_eq!(Platform::Zoom.to_string(), "zoom");
        assert_eq!(Platform::Teams.to_string(), "teams");
    }

    #[test]
    fn roundtrip_through_str() {
        for p in [Platform::GoogleMeet, Platform::Zoom, Platform::Teams] {
            let parsed: Platform = p.to_string().parse().unwrap();
            assert_eq!(parsed, p);
        }
    }

    #[test]
    fn unknown_platform_is_err() {
        assert!("discord".parse::<Platform>().is_err());
    }
}
