pub mod registry;

pub use registry::{ModeRegistry, RegistryError};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Persona and capability profile selected by the caller.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Web,
    Academic,
    Youtube,
    X,
    Analysis,
    Chat,
    Extreme,
}

impl Mode {
    pub const ALL: [Mode; 7] = [
        Mode::Web,
        Mode::Academic,
        Mode::Youtube,
        Mode::X,
        Mode::Analysis,
        Mode::Chat,
        Mode::Extreme,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Web => "web",
            Mode::Academic => "academic",
            Mode::Youtube => "youtube",
            Mode::X => "x",
            Mode::Analysis => "analysis",
            Mode::Chat => "chat",
            Mode::Extreme => "extreme",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| RegistryError::UnknownMode(s.to_string()))
    }
}

/// External capability a model invocation may be allowed to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    TvlySearch,
    GetWeatherData,
    Retrieve,
    TextTranslate,
    NearbySearch,
    TrackFlight,
    MovieOrTvSearch,
    TrendingMovies,
    TrendingTv,
    ReasonSearch,
    Datetime,
    AcademicSearch,
    CodeInterpreter,
    YoutubeSearch,
    XSearch,
    StockChart,
    CurrencyConverter,
}

impl Tool {
    pub const ALL: [Tool; 17] = [
        Tool::TvlySearch,
        Tool::GetWeatherData,
        Tool::Retrieve,
        Tool::TextTranslate,
        Tool::NearbySearch,
        Tool::TrackFlight,
        Tool::MovieOrTvSearch,
        Tool::TrendingMovies,
        Tool::TrendingTv,
        Tool::ReasonSearch,
        Tool::Datetime,
        Tool::AcademicSearch,
        Tool::CodeInterpreter,
        Tool::YoutubeSearch,
        Tool::XSearch,
        Tool::StockChart,
        Tool::CurrencyConverter,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_names_round_trip_through_from_str() {
        for mode in Mode::ALL {
            assert_eq!(mode.as_str().parse::<Mode>().unwrap(), mode);
            assert_eq!(
                serde_json::to_value(mode).unwrap(),
                serde_json::json!(mode.as_str())
            );
        }
        assert!(matches!(
            "images".parse::<Mode>(),
            Err(RegistryError::UnknownMode(m)) if m == "images"
        ));
    }

    #[test]
    fn default_mode_is_web() {
        assert_eq!(Mode::default(), Mode::Web);
    }

    #[test]
    fn tool_tokens_are_snake_case() {
        assert_eq!(
            serde_json::to_value(Tool::MovieOrTvSearch).unwrap(),
            "movie_or_tv_search"
        );
        assert_eq!(serde_json::to_value(Tool::XSearch).unwrap(), "x_search");
        assert!(serde_json::from_str::<Tool>(r#""flight_booking""#).is_err());
    }
}
