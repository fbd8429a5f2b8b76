//! web_search simulator.
//!
//! Weather-style queries get a fabricated current-conditions block and a
//! 5-day forecast with random values; anything else gets three generic hits
//! echoing the query.

use std::sync::LazyLock;

use chrono::{DateTime, Local};
use rand::Rng;
use regex::Regex;
use serde_json::Value;

use crate::declarations::WEB_SEARCH_FUNCTION;
use crate::simulator::{SimulatedTool, string_arg};

pub struct WebSearchSimulator;

const WEATHER_KEYWORDS: [&str; 3] = ["weather", "temperature", "forecast"];
const CONDITIONS: [&str; 5] = ["Sunny", "Partly Cloudy", "Cloudy", "Rainy", "Snowy"];
const DEFAULT_LOCATION: &str = "the requested location";

/// Forecast day labels with (high, low) offsets from the current temperature.
const FORECAST: [(&str, i32, i32); 5] = [
    ("Today", 0, -10),
    ("Tomorrow", 2, -8),
    ("Day 3", -5, -15),
    ("Day 4", 4, -6),
    ("Day 5", 1, -9),
];

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:weather|temperature|forecast)(?:\s+in|\s+for|\s+at)?\s+([a-z\s]+)")
        .expect("static regex")
});

impl SimulatedTool for WebSearchSimulator {
    fn name(&self) -> &str {
        WEB_SEARCH_FUNCTION
    }

    fn simulate(&self, args: &Value) -> String {
        let query = string_arg(args, "query");
        if is_weather_query(query) {
            let location = extract_location(query);
            weather_report(&location, &mut rand::rng(), Local::now())
        } else {
            generic_results(query)
        }
    }
}

pub fn is_weather_query(query: &str) -> bool {
    let lower = query.to_lowercase();
    WEATHER_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Best-effort location: the words following a weather keyword, up to the
/// first punctuation mark.
pub fn extract_location(query: &str) -> String {
    LOCATION_RE
        .captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|loc| !loc.is_empty())
        .unwrap_or(DEFAULT_LOCATION)
        .to_string()
}

fn weather_report<R: Rng>(location: &str, rng: &mut R, now: DateTime<Local>) -> String {
    let temperature: i32 = rng.random_range(40..70);
    let humidity: u32 = rng.random_range(30..80);
    let wind: u32 = rng.random_range(5..25);
    let mut pick = || CONDITIONS[rng.random_range(0..CONDITIONS.len())];

    let mut out = format!(
        "Weather search results for \"{location}\":\n\n\
         Current Weather for {location} (as of {time}):\n\
         - Temperature: {temperature}°F\n\
         - Conditions: {conditions}\n\
         - Humidity: {humidity}%\n\
         - Wind Speed: {wind} mph\n\n\
         5-Day Forecast for {location}:\n",
        time = now.format("%-I:%M:%S %p"),
        conditions = pick(),
    );
    for (day, high, low) in FORECAST {
        out.push_str(&format!(
            "- {day}: {}, High {}°F, Low {}°F\n",
            pick(),
            temperature + high,
            temperature + low,
        ));
    }
    out.push_str("\nSource: Simulated Weather Data (for demonstration purposes)");
    out
}

fn generic_results(query: &str) -> String {
    format!(
        "Search results for \"{query}\":\n\n\
         1. {query} - Wikipedia\n   Summary: Information about {query} from the free encyclopedia...\n\n\
         2. Latest news on {query} - News Source\n   Summary: Recent developments and news related to {query}...\n\n\
         3. Understanding {query} - Educational Resource\n   Summary: Comprehensive guide to understanding {query}...\n\n\
         Source: Simulated Search Results (for demonstration purposes)"
    )
}
