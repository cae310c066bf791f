//! `/hate-weather/*`: mock toxicity reports per platform and region.
//!
//! Numbers are random within fixed per-platform and per-country bands; they
//! only drive the dashboard visuals.

use axum::routing::get;
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::AppState;

/// (name, ISO code, base toxicity)
pub const COUNTRIES: &[(&str, &str, i32)] = &[
    ("United States", "US", 55),
    ("United Kingdom", "GB", 45),
    ("India", "IN", 60),
    ("Brazil", "BR", 52),
    ("Germany", "DE", 35),
    ("France", "FR", 40),
    ("Japan", "JP", 28),
    ("Australia", "AU", 38),
    ("Canada", "CA", 42),
    ("Mexico", "MX", 48),
    ("South Africa", "ZA", 50),
    ("Nigeria", "NG", 58),
    ("Spain", "ES", 37),
    ("Italy", "IT", 41),
    ("South Korea", "KR", 32),
];

/// (platform, base toxicity)
const PLATFORMS: &[(&str, i32)] = &[("x", 60), ("facebook", 45), ("reddit", 50)];

const DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/hate-weather/global", get(global))
        .route("/hate-weather/platforms", get(platforms))
        .route("/hate-weather/regions", get(regions))
        .route("/hate-weather/trends", get(trends))
}

// ============ Reports ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Calm,
    Moderate,
    Stormy,
    Severe,
}

impl Severity {
    pub fn from_level(level: i32) -> Self {
        match level {
            l if l < 25 => Severity::Calm,
            l if l < 45 => Severity::Moderate,
            l if l < 65 => Severity::Stormy,
            _ => Severity::Severe,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        [Trend::Up, Trend::Down, Trend::Stable]
            .choose(rng)
            .copied()
            .unwrap_or(Trend::Stable)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalReport {
    pub platform: &'static str,
    pub toxicity_level: i32,
    pub severity: Severity,
    pub trend: Trend,
    pub last_updated: String,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformReport {
    pub platform: &'static str,
    pub toxicity_level: i32,
    pub severity: Severity,
    pub trend: Trend,
    pub last_updated: String,
    pub active_users: u32,
    pub flagged_content: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionReport {
    pub country: &'static str,
    pub country_code: &'static str,
    pub toxicity_level: i32,
    pub severity: Severity,
    pub platforms: BTreeMap<&'static str, i32>,
    pub trend: Trend,
    pub last_updated: String,
}

#[derive(Debug, Serialize)]
pub struct TrendSeries {
    pub x: Vec<i32>,
    pub facebook: Vec<i32>,
    pub reddit: Vec<i32>,
    pub labels: Vec<&'static str>,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ============ Generators ============

pub fn global_report<R: Rng + ?Sized>(rng: &mut R) -> GlobalReport {
    let level = rng.gen_range(15..=75);
    GlobalReport {
        platform: "global",
        toxicity_level: level,
        severity: Severity::from_level(level),
        trend: Trend::random(rng),
        last_updated: now(),
        description: "Global average across all platforms",
    }
}

pub fn platform_reports<R: Rng + ?Sized>(rng: &mut R) -> Vec<PlatformReport> {
    PLATFORMS
        .iter()
        .map(|&(platform, base)| {
            let level = base + rng.gen_range(-10..=10);
            PlatformReport {
                platform,
                toxicity_level: level,
                severity: Severity::from_level(level),
                trend: Trend::random(rng),
                last_updated: now(),
                active_users: rng.gen_range(100_000..=5_000_000),
                flagged_content: rng.gen_range(1_000..=50_000),
            }
        })
        .collect()
}

pub fn region_reports<R: Rng + ?Sized>(rng: &mut R) -> Vec<RegionReport> {
    COUNTRIES
        .iter()
        .map(|&(country, code, base)| {
            let platforms = BTreeMap::from([
                ("x", base + rng.gen_range(-5..=10)),
                ("facebook", base + rng.gen_range(-10..=5)),
                ("reddit", base + rng.gen_range(-8..=8)),
            ]);
            let overall = platforms.values().sum::<i32>() / 3;
            RegionReport {
                country,
                country_code: code,
                toxicity_level: overall,
                severity: Severity::from_level(overall),
                platforms,
                trend: Trend::random(rng),
                last_updated: now(),
            }
        })
        .collect()
}

pub fn trend_series<R: Rng + ?Sized>(rng: &mut R) -> TrendSeries {
    let mut series = |lo: i32, hi: i32| -> Vec<i32> {
        DAYS.iter().map(|_| rng.gen_range(lo..=hi)).collect()
    };
    let x = series(50, 70);
    let facebook = series(35, 55);
    let reddit = series(40, 60);
    TrendSeries {
        x,
        facebook,
        reddit,
        labels: DAYS.to_vec(),
    }
}

// ============ Handlers ============

async fn global() -> Json<GlobalReport> {
    Json(global_report(&mut rand::thread_rng()))
}

async fn platforms() -> Json<Vec<PlatformReport>> {
    Json(platform_reports(&mut rand::thread_rng()))
}

async fn regions() -> Json<Vec<RegionReport>> {
    Json(region_reports(&mut rand::thread_rng()))
}

async fn trends() -> Json<TrendSeries> {
    Json(trend_series(&mut rand::thread_rng()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_router;
    use crate::test_support::*;
    use crate::test_support::get;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_severity_bands() {
        assert_eq!(Severity::from_level(0), Severity::Calm);
        assert_eq!(Severity::from_level(24), Severity::Calm);
        assert_eq!(Severity::from_level(25), Severity::Moderate);
        assert_eq!(Severity::from_level(44), Severity::Moderate);
        assert_eq!(Severity::from_level(45), Severity::Stormy);
        assert_eq!(Severity::from_level(64), Severity::Stormy);
        assert_eq!(Severity::from_level(65), Severity::Severe);
    }

    #[test]
    fn test_platform_levels_stay_in_band() {
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            for report in platform_reports(&mut rng) {
                let base = PLATFORMS
                    .iter()
                    .find(|(p, _)| *p == report.platform)
                    .map(|(_, b)| *b)
                    .unwrap();
                assert!((base - 10..=base + 10).contains(&report.toxicity_level));
                assert_eq!(report.severity, Severity::from_level(report.toxicity_level));
            }
        }
    }

    #[test]
    fn test_region_overall_is_platform_mean() {
        let mut rng = StdRng::seed_from_u64(5);
        let reports = region_reports(&mut rng);
        assert_eq!(reports.len(), 15);
        for report in reports {
            let sum: i32 = report.platforms.values().sum();
            assert_eq!(report.toxicity_level, sum / 3);
        }
    }

    #[test]
    fn test_trend_series_covers_a_week() {
        let series = trend_series(&mut StdRng::seed_from_u64(1));
        assert_eq!(series.labels, DAYS.to_vec());
        assert_eq!(series.x.len(), 7);
        assert!(series.x.iter().all(|v| (50..=70).contains(v)));
        assert!(series.facebook.iter().all(|v| (35..=55).contains(v)));
    }

    #[tokio::test]
    async fn test_global_uses_camel_case_keys() {
        let body = read_body(get(build_router(test_state()), "/hate-weather/global").await).await;
        assert_eq!(body["platform"], "global");
        let level = body["toxicityLevel"].as_i64().unwrap();
        assert!((15..=75).contains(&level));
        assert!(body["lastUpdated"].is_string());
        assert!(["up", "down", "stable"].contains(&body["trend"].as_str().unwrap()));
    }

    #[tokio::test]
    async fn test_regions_endpoint_lists_all_countries() {
        let body = read_body(get(build_router(test_state()), "/hate-weather/regions").await).await;
        let regions = body.as_array().unwrap();
        assert_eq!(regions.len(), COUNTRIES.len());
        assert_eq!(regions[0]["countryCode"], "US");
        assert!(regions[0]["platforms"]["reddit"].is_i64());
    }
}
