//! Prediction service: one movie in, revenue and marketing guidance out

use crate::artifacts::ArtifactSet;
use crate::data::{to_canonical_order, FeatureVector};
use crate::error::{ArtifactError, RequestError};
use chrono::{Datelike, Local, NaiveDate};
use ndarray::Axis;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;
use std::str::FromStr;

pub const UNKNOWN_CATEGORY: &str = "Unknown category";

/// Strategy text per cluster label
pub const CLUSTER_INSIGHTS: [&str; 4] = [
    "Blockbuster: High budget + high expected return. Use multi-platform global marketing.",
    "Indie/Drama: Lower budget, focus on niche audiences and festivals.",
    "Family/Animation: Target families and deploy cross-platform marketing.",
    "Genre Film: Leverage genre fanbase with targeted social media campaigns.",
];

pub const SUMMER_TIP: &str =
    "Summer Blockbuster Season – Heavy focus on YouTube, TikTok and TV ads.";
pub const HOLIDAY_TIP: &str =
    "Holiday Season – Push family-friendly elements and escapism themes.";
pub const AWARD_TIP: &str = "Award Season – Position for critics and awards consideration.";
pub const STANDARD_TIP: &str = "Standard Season – Focus on social media and influencer marketing.";

/// Popularity is entered on a 1-100 scale; the dataset uses a tenth of that
const POPULARITY_INPUT_SCALE: f64 = 10.0;

// Input form bounds, shared by the CLI flags and `key=value` requests
pub const BUDGET_RANGE: RangeInclusive<u64> = 1_000_000..=300_000_000;
pub const RUNTIME_RANGE: RangeInclusive<i64> = 60..=240;
pub const GENRES_RANGE: RangeInclusive<i64> = 1..=5;
pub const COMPANIES_RANGE: RangeInclusive<i64> = 1..=10;
pub const KEYWORDS_RANGE: RangeInclusive<i64> = 5..=30;
pub const POPULARITY_RANGE: RangeInclusive<i64> = 1..=100;
pub const VOTE_AVERAGE_RANGE: RangeInclusive<f64> = 1.0..=10.0;
pub const VOTE_COUNT_RANGE: RangeInclusive<i64> = 100..=10_000;

fn widen_u64(range: &RangeInclusive<u64>) -> RangeInclusive<f64> {
    (*range.start() as f64)..=(*range.end() as f64)
}

fn widen_i64(range: &RangeInclusive<i64>) -> RangeInclusive<f64> {
    (*range.start() as f64)..=(*range.end() as f64)
}

pub fn cluster_insight(label: usize) -> &'static str {
    CLUSTER_INSIGHTS
        .get(label)
        .copied()
        .unwrap_or(UNKNOWN_CATEGORY)
}

pub fn seasonal_tip(month: u32) -> &'static str {
    match month {
        5..=8 => SUMMER_TIP,
        11 | 12 => HOLIDAY_TIP,
        1 | 2 => AWARD_TIP,
        _ => STANDARD_TIP,
    }
}

/// (predicted − budget) / budget × 100
pub fn roi_percent(predicted_revenue: f64, budget: f64) -> f64 {
    (predicted_revenue - budget) / budget * 100.0
}

/// Qualitative ROI band; every threshold is strict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoiBand {
    Excellent,
    Good,
    Moderate,
    Loss,
}

impl RoiBand {
    pub fn classify(roi: f64) -> Self {
        if roi > 200.0 {
            RoiBand::Excellent
        } else if roi > 100.0 {
            RoiBand::Good
        } else if roi > 0.0 {
            RoiBand::Moderate
        } else {
            RoiBand::Loss
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RoiBand::Excellent => "Excellent",
            RoiBand::Good => "Good",
            RoiBand::Moderate => "Moderate",
            RoiBand::Loss => "Loss expected",
        }
    }
}

impl fmt::Display for RoiBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// User-supplied movie description
#[derive(Debug, Clone, PartialEq)]
pub struct MovieInput {
    pub budget: f64,
    /// Minutes
    pub runtime: f64,
    pub release_date: NaiveDate,
    pub num_genres: u32,
    pub production_companies: u32,
    pub keywords_count: u32,
    /// Expected popularity on a 1-100 scale
    pub popularity: f64,
    pub vote_average: f64,
    pub vote_count: f64,
}

impl Default for MovieInput {
    fn default() -> Self {
        Self::with_release_date(Local::now().date_naive())
    }
}

impl MovieInput {
    /// Default movie released on `release_date`
    pub fn with_release_date(release_date: NaiveDate) -> Self {
        Self {
            budget: 50_000_000.0,
            runtime: 120.0,
            release_date,
            num_genres: 2,
            production_companies: 3,
            keywords_count: 15,
            popularity: 50.0,
            vote_average: 7.0,
            vote_count: 1000.0,
        }
    }

    pub fn release_month(&self) -> u32 {
        self.release_date.month()
    }

    pub fn release_year(&self) -> i32 {
        self.release_date.year()
    }

    /// Encode the input the same way the training rows were encoded
    pub fn feature_vector(&self) -> FeatureVector {
        FeatureVector {
            budget: self.budget,
            runtime: self.runtime,
            release_month: f64::from(self.release_month()),
            release_year: f64::from(self.release_year()),
            num_genres: f64::from(self.num_genres),
            production_companies_count: f64::from(self.production_companies),
            keywords_count: f64::from(self.keywords_count),
            popularity: self.popularity / POPULARITY_INPUT_SCALE,
            vote_average: self.vote_average,
            vote_count: self.vote_count,
        }
    }

    /// Check every field against the input form's bounds
    pub fn check_ranges(&self) -> Result<(), RequestError> {
        let fields = [
            ("budget", self.budget, widen_u64(&BUDGET_RANGE)),
            ("runtime", self.runtime, widen_i64(&RUNTIME_RANGE)),
            ("genres", f64::from(self.num_genres), widen_i64(&GENRES_RANGE)),
            (
                "companies",
                f64::from(self.production_companies),
                widen_i64(&COMPANIES_RANGE),
            ),
            (
                "keywords",
                f64::from(self.keywords_count),
                widen_i64(&KEYWORDS_RANGE),
            ),
            ("popularity", self.popularity, widen_i64(&POPULARITY_RANGE)),
            ("vote_average", self.vote_average, VOTE_AVERAGE_RANGE),
            ("vote_count", self.vote_count, widen_i64(&VOTE_COUNT_RANGE)),
        ];

        for (name, value, range) in fields {
            // NaN is never contained
            if !range.contains(&value) {
                return Err(RequestError::InvalidInput(format!(
                    "{} must be between {} and {}, got {}",
                    name,
                    range.start(),
                    range.end(),
                    value
                )));
            }
        }
        Ok(())
    }

    /// Overlay whitespace-separated `key=value` pairs onto a copy of `self`
    ///
    /// Keys: budget, runtime, release_date (YYYY-MM-DD), genres, companies,
    /// keywords, popularity, vote_average, vote_count.
    pub fn apply_request(&self, line: &str) -> Result<Self, RequestError> {
        let mut input = self.clone();

        for pair in line.split_whitespace() {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                RequestError::Malformed(format!("expected key=value, got '{}'", pair))
            })?;

            match key {
                "budget" => input.budget = parse_field(key, value)?,
                "runtime" => input.runtime = parse_field(key, value)?,
                "release_date" => {
                    input.release_date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
                        .map_err(|e| {
                            RequestError::Malformed(format!("release_date '{}': {}", value, e))
                        })?
                }
                "genres" => input.num_genres = parse_field(key, value)?,
                "companies" => input.production_companies = parse_field(key, value)?,
                "keywords" => input.keywords_count = parse_field(key, value)?,
                "popularity" => input.popularity = parse_field(key, value)?,
                "vote_average" => input.vote_average = parse_field(key, value)?,
                "vote_count" => input.vote_count = parse_field(key, value)?,
                other => {
                    return Err(RequestError::Malformed(format!("unknown field '{}'", other)))
                }
            }
        }

        input.check_ranges()?;
        Ok(input)
    }
}

fn parse_field<T>(key: &str, value: &str) -> Result<T, RequestError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .parse()
        .map_err(|e| RequestError::Malformed(format!("{} '{}': {}", key, value, e)))
}

/// Facts shown alongside the prediction; nothing else depends on them
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayFacts {
    pub budget_millions: f64,
    pub revenue_millions: f64,
    pub runtime: f64,
    pub release_month: u32,
    pub release_year: i32,
}

/// Full answer for one request
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionReport {
    pub predicted_revenue: f64,
    pub roi: f64,
    pub band: RoiBand,
    pub cluster: usize,
    pub insight: &'static str,
    pub tip: &'static str,
    pub facts: DisplayFacts,
    /// Model input row, in persisted feature order
    pub feature_row: Vec<(String, f64)>,
}

impl PredictionReport {
    /// Tabular view of the raw feature row
    pub fn render_feature_row(&self) -> String {
        let width = self
            .feature_row
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0);
        self.feature_row
            .iter()
            .map(|(name, value)| format!("  {:<width$} | {}", name, value, width = width))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for PredictionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "✓ Predicted Revenue: {}",
            format_dollars(self.predicted_revenue)
        )?;
        writeln!(f, "  Expected ROI: {:.1}% ({})", self.roi, self.band)?;
        writeln!(f, "  Movie Type: Cluster {} – {}", self.cluster, self.insight)?;
        writeln!(f, "  Marketing Recommendation: {}", self.tip)?;

        let facts = &self.facts;
        writeln!(f, "\n=== Performance Factors ===")?;
        writeln!(
            f,
            "  Budget Efficiency: ${:.1}M → ${:.1}M - Higher budget doesn't always mean higher returns",
            facts.budget_millions, facts.revenue_millions
        )?;
        writeln!(
            f,
            "  Runtime Impact: {} minutes - Optimal runtime varies by genre - comedies do better shorter, epics longer",
            facts.runtime
        )?;
        write!(
            f,
            "  Release Timing: Month {} (Year: {}) - Summer/holiday releases typically perform better for commercial films",
            facts.release_month, facts.release_year
        )
    }
}

/// Whole-dollar amount with thousands separators, e.g. `$1,234,567`
pub fn format_dollars(amount: f64) -> String {
    let whole = amount.trunc() as i64;
    let digits = whole.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if whole < 0 {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

/// Loaded, immutable artifact set serving prediction requests
#[derive(Debug, Clone)]
pub struct Predictor {
    artifacts: ArtifactSet,
}

impl Predictor {
    pub fn new(artifacts: ArtifactSet) -> Self {
        Self { artifacts }
    }

    /// Load the artifact set from a models directory
    pub fn load(models_dir: &Path) -> Result<Self, ArtifactError> {
        ArtifactSet::load(models_dir).map(Self::new)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.artifacts.feature_names
    }

    /// Predict revenue, ROI, cluster and season guidance for one movie
    pub fn predict(&self, input: &MovieInput) -> Result<PredictionReport, RequestError> {
        input.check_ranges()?;

        let vector = input.feature_vector();
        let row = to_canonical_order(&vector.named(), self.feature_names())
            .map_err(|e| RequestError::FeatureRow(e.to_string()))?;
        let feature_row = self
            .feature_names()
            .iter()
            .cloned()
            .zip(row.iter().copied())
            .collect();

        let raw = row.insert_axis(Axis(0));
        let scaled = self
            .artifacts
            .scaler
            .transform(&raw)
            .map_err(|e| RequestError::Prediction(e.to_string()))?;
        let predicted_revenue = self
            .artifacts
            .regressor
            .predict(&scaled)
            .map_err(|e| RequestError::Prediction(e.to_string()))?
            .get(0)
            .copied()
            .ok_or_else(|| RequestError::Prediction("regressor returned no value".to_string()))?;
        let cluster = self
            .artifacts
            .clusterer
            .predict(scaled.row(0))
            .map_err(|e| RequestError::Prediction(e.to_string()))?;

        let roi = roi_percent(predicted_revenue, input.budget);

        Ok(PredictionReport {
            predicted_revenue,
            roi,
            band: RoiBand::classify(roi),
            cluster,
            insight: cluster_insight(cluster),
            tip: seasonal_tip(input.release_month()),
            facts: DisplayFacts {
                budget_millions: input.budget / 1_000_000.0,
                revenue_millions: predicted_revenue / 1_000_000.0,
                runtime: input.runtime,
                release_month: input.release_month(),
                release_year: input.release_year(),
            },
            feature_row,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn june_release() -> MovieInput {
        MovieInput::with_release_date(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap())
    }

    #[test]
    fn test_roi_bands_are_strict() {
        let roi = roi_percent(300.0, 100.0);
        assert_eq!(roi, 200.0);
        assert_eq!(RoiBand::classify(roi), RoiBand::Good);

        assert_eq!(RoiBand::classify(200.1), RoiBand::Excellent);
        assert_eq!(RoiBand::classify(100.0), RoiBand::Moderate);
        assert_eq!(RoiBand::classify(0.5), RoiBand::Moderate);
        assert_eq!(RoiBand::classify(0.0), RoiBand::Loss);
        assert_eq!(RoiBand::classify(-40.0).label(), "Loss expected");
    }

    #[test]
    fn test_cluster_insight_lookup() {
        assert!(cluster_insight(0).starts_with("Blockbuster"));
        assert!(cluster_insight(3).starts_with("Genre Film"));
        assert_eq!(cluster_insight(4), UNKNOWN_CATEGORY);
        assert_eq!(cluster_insight(usize::MAX), UNKNOWN_CATEGORY);
    }

    #[test]
    fn test_seasonal_tips() {
        assert_eq!(seasonal_tip(6), SUMMER_TIP);
        assert_eq!(seasonal_tip(5), SUMMER_TIP);
        assert_eq!(seasonal_tip(8), SUMMER_TIP);
        assert_eq!(seasonal_tip(12), HOLIDAY_TIP);
        assert_eq!(seasonal_tip(11), HOLIDAY_TIP);
        assert_eq!(seasonal_tip(1), AWARD_TIP);
        assert_eq!(seasonal_tip(2), AWARD_TIP);
        assert_eq!(seasonal_tip(3), STANDARD_TIP);
        assert_eq!(seasonal_tip(9), STANDARD_TIP);
        assert_eq!(seasonal_tip(0), STANDARD_TIP);
    }

    #[test]
    fn test_feature_vector_scales_popularity() {
        let vector = june_release().feature_vector();
        assert_eq!(vector.popularity, 5.0);
        assert_eq!(vector.release_month, 6.0);
        assert_eq!(vector.release_year, 2024.0);
        assert_eq!(vector.production_companies_count, 3.0);
    }

    #[test]
    fn test_apply_request() {
        let base = june_release();
        let input = base
            .apply_request("budget=1000000 release_date=2023-12-01 genres=4 popularity=80")
            .unwrap();

        assert_eq!(input.budget, 1_000_000.0);
        assert_eq!(input.release_month(), 12);
        assert_eq!(input.num_genres, 4);
        assert_eq!(input.popularity, 80.0);
        // Untouched fields keep the base values
        assert_eq!(input.runtime, base.runtime);

        assert!(matches!(
            base.apply_request("budget"),
            Err(RequestError::Malformed(_))
        ));
        assert!(matches!(
            base.apply_request("director=nolan"),
            Err(RequestError::Malformed(_))
        ));
        assert!(matches!(
            base.apply_request("genres=-1"),
            Err(RequestError::Malformed(_))
        ));
    }

    #[test]
    fn test_apply_request_enforces_form_ranges() {
        let base = june_release();
        let rejected =
            base.apply_request("budget=1 runtime=5000 vote_average=55 genres=99 popularity=100000");
        assert!(matches!(rejected, Err(RequestError::InvalidInput(_))));

        for line in [
            "budget=999999",
            "budget=300000001",
            "runtime=59",
            "genres=0",
            "companies=11",
            "keywords=4",
            "popularity=0.5",
            "vote_average=10.5",
            "vote_count=99",
            "vote_average=NaN",
        ] {
            assert!(
                matches!(base.apply_request(line), Err(RequestError::InvalidInput(_))),
                "accepted {}",
                line
            );
        }

        // Bounds are inclusive
        let edges = base
            .apply_request("budget=1000000 runtime=240 genres=5 keywords=5 vote_average=1.0 vote_count=10000")
            .unwrap();
        assert_eq!(edges.runtime, 240.0);
        assert!(base.apply_request("budget=300000000 popularity=100").is_ok());
    }

    #[test]
    fn test_check_ranges_rejects_non_positive_budget() {
        let mut input = june_release();
        assert!(input.check_ranges().is_ok());

        input.budget = 0.0;
        assert!(matches!(input.check_ranges(), Err(RequestError::InvalidInput(_))));

        input.budget = 1_000_000.0;
        input.vote_count = f64::NAN;
        assert!(input.check_ranges().is_err());
    }

    #[test]
    fn test_format_dollars() {
        assert_eq!(format_dollars(0.0), "$0");
        assert_eq!(format_dollars(999.9), "$999");
        assert_eq!(format_dollars(1_234_567.8), "$1,234,567");
        assert_eq!(format_dollars(-25_000.0), "-$25,000");
    }
}
