//! Data loading and movie feature engineering using Polars

use anyhow::{anyhow, Context};
use chrono::{Datelike, NaiveDate};
use ndarray::{Array1, Array2, Axis};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Number of model features
pub const N_FEATURES: usize = 10;

/// Canonical feature order shared by training and inference
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "budget",
    "runtime",
    "release_month",
    "release_year",
    "num_genres",
    "production_companies_count",
    "keywords_count",
    "popularity",
    "vote_average",
    "vote_count",
];

/// Date formats accepted for `release_date`, tried in order
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// One row of the historical dataset, as read from the CSV
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMovie {
    pub budget: f64,
    pub revenue: f64,
    pub runtime: Option<f64>,
    pub release_date: Option<String>,
    /// JSON-encoded list, only its length is used
    pub genres: Option<String>,
    /// JSON-encoded list, only its length is used
    pub production_companies: Option<String>,
    /// JSON-encoded list, only its length is used
    pub keywords: Option<String>,
    pub popularity: Option<f64>,
    pub vote_average: Option<f64>,
    pub vote_count: Option<f64>,
}

impl RawMovie {
    /// Engineer the canonical feature vector. Nulls become zero.
    pub fn features(&self) -> FeatureVector {
        let (release_month, release_year) = parse_release_date(self.release_date.as_deref());

        FeatureVector {
            budget: fill_null(Some(self.budget)),
            runtime: fill_null(self.runtime),
            release_month: f64::from(release_month),
            release_year: f64::from(release_year),
            num_genres: count_list_items(self.genres.as_deref()) as f64,
            production_companies_count: count_list_items(self.production_companies.as_deref())
                as f64,
            keywords_count: count_list_items(self.keywords.as_deref()) as f64,
            popularity: fill_null(self.popularity),
            vote_average: fill_null(self.vote_average),
            vote_count: fill_null(self.vote_count),
        }
    }

    /// Popularity per vote, with the vote count floored at 1.
    ///
    /// Not a model feature; the pipeline only reports it.
    pub fn popularity_vote_ratio(&self) -> f64 {
        fill_null(self.popularity) / fill_null(self.vote_count).max(1.0)
    }
}

/// Canonical 10-field model input
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub budget: f64,
    pub runtime: f64,
    pub release_month: f64,
    pub release_year: f64,
    pub num_genres: f64,
    pub production_companies_count: f64,
    pub keywords_count: f64,
    pub popularity: f64,
    pub vote_average: f64,
    pub vote_count: f64,
}

impl FeatureVector {
    /// Fields paired with their names, in `FEATURE_NAMES` order
    pub fn named(&self) -> [(&'static str, f64); N_FEATURES] {
        [
            (FEATURE_NAMES[0], self.budget),
            (FEATURE_NAMES[1], self.runtime),
            (FEATURE_NAMES[2], self.release_month),
            (FEATURE_NAMES[3], self.release_year),
            (FEATURE_NAMES[4], self.num_genres),
            (FEATURE_NAMES[5], self.production_companies_count),
            (FEATURE_NAMES[6], self.keywords_count),
            (FEATURE_NAMES[7], self.popularity),
            (FEATURE_NAMES[8], self.vote_average),
            (FEATURE_NAMES[9], self.vote_count),
        ]
    }

    pub fn to_array(&self) -> [f64; N_FEATURES] {
        self.named().map(|(_, value)| value)
    }
}

/// Build a row in the order of `canonical`.
///
/// Names missing from `partial` are filled with zero. A supplied name that is
/// not part of `canonical`, or one supplied twice, is an error rather than
/// being dropped.
pub fn to_canonical_order(
    partial: &[(&str, f64)],
    canonical: &[String],
) -> crate::Result<Array1<f64>> {
    let mut row = Array1::zeros(canonical.len());
    let mut seen = HashSet::with_capacity(partial.len());

    for &(name, value) in partial {
        if !seen.insert(name) {
            anyhow::bail!("Feature '{}' supplied more than once", name);
        }
        let idx = canonical
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| anyhow!("Feature '{}' is not in the persisted feature list", name))?;
        row[idx] = fill_null(Some(value));
    }

    Ok(row)
}

/// Movies that passed the training filter
#[derive(Debug, Clone)]
pub struct MovieTable {
    pub movies: Vec<RawMovie>,
    /// Rows in the file before filtering
    pub total_rows: usize,
}

impl MovieTable {
    pub fn len(&self) -> usize {
        self.movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.movies.is_empty()
    }

    /// Rows dropped by the budget/revenue filter
    pub fn dropped_rows(&self) -> usize {
        self.total_rows - self.movies.len()
    }

    /// Raw feature matrix (n_movies, N_FEATURES)
    pub fn feature_matrix(&self) -> crate::Result<Array2<f64>> {
        let flat: Vec<f64> = self
            .movies
            .iter()
            .flat_map(|movie| movie.features().to_array())
            .collect();
        Ok(Array2::from_shape_vec((self.movies.len(), N_FEATURES), flat)?)
    }

    /// Revenue target aligned with `feature_matrix`
    pub fn revenue(&self) -> Array1<f64> {
        self.movies.iter().map(|movie| movie.revenue).collect()
    }

    /// Mean popularity-to-vote ratio across the table
    pub fn mean_popularity_vote_ratio(&self) -> f64 {
        if self.movies.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .movies
            .iter()
            .map(RawMovie::popularity_vote_ratio)
            .filter(|ratio| ratio.is_finite())
            .sum();
        total / self.movies.len() as f64
    }
}

/// Load the movie CSV and keep rows with positive budget and revenue
///
/// # Arguments
/// * `file_path` - Path to a TMDB-style CSV file
///
/// # Returns
/// * `MovieTable` with the surviving rows
pub fn load_training_movies(file_path: impl AsRef<Path>) -> crate::Result<MovieTable> {
    let path = file_path.as_ref();
    if !path.exists() {
        anyhow::bail!("Dataset not found: {}", path.display());
    }

    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .finish()
        .with_context(|| format!("Failed to open {}", path.display()))?
        .collect()
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let total_rows = df.height();

    // Null budgets or revenues compare as null and are dropped too
    let df = df
        .lazy()
        .filter(col("budget").gt(lit(0)).and(col("revenue").gt(lit(0))))
        .collect()?;

    if df.height() == 0 {
        anyhow::bail!(
            "No valid movies found after filtering ({} rows read)",
            total_rows
        );
    }

    let movies = movies_from_frame(&df)?;
    info!(
        kept = movies.len(),
        dropped = total_rows - movies.len(),
        "Loaded movies from {}",
        path.display()
    );

    Ok(MovieTable { movies, total_rows })
}

/// Convert the filtered DataFrame into typed records
fn movies_from_frame(df: &DataFrame) -> crate::Result<Vec<RawMovie>> {
    let budget = f64_column(df, "budget")?;
    let revenue = f64_column(df, "revenue")?;
    let runtime = f64_column(df, "runtime")?;
    let release_date = str_column(df, "release_date")?;
    let genres = str_column(df, "genres")?;
    let production_companies = str_column(df, "production_companies")?;
    let keywords = str_column(df, "keywords")?;
    let popularity = f64_column(df, "popularity")?;
    let vote_average = f64_column(df, "vote_average")?;
    let vote_count = f64_column(df, "vote_count")?;

    let movies = (0..df.height())
        .map(|i| RawMovie {
            budget: budget[i].unwrap_or(0.0),
            revenue: revenue[i].unwrap_or(0.0),
            runtime: runtime[i],
            release_date: release_date[i].clone(),
            genres: genres[i].clone(),
            production_companies: production_companies[i].clone(),
            keywords: keywords[i].clone(),
            popularity: popularity[i],
            vote_average: vote_average[i],
            vote_count: vote_count[i],
        })
        .collect();

    Ok(movies)
}

fn f64_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<f64>>> {
    let series = df
        .column(name)
        .with_context(|| format!("Missing column '{}'", name))?
        .as_materialized_series()
        .cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

fn str_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<String>>> {
    let series = df
        .column(name)
        .with_context(|| format!("Missing column '{}'", name))?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(series
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_owned))
        .collect())
}

/// Parse a release date into (month, year); anything unusable gives (0, 0)
pub fn parse_release_date(raw: Option<&str>) -> (u32, i32) {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return (0, 0);
    };

    let date = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| {
            // Timestamps such as "2009-12-10 00:00:00"
            text.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        });

    match date {
        Some(date) => (date.month(), date.year()),
        None => {
            debug!("Unparsable release date {:?}, using 0/0", text);
            (0, 0)
        }
    }
}

/// Length of a list encoded as JSON or as a Python literal
/// (`['Action', 'Drama']`); missing or unparsable gives 0
pub fn count_list_items(raw: Option<&str>) -> usize {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return 0;
    };

    match serde_json::from_str::<Vec<serde_json::Value>>(text) {
        Ok(items) => items.len(),
        Err(err) => count_literal_items(text).unwrap_or_else(|| {
            debug!("Unparsable list {:?}: {}", text, err);
            0
        }),
    }
}

/// Count the top-level items of a bracketed list, honouring either quote
/// style and nested brackets. `None` when the brackets or quotes don't balance.
fn count_literal_items(text: &str) -> Option<usize> {
    let inner = text.strip_prefix('[')?.strip_suffix(']')?;

    let mut count = 0;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut item_started = false;

    for ch in inner.chars() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == open {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' => {
                quote = Some(ch);
                item_started = true;
            }
            '[' | '{' | '(' => {
                depth += 1;
                item_started = true;
            }
            ']' | '}' | ')' => {
                depth = depth.checked_sub(1)?;
            }
            ',' if depth == 0 => {
                if item_started {
                    count += 1;
                }
                item_started = false;
            }
            c if !c.is_whitespace() => item_started = true,
            _ => {}
        }
    }

    if quote.is_some() || depth != 0 {
        return None;
    }
    if item_started {
        count += 1;
    }
    Some(count)
}

fn fill_null(value: Option<f64>) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Per-column standardization (zero mean, unit variance)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Array1<f64>,
    /// Population standard deviation, 1.0 for constant columns
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Learn mean and scale from the rows of `x`
    pub fn fit(x: &Array2<f64>) -> crate::Result<Self> {
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| anyhow!("Cannot fit scaler on an empty matrix"))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std > f64::EPSILON { std } else { 1.0 });

        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &Array2<f64>) -> crate::Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            anyhow::bail!(
                "Scaler expects {} features, got {}",
                self.n_features(),
                x.ncols()
            );
        }
        Ok((x - &self.mean) / &self.scale)
    }
}
