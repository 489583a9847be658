//! Command-line interface definitions and argument parsing

use crate::booster::BoostingConfig;
use crate::pipeline::{ClusterScope, TrainingConfig, N_CLUSTERS};
use crate::predict::{
    MovieInput, BUDGET_RANGE, COMPANIES_RANGE, GENRES_RANGE, KEYWORDS_RANGE, POPULARITY_RANGE,
    RUNTIME_RANGE, VOTE_AVERAGE_RANGE, VOTE_COUNT_RANGE,
};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Movie box-office revenue prediction and marketing strategy
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fit the scaler, revenue model and clusterer and save them
    Train(TrainArgs),
    /// Predict revenue and strategy for one movie
    Predict(PredictArgs),
    /// Answer one `key=value` request per stdin line
    Interactive(InteractiveArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Path to the input CSV file
    #[arg(short, long, default_value = "tmdb_5000_movies.csv")]
    pub input: PathBuf,

    /// Directory the artifacts are written to
    #[arg(short, long, default_value = "models")]
    pub models_dir: PathBuf,

    /// Fraction of movies held out for the test score
    #[arg(long, default_value = "0.2")]
    pub test_size: f64,

    /// Seed for the train/test split and clustering
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Number of boosting rounds
    #[arg(long, default_value = "100")]
    pub n_estimators: usize,

    /// Boosting learning rate
    #[arg(long, default_value = "0.3")]
    pub learning_rate: f64,

    /// Maximum depth of each boosted tree
    #[arg(long, default_value = "6")]
    pub max_depth: usize,

    /// Maximum iterations for K-Means
    #[arg(long, default_value = "300")]
    pub max_iters: usize,

    /// Tolerance for K-Means convergence
    #[arg(long, default_value = "1e-4")]
    pub tolerance: f64,

    /// Rows the clusterer is fit on
    #[arg(long, value_enum, default_value_t = ClusterScope::Train)]
    pub cluster_scope: ClusterScope,

    /// Save a PNG scatter of the clusters to this path
    #[arg(long)]
    pub plot: Option<PathBuf>,
}

impl TrainArgs {
    pub fn to_config(&self) -> TrainingConfig {
        TrainingConfig {
            dataset: self.input.clone(),
            models_dir: self.models_dir.clone(),
            test_size: self.test_size,
            seed: self.seed,
            n_clusters: N_CLUSTERS,
            max_iters: self.max_iters,
            tolerance: self.tolerance,
            cluster_scope: self.cluster_scope,
            booster: BoostingConfig {
                n_estimators: self.n_estimators,
                learning_rate: self.learning_rate,
                max_depth: self.max_depth,
                seed: self.seed,
                ..Default::default()
            },
            plot: self.plot.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Directory the artifacts are read from
    #[arg(short, long, default_value = "models")]
    pub models_dir: PathBuf,

    /// Also print the raw model input row
    #[arg(long)]
    pub show_features: bool,

    #[command(flatten)]
    pub movie: MovieArgs,
}

#[derive(Args, Debug)]
pub struct InteractiveArgs {
    /// Directory the artifacts are read from
    #[arg(short, long, default_value = "models")]
    pub models_dir: PathBuf,

    /// Also print the raw model input row
    #[arg(long)]
    pub show_features: bool,
}

/// Movie description, bounded like the original input form
#[derive(Args, Debug, Clone)]
pub struct MovieArgs {
    /// Budget in dollars
    #[arg(long, default_value = "50000000", value_parser = clap::value_parser!(u64).range(BUDGET_RANGE))]
    pub budget: u64,

    /// Runtime in minutes
    #[arg(long, default_value = "120", value_parser = clap::value_parser!(u32).range(RUNTIME_RANGE))]
    pub runtime: u32,

    /// Release date (YYYY-MM-DD), defaults to today
    #[arg(long, value_parser = parse_date)]
    pub release_date: Option<NaiveDate>,

    /// Number of genres
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u32).range(GENRES_RANGE))]
    pub genres: u32,

    /// Number of production companies
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(COMPANIES_RANGE))]
    pub companies: u32,

    /// Number of keywords/tags
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u32).range(KEYWORDS_RANGE))]
    pub keywords: u32,

    /// Expected popularity (1-100)
    #[arg(long, default_value = "50", value_parser = clap::value_parser!(u32).range(POPULARITY_RANGE))]
    pub popularity: u32,

    /// Expected vote average (1-10)
    #[arg(long, default_value = "7.0", value_parser = parse_vote_average)]
    pub vote_average: f64,

    /// Expected vote count
    #[arg(long, default_value = "1000", value_parser = clap::value_parser!(u32).range(VOTE_COUNT_RANGE))]
    pub vote_count: u32,
}

impl MovieArgs {
    pub fn to_input(&self) -> MovieInput {
        MovieInput {
            budget: self.budget as f64,
            runtime: f64::from(self.runtime),
            release_date: self
                .release_date
                .unwrap_or_else(|| Local::now().date_naive()),
            num_genres: self.genres,
            production_companies: self.companies,
            keywords_count: self.keywords,
            popularity: f64::from(self.popularity),
            vote_average: self.vote_average,
            vote_count: f64::from(self.vote_count),
        }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{}': {}", value, e))
}

fn parse_vote_average(value: &str) -> Result<f64, String> {
    let vote: f64 = value
        .parse()
        .map_err(|_| format!("invalid vote average: {}", value))?;
    if !VOTE_AVERAGE_RANGE.contains(&vote) {
        return Err(format!(
            "vote average must be between {} and {}, got {}",
            VOTE_AVERAGE_RANGE.start(),
            VOTE_AVERAGE_RANGE.end(),
            vote
        ));
    }
    Ok(vote)
}
