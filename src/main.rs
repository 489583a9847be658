//! BoxOffice: movie revenue prediction CLI
//!
//! `train` runs the offline pipeline and writes the artifact set; `predict`
//! and `interactive` load it once and answer prediction requests.

use anyhow::Result;
use boxoffice::cli::{InteractiveArgs, PredictArgs, TrainArgs};
use boxoffice::{run_training, Cli, Command, MovieInput, PredictionReport, Predictor};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::time::Instant;
use tracing::{error, info};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "boxoffice=debug"
    } else {
        "boxoffice=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Command::Train(args) => run_train(&args),
        Command::Predict(args) => run_predict(&args),
        Command::Interactive(args) => run_interactive(&args),
    }
}

/// Run the full training pipeline
fn run_train(args: &TrainArgs) -> Result<()> {
    println!("=== Training Pipeline ===\n");
    let start_time = Instant::now();

    let config = args.to_config();
    let report = run_training(&config)?;

    println!("{}", report);
    println!("\n=== Pipeline Complete ===");
    println!(
        "✓ Models trained and saved in {}",
        config.models_dir.display()
    );
    println!("Total processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

/// Answer a single request described by command-line flags
fn run_predict(args: &PredictArgs) -> Result<()> {
    let predictor = load_predictor(&args.models_dir)?;
    let input = args.movie.to_input();

    match predictor.predict(&input) {
        Ok(report) => {
            print_report(&report, args.show_features);
            Ok(())
        }
        Err(err) => {
            error!("Prediction failed: {}", err);
            Err(err.into())
        }
    }
}

/// Answer one request per stdin line until EOF or `quit`
fn run_interactive(args: &InteractiveArgs) -> Result<()> {
    let predictor = load_predictor(&args.models_dir)?;
    let base = MovieInput::default();

    println!("Enter movie details as key=value pairs (e.g. budget=80000000 release_date=2025-07-04).");
    println!("Fields: budget runtime release_date genres companies keywords popularity vote_average vote_count");
    println!("Type 'quit' to exit.\n");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let request = line.trim();
        if request.is_empty() {
            continue;
        }
        if matches!(request, "quit" | "exit") {
            break;
        }

        let result = base
            .apply_request(request)
            .and_then(|input| predictor.predict(&input));
        match result {
            Ok(report) => print_report(&report, args.show_features),
            Err(err) => println!("✗ {}", err),
        }
        println!();
    }

    Ok(())
}

fn load_predictor(models_dir: &std::path::Path) -> Result<Predictor> {
    match Predictor::load(models_dir) {
        Ok(predictor) => {
            info!(
                features = predictor.feature_names().len(),
                "Loaded models from {}",
                models_dir.display()
            );
            Ok(predictor)
        }
        Err(err) => {
            error!("Error loading models: {}", err);
            Err(err.into())
        }
    }
}

fn print_report(report: &PredictionReport, show_features: bool) {
    println!("{}", report);
    if show_features {
        println!("\n=== Raw Input Data ===");
        println!("{}", report.render_feature_row());
    }
}
