mod config;
mod error;
mod evaluate;
mod history;
mod output;
mod pipeline;
mod predictor;
mod query;
mod submit;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use config::{Cli, Command, EvaluateArgs, PredictArgs, SubmitArgs};
use evaluate::{load_ground_truth, render_report, score, ReportContext};
use output::{AnswerSheet, Prediction};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("transit_history_eta=info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Command::Predict(args) => predict(&cli, args).await,
        Command::Evaluate(args) => evaluate(&cli, args),
        Command::Submit(args) => submit(args).await,
    }
}

async fn predict(cli: &Cli, args: &PredictArgs) -> Result<()> {
    let config = args.pipeline_config(cli)?;
    info!(
        "Predicting from {} with {} routes",
        cli.data_root.display(),
        config.normalizer.routes.len()
    );

    // Fatal conditions surface here, before anything is written.
    let output = pipeline::run(&config)
        .await
        .context("prediction run aborted")?;

    let sheet = AnswerSheet::new(
        args.student.clone(),
        args.password.clone(),
        output.predictions,
        Utc::now(),
    );
    sheet
        .save(&args.output)
        .with_context(|| format!("writing {}", args.output.display()))?;

    println!(
        "Wrote {} predictions to {}",
        sheet.predictions.len(),
        args.output.display()
    );
    for prediction in sheet.predictions.iter().take(5) {
        println!("  {}", serde_json::to_string(prediction)?);
    }
    if sheet.predictions.len() > 5 {
        println!("  ...and {} more", sheet.predictions.len() - 5);
    }

    if args.evaluate {
        write_report(&cli.truth_root(), &sheet.predictions, &args.report)?;
    }
    Ok(())
}

fn evaluate(cli: &Cli, args: &EvaluateArgs) -> Result<()> {
    let sheet = AnswerSheet::load(&args.predictions)
        .with_context(|| format!("loading predictions from {}", args.predictions.display()))?;
    if sheet.predictions.is_empty() {
        bail!(
            "{} holds no predictions; run `predict` first",
            args.predictions.display()
        );
    }
    write_report(&cli.truth_root(), &sheet.predictions, &args.report)
}

fn write_report(truth_root: &Path, predictions: &[Prediction], report_path: &Path) -> Result<()> {
    let truth = load_ground_truth(truth_root)
        .with_context(|| format!("loading ground truth from {}", truth_root.display()))?;
    if truth.is_empty() {
        bail!(
            "no ground truth answers found under {}",
            truth_root.display()
        );
    }

    let card = score(predictions, &truth);
    let report = render_report(
        &ReportContext {
            generated_at: Utc::now(),
            total_predictions: predictions.len(),
            total_truth: truth.len(),
        },
        &card,
    );
    std::fs::write(report_path, &report)
        .with_context(|| format!("writing {}", report_path.display()))?;

    info!("Evaluation report saved to {}", report_path.display());
    println!("{}", report);
    Ok(())
}

async fn submit(args: &SubmitArgs) -> Result<()> {
    let sheet = AnswerSheet::load(&args.predictions)
        .with_context(|| format!("loading predictions from {}", args.predictions.display()))?;
    let client = reqwest::Client::new();
    let receipt = submit::submit_answers(&client, &args.url, &sheet).await?;
    println!("Evaluation service answered {}", receipt.status);
    println!("{}", receipt.body);
    Ok(())
}
