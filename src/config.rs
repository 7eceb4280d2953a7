use crate::history::{NormalizerConfig, RouteAllowList, ServiceHours};
use crate::pipeline::PipelineConfig;
use anyhow::{anyhow, bail, Result};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "transit-history-eta")]
#[command(about = "Estimates bus positions and arrival times from historical GPS pings")]
pub struct Cli {
    /// Folder holding historical/, test/ and final/
    #[arg(long, env = "BUS_DATA_ROOT", default_value = "data", global = true)]
    pub data_root: PathBuf,

    /// IANA timezone the file names and hour buckets are expressed in
    #[arg(long, env = "BUS_TIMEZONE", default_value = "UTC", global = true)]
    pub timezone: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer every test query and write the answer sheet
    Predict(PredictArgs),
    /// Score an answer sheet against the ground truth
    Evaluate(EvaluateArgs),
    /// Send an answer sheet to the evaluation service
    Submit(SubmitArgs),
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Where to write the answer sheet
    #[arg(short, long, default_value = "answers.json")]
    pub output: PathBuf,

    /// Hours of history loaded before each test day starts
    #[arg(long, default_value_t = 5)]
    pub day_lookback_hours: u32,

    /// Hours of history each query looks back
    #[arg(long, default_value_t = 5)]
    pub query_lookback_hours: u32,

    /// Routes to keep (comma separated); defaults to the built-in list
    #[arg(long, env = "BUS_ROUTES", value_delimiter = ',')]
    pub routes: Vec<String>,

    /// First local hour of service (inclusive)
    #[arg(long, default_value_t = 8)]
    pub service_start_hour: u32,

    /// Last local hour of service (exclusive)
    #[arg(long, default_value_t = 23)]
    pub service_end_hour: u32,

    /// Keep pings from every hour of the day
    #[arg(long)]
    pub all_hours: bool,

    #[arg(long, env = "STUDENT_NAME", default_value = "")]
    pub student: String,

    #[arg(long, env = "SUBMISSION_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Score the answers against final/ right after writing them
    #[arg(long)]
    pub evaluate: bool,

    /// Report path used with --evaluate
    #[arg(long, default_value = "evaluation_report.txt")]
    pub report: PathBuf,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    #[arg(short, long, default_value = "answers.json")]
    pub predictions: PathBuf,

    #[arg(short, long, default_value = "evaluation_report.txt")]
    pub report: PathBuf,
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    #[arg(short, long, default_value = "answers.json")]
    pub predictions: PathBuf,

    /// Evaluation endpoint
    #[arg(long, env = "SUBMISSION_URL")]
    pub url: String,
}

impl Cli {
    pub fn timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("unknown timezone {:?}: {}", self.timezone, e))
    }

    pub fn historical_root(&self) -> PathBuf {
        self.data_root.join("historical")
    }

    pub fn test_root(&self) -> PathBuf {
        self.data_root.join("test")
    }

    pub fn truth_root(&self) -> PathBuf {
        self.data_root.join("final")
    }
}

impl PredictArgs {
    pub fn service_hours(&self) -> Result<Option<ServiceHours>> {
        if self.all_hours {
            return Ok(None);
        }
        if self.service_start_hour >= self.service_end_hour || self.service_end_hour > 24 {
            bail!(
                "invalid service hours {}-{}: expected start < end <= 24",
                self.service_start_hour,
                self.service_end_hour
            );
        }
        Ok(Some(ServiceHours {
            start: self.service_start_hour,
            end: self.service_end_hour,
        }))
    }

    pub fn route_allow_list(&self) -> Result<RouteAllowList> {
        if self.routes.is_empty() {
            return Ok(RouteAllowList::builtin());
        }
        let routes = RouteAllowList::new(
            self.routes
                .iter()
                .map(|r| r.trim())
                .filter(|r| !r.is_empty()),
        );
        if routes.is_empty() {
            bail!("--routes was given but lists no route");
        }
        Ok(routes)
    }

    pub fn pipeline_config(&self, cli: &Cli) -> Result<PipelineConfig> {
        Ok(PipelineConfig {
            historical_root: cli.historical_root(),
            test_root: cli.test_root(),
            day_lookback_hours: self.day_lookback_hours,
            query_lookback_hours: self.query_lookback_hours,
            normalizer: NormalizerConfig {
                routes: self.route_allow_list()?,
                service_hours: self.service_hours()?,
                timezone: cli.timezone()?,
            },
        })
    }
}
