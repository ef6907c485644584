use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use excel_refresh::RefreshJob;
use excel_refresh::db::{MySqlFetcher, TableData};
use excel_refresh::json_export;
use excel_refresh::update::{export_table, refresh};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Database password, overriding the job file
    #[arg(long, env = "EXCEL_REFRESH_DB_PASSWORD", hide_env_values = true, global = true)]
    db_password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch every source of a job and write `<stem>_update<ext>`
    Run {
        /// Job file (YAML)
        job: PathBuf,

        /// Keep formulas on rows that received no data
        #[arg(long)]
        keep_untouched_formulas: bool,
    },

    /// Fetch one source of a job and print its rows as JSON, or write them
    /// into a workbook
    Fetch {
        job: PathBuf,
        source: String,

        /// Write the rows into this workbook instead of printing them
        #[arg(long, conflicts_with = "output")]
        xlsx: Option<PathBuf>,

        /// Target sheet, created if missing
        #[arg(long, default_value = "Sheet1", requires = "xlsx")]
        sheet: String,

        /// Top-left cell of the written block
        #[arg(long, default_value = "A1", requires = "xlsx")]
        start: String,

        /// Leave out the column-name row
        #[arg(long, requires = "xlsx")]
        no_header: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print the formulas of a workbook as JSON
    Formulas {
        file: PathBuf,

        /// Only this sheet
        #[arg(long, short = 's')]
        sheet: Option<String>,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print a sheet as header-keyed JSON rows
    Dump {
        file: PathBuf,

        #[arg(long, short = 's')]
        sheet: String,

        /// Comma-separated header names to keep
        #[arg(long, short = 'c', value_delimiter = ',')]
        columns: Option<Vec<String>>,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Write the JSON to this file instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

impl OutputArgs {
    fn emit<T: Serialize>(&self, value: &T) -> Result<()> {
        match &self.output {
            Some(path) => {
                json_export::write_json_to_file(value, path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!("JSON written to {}", path.display());
            }
            None => println!("{}", json_export::serialize_to_json(value)?),
        }
        Ok(())
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "excel_refresh=debug"
    } else {
        "excel_refresh=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

async fn connect(job: &RefreshJob, password: Option<String>) -> Result<MySqlFetcher> {
    let config = job.database()?.clone().with_password_override(password);
    MySqlFetcher::connect(&config)
        .await
        .context("Failed to connect to the database")
}

fn write_rows(
    path: &Path,
    sheet: &str,
    data: &TableData,
    start: &str,
    header: bool,
) -> Result<()> {
    let range = export_table(path, sheet, data, start, header)
        .with_context(|| format!("Failed to write rows to {}", path.display()))?;
    match range {
        Some(range) => println!("{}!{}", sheet, range),
        None => println!("{}: no columns written", sheet),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run {
            job,
            keep_untouched_formulas,
        } => {
            let mut job = RefreshJob::from_file(&job)
                .with_context(|| format!("Failed to load job {}", job.display()))?;
            job.keep_untouched_formulas |= keep_untouched_formulas;

            let fetcher = Arc::new(connect(&job, cli.db_password).await?);
            let result = refresh(fetcher.clone(), &job).await;
            fetcher.close().await;

            let output = result?;
            info!("Refreshed workbook written to {}", output.display());
            println!("{}", output.display());
        }
        Command::Fetch {
            job,
            source,
            xlsx,
            sheet,
            start,
            no_header,
            output,
        } => {
            let job = RefreshJob::from_file(&job)
                .with_context(|| format!("Failed to load job {}", job.display()))?;
            let query = job
                .sources
                .get(&source)
                .with_context(|| format!("Job has no source named '{}'", source))?;

            let fetcher = connect(&job, cli.db_password).await?;
            let result = fetcher.source_data(query, Local::now().date_naive()).await;
            fetcher.close().await;
            let data = result?;

            match xlsx {
                Some(path) => write_rows(&path, &sheet, &data, &start, !no_header)?,
                None => output.emit(&data.to_json_rows())?,
            }
        }
        Command::Formulas {
            file,
            sheet,
            output,
        } => {
            let formulas = json_export::find_formulas_in_excel(&file, sheet.as_deref())?;
            output.emit(&formulas)?;
        }
        Command::Dump {
            file,
            sheet,
            columns,
            output,
        } => {
            let rows = json_export::read_excel_sheet(&file, &sheet, columns.as_deref())?;
            output.emit(&rows)?;
        }
    }

    Ok(())
}
