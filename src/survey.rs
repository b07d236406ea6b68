use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use survey_tally::*;

use std::fs;
use std::io;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::{Args, Command, FilterArgs};
use crate::survey::config_reader::*;
use crate::survey::io_sqlite::SqliteStore;

pub mod config_reader;
pub mod console;
pub mod io_sqlite;

#[derive(Debug, Snafu)]
pub enum SurveyError {
    #[snafu(display("Error opening file {path}: {source}"))]
    OpeningJson { source: io::Error, path: String },
    #[snafu(display("Error parsing JSON: {source}"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Invalid survey definition: {source}"))]
    InvalidSurvey { source: DefinitionError },
    #[snafu(display("Error opening database {path}: {source}"))]
    OpeningDatabase {
        source: rusqlite::Error,
        path: String,
    },
    #[snafu(display("Error writing CSV export: {source}"))]
    Export { source: ExportError },
    #[snafu(display("Error writing {path}: {source}"))]
    Writing { source: io::Error, path: String },
    #[snafu(display("Terminal error: {source}"))]
    Terminal { source: io::Error },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type SurveyResult<T> = Result<T, SurveyError>;

pub fn response_filter(args: &FilterArgs) -> ResponseFilter {
    let selector = |x: &Option<String>| x.as_deref().map(Selector::parse).unwrap_or_default();
    ResponseFilter {
        org_type: selector(&args.org_type),
        org_size: selector(&args.org_size),
        locations: args.locations.iter().map(|l| l.trim().to_string()).collect(),
    }
}

fn selector_to_json(s: &Selector) -> JSValue {
    match s {
        Selector::All => json!(ALL),
        Selector::Only(x) => json!(x),
    }
}

fn tally_to_json(tally: &[(String, u64)]) -> Vec<JSValue> {
    tally
        .iter()
        .map(|(value, count)| json!({"value": value, "count": count}))
        .collect()
}

fn question_to_json(qs: &QuestionSummary) -> JSValue {
    let tally: Vec<JSValue> = qs
        .tally
        .iter()
        .map(|(answer, count)| {
            json!({
                "answer": answer,
                "count": count,
                "share": qs.share(*count),
            })
        })
        .collect();
    json!({
        "id": qs.question,
        "heading": qs.heading,
        "respondents": qs.respondents,
        "tally": tally,
    })
}

/// The JSON summary of a dataset, after filtering.
pub fn build_summary_js(survey: &Survey, dataset: &Dataset, filter: &ResponseFilter) -> JSValue {
    let filters = json!({
        "orgType": selector_to_json(&filter.org_type),
        "orgSize": selector_to_json(&filter.org_size),
        "locations": filter.locations,
    });

    let status = match dataset {
        Dataset::Responses(_) => None,
        Dataset::Empty => Some(json!({"status": "noData", "message": "No responses yet."})),
        Dataset::Unavailable(e) => Some(json!({
            "status": "noData",
            "message": "No responses yet.",
            "reason": e.to_string(),
        })),
    };
    if let Some(mut js) = status {
        js["survey"] = json!(survey.title());
        js["filters"] = filters;
        return js;
    }

    let rows = dataset.rows();
    let filtered = apply_filters(rows, filter);
    let summary = summarize(survey, &filtered);
    let questions: Vec<JSValue> = summary.questions.iter().map(question_to_json).collect();
    json!({
        "survey": survey.title(),
        "status": if filtered.is_empty() { "noMatch" } else { "ok" },
        "filters": filters,
        "totalResponses": summary.total_responses,
        "distinctOrganizations": summary.distinct_organizations,
        "questions": questions,
        "orgTypes": tally_to_json(&summary.org_types),
        "orgSizes": tally_to_json(&summary.org_sizes),
        "locations": tally_to_json(&summary.locations),
        "filterOptions": filter_options(rows),
    })
}

fn read_dataset(db_path: &str) -> Dataset {
    match SqliteStore::open_read_only(db_path) {
        Ok(store) => load_dataset(&store),
        Err(e) => {
            warn!("Cannot open database {:?}: {}", db_path, e);
            Dataset::Unavailable(e)
        }
    }
}

fn write_output(out: &Option<String>, content: &[u8]) -> SurveyResult<()> {
    match out.as_deref() {
        None | Some("stdout") => {
            use std::io::Write;
            io::stdout()
                .write_all(content)
                .context(WritingSnafu { path: "stdout" })
        }
        Some(path) => {
            info!("Writing output to {:?}", path);
            fs::write(path, content).context(WritingSnafu { path })
        }
    }
}

/// Compares a summary with a reference summary, printing the differences.
pub fn check_reference(summary: &JSValue, reference_path: &str) -> SurveyResult<()> {
    let summary_ref = read_summary(reference_path)?;
    let pretty_ref = serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    let pretty = serde_json::to_string_pretty(summary).context(ParsingJsonSnafu {})?;
    if pretty_ref != pretty {
        warn!("Found differences with the reference summary");
        print_diff(pretty_ref.as_str(), pretty.as_str(), "\n");
        whatever!("Difference detected between computed summary and reference summary")
    }
    Ok(())
}

pub fn run_report(
    survey: &Survey,
    db_path: &str,
    filters: &FilterArgs,
    out: &Option<String>,
    reference: &Option<String>,
) -> SurveyResult<()> {
    let dataset = read_dataset(db_path);
    if !dataset.has_data() {
        eprintln!("No responses yet.");
    }
    let filter = response_filter(filters);
    let summary_js = build_summary_js(survey, &dataset, &filter);
    let pretty = serde_json::to_string_pretty(&summary_js).context(ParsingJsonSnafu {})?;
    debug!("summary: {}", pretty);
    write_output(out, format!("{}\n", pretty).as_bytes())?;

    if let Some(reference_p) = reference {
        check_reference(&summary_js, reference_p)?;
    }
    Ok(())
}

pub fn run_export(db_path: &str, filters: &FilterArgs, out: &Option<String>) -> SurveyResult<()> {
    let dataset = read_dataset(db_path);
    if !dataset.has_data() {
        eprintln!("No responses yet.");
    }
    let rows = apply_filters(dataset.rows(), &response_filter(filters));
    let table = to_exportable_table(&rows).context(ExportSnafu {})?;
    info!("Exporting {} responses", rows.len());
    write_output(out, &table)
}

pub fn run_intake(survey: &Survey, db_path: &str, repeat: bool) -> SurveyResult<()> {
    let mut store = SqliteStore::open(db_path)?;
    let stdin = io::stdin();
    let stdout = io::stdout();
    let stored = console::run_intake(survey, &mut store, stdin.lock(), stdout.lock(), repeat)?;
    info!("Stored {} responses in {:?}", stored, db_path);
    Ok(())
}

pub fn run(args: &Args) -> SurveyResult<()> {
    let settings = read_settings(args.config.as_deref())?;
    let db_path = args.db.clone().unwrap_or(settings.database);
    info!("Survey {:?}, database {:?}", settings.survey.title(), db_path);

    match &args.command {
        Command::Intake { repeat } => run_intake(&settings.survey, &db_path, *repeat),
        Command::Report {
            filters,
            out,
            reference,
        } => run_report(&settings.survey, &db_path, filters, out, reference),
        Command::Export { filters, out } => run_export(&db_path, filters, out),
    }
}
