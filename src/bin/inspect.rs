use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use uimatch::app::config::{load_config, MatchingOptions};
use uimatch::app::error::AppError;
use uimatch::app::logging::init_logging;
use uimatch::app::matching::locator::{build_conditions_from_hint, ElementHint};

#[derive(Debug, Clone)]
struct Args {
    xml_path: PathBuf,
    bounds: Option<String>,
    path: Option<String>,
    text: Option<String>,
    resource_id: Option<String>,
    preset: Option<String>,
    include_positional: bool,
    json: bool,
}

#[derive(Serialize)]
struct InspectSummary {
    tool: &'static str,
    status: &'static str,
    trace_id: String,
    generated_at: String,
    xml_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    strategy: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f64>,
    fields: Vec<String>,
    values: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

const USAGE: &str = "Usage: cargo run --bin inspect -- --xml PATH [--bounds \"[l,t][r,b]\"] [--path XPATH] [--text TEXT] [--resource-id ID] [--preset cross-device|smart-hierarchy|precise] [--include-positional] [--json]";

fn parse_args() -> Result<Args, String> {
    let mut xml_path: Option<PathBuf> = None;
    let mut bounds: Option<String> = None;
    let mut path: Option<String> = None;
    let mut text: Option<String> = None;
    let mut resource_id: Option<String> = None;
    let mut preset: Option<String> = None;
    let mut include_positional = false;
    let mut json = false;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--xml" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--xml requires a value".to_string())?;
                xml_path = Some(PathBuf::from(value));
            }
            "--bounds" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--bounds requires a value".to_string())?;
                bounds = Some(value);
            }
            "--path" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--path requires a value".to_string())?;
                path = Some(value);
            }
            "--text" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--text requires a value".to_string())?;
                text = Some(value);
            }
            "--resource-id" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--resource-id requires a value".to_string())?;
                resource_id = Some(value);
            }
            "--preset" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--preset requires a value".to_string())?;
                preset = Some(value);
            }
            "--include-positional" => {
                include_positional = true;
            }
            "--json" => {
                json = true;
            }
            "-h" | "--help" => {
                return Err(USAGE.to_string());
            }
            other => return Err(format!("Unknown arg: {other}")),
        }
    }

    let Some(xml_path) = xml_path else {
        return Err(USAGE.to_string());
    };
    if bounds.is_none() && path.is_none() && text.is_none() && resource_id.is_none() {
        return Err("At least one of --bounds, --path, --text or --resource-id is required"
            .to_string());
    }

    Ok(Args {
        xml_path,
        bounds,
        path,
        text,
        resource_id,
        preset,
        include_positional,
        json,
    })
}

fn resolve_options(args: &Args, trace_id: &str) -> Result<MatchingOptions, AppError> {
    let mut options = match args.preset.as_deref() {
        Some(name) => MatchingOptions::preset(name).ok_or_else(|| {
            AppError::validation(format!("Unknown preset: {name}"), trace_id)
        })?,
        None => load_config()?.matching,
    };
    if args.include_positional {
        options.exclude_positional_fields = false;
    }
    Ok(options)
}

fn run(args: &Args, trace_id: &str) -> Result<InspectSummary, AppError> {
    let options = resolve_options(args, trace_id)?;
    let xml = fs::read_to_string(&args.xml_path).map_err(|err| {
        AppError::system(
            format!("Failed to read {}: {err}", args.xml_path.display()),
            trace_id,
        )
    })?;

    let hint = ElementHint {
        resource_id: args.resource_id.clone(),
        text: args.text.clone(),
        bounds: args.bounds.clone(),
        path: args.path.clone(),
        ..ElementHint::default()
    };
    let conditions = build_conditions_from_hint(&xml, &hint, &options, trace_id)?;

    Ok(InspectSummary {
        tool: "uimatch_inspect",
        status: "pass",
        trace_id: trace_id.to_string(),
        generated_at: Utc::now().to_rfc3339(),
        xml_path: args.xml_path.display().to_string(),
        matched_path: Some(conditions.analysis.path.clone()),
        strategy: Some(conditions.strategy.as_str()),
        confidence: Some(conditions.confidence),
        fields: conditions.fields.clone(),
        values: conditions.values.clone(),
        error_code: None,
        error: None,
    })
}

fn main() {
    let args = match parse_args() {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };

    init_logging();
    let trace_id = Uuid::new_v4().to_string();

    let summary = match run(&args, &trace_id) {
        Ok(summary) => summary,
        Err(err) => InspectSummary {
            tool: "uimatch_inspect",
            status: "fail",
            trace_id: trace_id.clone(),
            generated_at: Utc::now().to_rfc3339(),
            xml_path: args.xml_path.display().to_string(),
            matched_path: None,
            strategy: None,
            confidence: None,
            fields: Vec::new(),
            values: HashMap::new(),
            error_code: Some(err.code.clone()),
            error: Some(err.error.clone()),
        },
    };

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(payload) => println!("{payload}"),
            Err(err) => {
                eprintln!("Failed to serialize summary: {err}");
                std::process::exit(1);
            }
        }
    } else {
        match summary.status {
            "pass" => {
                info!(
                    path = summary.matched_path.as_deref().unwrap_or(""),
                    strategy = summary.strategy.unwrap_or(""),
                    confidence = summary.confidence.unwrap_or(0.0),
                    "matched element"
                );
                for key in &summary.fields {
                    let value = summary.values.get(key).map(String::as_str).unwrap_or("");
                    println!("{key} = {value}");
                }
            }
            _ => {
                eprintln!(
                    "{} ({})",
                    summary.error.as_deref().unwrap_or("unknown error"),
                    summary.error_code.as_deref().unwrap_or("ERR_UNKNOWN")
                );
            }
        }
    }

    if summary.status != "pass" {
        std::process::exit(1);
    }
}
