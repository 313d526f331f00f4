//! Output formatting: table, JSON, YAML, plain.
//!
//! Objects are schema-less, so the table is built column by column from
//! the properties actually present (or the ones asked for with
//! `--columns`). Structured formats serialize the wire form.

use std::borrow::Borrow;
use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{builder::Builder, settings::Style};

use appstax_core::{Object, Value};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

const ID_COLUMN: &str = "id";
const SYSTEM_PREFIX: &str = "sys";

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stderr().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// One-line status banner for watch mode, printed to stderr.
pub fn banner(name: &str, count: usize, update: u64, color: bool) -> String {
    let noun = if count == 1 { "object" } else { "objects" };
    if color {
        format!(
            "{} {} {}",
            "●".green(),
            name.bold(),
            format!("{count} {noun} · update #{update}").dimmed()
        )
    } else {
        format!("● {name} {count} {noun} · update #{update}")
    }
}

// ── Render dispatcher ────────────────────────────────────────────────

/// Render a result list in the chosen format.
pub fn render_objects<O: Borrow<Object>>(
    format: OutputFormat,
    objects: &[O],
    columns: &[String],
) -> Result<String, CliError> {
    let objects: Vec<&Object> = objects.iter().map(Borrow::borrow).collect();
    Ok(match format {
        OutputFormat::Table => render_table(&objects, columns),
        OutputFormat::Json => serde_json::to_string_pretty(&objects)?,
        OutputFormat::JsonCompact => serde_json::to_string(&objects)?,
        OutputFormat::Yaml => serde_yaml::to_string(&objects)?,
        OutputFormat::Plain => objects
            .iter()
            .filter_map(|o| o.id())
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n"),
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Table ────────────────────────────────────────────────────────────

fn render_table(objects: &[&Object], columns: &[String]) -> String {
    let columns = if columns.is_empty() {
        discover_columns(objects)
    } else {
        columns.to_vec()
    };

    let mut builder = Builder::default();
    builder.push_record(std::iter::once(ID_COLUMN.to_owned()).chain(columns.iter().cloned()));
    for object in objects {
        let id = object.id().map(ToString::to_string).unwrap_or_default();
        builder.push_record(
            std::iter::once(id).chain(columns.iter().map(|c| cell(object.get(c)))),
        );
    }
    builder.build().with(Style::rounded()).to_string()
}

/// Non-system properties across all objects, in first-seen order.
fn discover_columns(objects: &[&Object]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for object in objects {
        for name in object.all_properties() {
            if !name.starts_with(SYSTEM_PREFIX) && !columns.iter().any(|c| c == name) {
                columns.push(name.to_owned());
            }
        }
    }
    columns
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::Object(o)) => o
            .id()
            .map_or_else(|| "{…}".to_owned(), |id| format!("{}/{id}", o.collection())),
        Some(Value::Reference(r)) => format!("→{}/{}", r.collection, r.id),
        Some(Value::List(items)) => format!("[{}]", items.len()),
        Some(scalar) => scalar.to_text().unwrap_or_default(),
    }
}
