//! Output formatting: JSON, YAML, plain.
//!
//! Structured formats go through serde; plain emits one compact JSON value
//! per line so results pipe cleanly into line-oriented tools.

use std::io::{self, Write};

use serde::Serialize;
use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Render a list of items. `plain` prints one item per line.
pub fn render_list<T: Serialize>(format: &OutputFormat, data: &[T]) -> Result<String, CliError> {
    match format {
        OutputFormat::Plain => data
            .iter()
            .map(render_json_compact)
            .collect::<Result<Vec<_>, _>>()
            .map(|lines| lines.join("\n")),
        _ => render_single(format, data),
    }
}

/// Render one serializable value.
pub fn render_single<T: Serialize + ?Sized>(
    format: &OutputFormat,
    data: &T,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Json => render_json_pretty(data),
        OutputFormat::JsonCompact | OutputFormat::Plain => render_json_compact(data),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Render a raw JSON body. `plain` unwraps arrays into one line per element.
pub fn render_value(format: &OutputFormat, value: &Value) -> Result<String, CliError> {
    match (format, value) {
        (OutputFormat::Plain, Value::Array(items)) => render_list(format, items),
        _ => render_single(format, value),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_json_pretty<T: Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(data).map_err(|e| CliError::Render(e.to_string()))
}

fn render_json_compact<T: Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_json::to_string(data).map_err(|e| CliError::Render(e.to_string()))
}

fn render_yaml<T: Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    serde_yaml::to_string(data).map_err(|e| CliError::Render(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn plain_emits_one_item_per_line() {
        let items = vec![json!({"id": 1}), json!({"id": 2})];
        let out = render_list(&OutputFormat::Plain, &items).unwrap();
        assert_eq!(out, "{\"id\":1}\n{\"id\":2}");
    }

    #[test]
    fn compact_json_is_single_line() {
        let out = render_single(&OutputFormat::JsonCompact, &json!({"a": [1, 2]})).unwrap();
        assert_eq!(out, "{\"a\":[1,2]}");
    }

    #[test]
    fn yaml_renders_mapping() {
        let out = render_single(&OutputFormat::Yaml, &json!({"name": "x"})).unwrap();
        assert!(out.contains("name: x"));
    }

    #[test]
    fn plain_value_unwraps_arrays_only() {
        let arr = render_value(&OutputFormat::Plain, &json!([1, 2])).unwrap();
        assert_eq!(arr, "1\n2");
        let obj = render_value(&OutputFormat::Plain, &json!({"k": 1})).unwrap();
        assert_eq!(obj, "{\"k\":1}");
    }
}
