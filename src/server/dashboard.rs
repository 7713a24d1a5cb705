//! HTML summary served on `GET /`.

use crate::core::{format_counter, format_gauge, PulseError, Result};
use html_escape::encode_text;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;

/// Render the dashboard from copies of the two metric maps.
pub fn render_dashboard(
    gauges: &HashMap<String, f64>,
    counters: &HashMap<String, i64>,
) -> Result<String> {
    let gauges: BTreeMap<&str, String> = gauges
        .iter()
        .map(|(name, v)| (name.as_str(), format_gauge(*v)))
        .collect();
    let counters: BTreeMap<&str, String> = counters
        .iter()
        .map(|(name, v)| (name.as_str(), format_counter(*v)))
        .collect();

    let mut html = String::with_capacity(1024 + 64 * (gauges.len() + counters.len()));
    write_page(&mut html, &gauges, &counters)
        .map_err(|e| PulseError::render(format!("failed to render dashboard: {e}")))?;
    Ok(html)
}

fn write_page(
    out: &mut String,
    gauges: &BTreeMap<&str, String>,
    counters: &BTreeMap<&str, String>,
) -> std::fmt::Result {
    writeln!(out, "<!DOCTYPE html>")?;
    writeln!(out, "<html lang=\"en\">")?;
    writeln!(out, "<head>")?;
    writeln!(out, "<meta charset=\"utf-8\">")?;
    writeln!(out, "<title>pulse metrics</title>")?;
    writeln!(out, "<style>body{{font-family:sans-serif;margin:2em}}table{{border-collapse:collapse;margin-bottom:2em}}td,th{{border:1px solid #ccc;padding:4px 10px;text-align:left}}</style>")?;
    writeln!(out, "</head>")?;
    writeln!(out, "<body>")?;
    writeln!(out, "<h1>Metrics</h1>")?;
    write_table(out, "Gauges", gauges)?;
    write_table(out, "Counters", counters)?;
    writeln!(out, "</body>")?;
    writeln!(out, "</html>")
}

fn write_table(out: &mut String, title: &str, rows: &BTreeMap<&str, String>) -> std::fmt::Result {
    writeln!(out, "<h2>{title} ({})</h2>", rows.len())?;
    if rows.is_empty() {
        return writeln!(out, "<p>No {} reported yet.</p>", title.to_lowercase());
    }

    writeln!(out, "<table>")?;
    writeln!(out, "<tr><th>Name</th><th>Value</th></tr>")?;
    for (name, value) in rows {
        writeln!(
            out,
            "<tr><td>{}</td><td>{}</td></tr>",
            encode_text(name),
            encode_text(value)
        )?;
    }
    writeln!(out, "</table>")
}
