//! Agreement matrix rendering.
//!
//! Both renderers lay the roster out as an upper-triangular matrix: row `i`
//! holds the rates of justice `i` against every justice after it in roster
//! order, so each unordered pair appears exactly once.

use std::fmt::Write;

use scoca_core::{AgreementRate, RateTable, Roster};

/// Rates above this are highlighted as strong agreement.
const HIGH: f64 = 90.0;
/// Rates below this are highlighted as strong disagreement.
const LOW: f64 = 10.0;

const CELL_WIDTH: usize = 6;

const CSS: &str = "
#agreeTable { border: none; border-collapse: collapse; }
#agreeTable th, #agreeTable td { width: 6em; height: 3em; text-align: center; vertical-align: middle; }
#agreeTable th { border: none; color: #222; }
#agreeTable td { border: solid 2px black; padding: 0; }
.low { background-color: #ff9d9d; }
.high { background-color: #b1efb1; }
#legendTable { border: none; border-collapse: collapse; }
#legendTable td { border: solid 1px #000; padding: 0.25em 0.5em; }
";

fn cell(rate: Option<AgreementRate>) -> Option<f64> {
    rate.and_then(|r| r.percent())
}

fn class_for(pct: f64) -> Option<&'static str> {
    if pct > HIGH {
        Some("high")
    } else if pct < LOW {
        Some("low")
    } else {
        None
    }
}

// ── Text ──

/// Plain-text matrix followed by a shorthand legend.
pub fn render_text(roster: &Roster, rates: &RateTable) -> String {
    let justices = roster.justices();
    let label_width = justices
        .iter()
        .map(|j| j.shorthand.len())
        .max()
        .unwrap_or(0)
        .max(2);
    let mut out = String::new();

    // Header: every justice but the first.
    let _ = write!(out, "{:label_width$}", "");
    for j in justices.iter().skip(1) {
        let _ = write!(out, " {:>CELL_WIDTH$}", j.shorthand);
    }
    out.push('\n');

    for (i, left) in justices.iter().enumerate().take(justices.len().saturating_sub(1)) {
        let _ = write!(out, "{:<label_width$}", left.shorthand);
        for _ in 1..=i {
            let _ = write!(out, " {:>CELL_WIDTH$}", "");
        }
        for top in &justices[i + 1..] {
            let text = match cell(rates.get(&left.shorthand, &top.shorthand)) {
                Some(pct) => format!("{}%", pct.round() as i64),
                None => "--".to_string(),
            };
            let _ = write!(out, " {text:>CELL_WIDTH$}");
        }
        out.push('\n');
    }

    out.push('\n');
    for j in justices {
        let _ = writeln!(out, "{:<label_width$}  {}", j.shorthand, j.full_name);
    }
    out
}

// ── HTML ──

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Standalone HTML page with the matrix table and a legend table.
pub fn render_html(roster: &Roster, rates: &RateTable) -> String {
    let justices = roster.justices();
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Justice agreement</title>\n");
    let _ = writeln!(out, "<style>{CSS}</style>");
    out.push_str("</head>\n<body>\n");

    out.push_str("<table id=\"agreeTable\">\n<tr><th></th>");
    for j in justices.iter().skip(1) {
        let _ = write!(out, "<th>{}</th>", escape(&j.shorthand));
    }
    out.push_str("</tr>\n");

    for (i, left) in justices.iter().enumerate() {
        out.push_str("<tr>");
        if i > 0 {
            let _ = write!(out, "<th colspan=\"{i}\"></th>");
        }
        let _ = write!(out, "<th>{}</th>", escape(&left.shorthand));
        for top in &justices[i + 1..] {
            match cell(rates.get(&left.shorthand, &top.shorthand)) {
                Some(pct) => {
                    let rounded = pct.round() as i64;
                    match class_for(rounded as f64) {
                        Some(class) => {
                            let _ = write!(out, "<td class=\"{class}\">{rounded}%</td>");
                        }
                        None => {
                            let _ = write!(out, "<td>{rounded}%</td>");
                        }
                    }
                }
                None => out.push_str("<td>n/a</td>"),
            }
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</table>\n");

    out.push_str("<table id=\"legendTable\">\n");
    for j in justices {
        let _ = writeln!(
            out,
            "<tr><td>{}</td><td>{}</td></tr>",
            escape(&j.shorthand),
            escape(&j.full_name)
        );
    }
    out.push_str("</table>\n</body>\n</html>\n");
    out
}
