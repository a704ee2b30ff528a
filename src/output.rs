use crate::cli::OutputFormat;
use crate::search::{FileMatch, LineMatch, SearchComplete};
use colored::*;
use serde_json::json;

/// Renders streamed results for the terminal or as JSON lines.
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_match(&self, m: &FileMatch) -> String {
        match self.format {
            OutputFormat::Text => self.format_text(m),
            OutputFormat::Json => serde_json::to_string(m).unwrap_or_default(),
        }
    }

    fn format_text(&self, m: &FileMatch) -> String {
        let header = m.path.display().to_string();
        let Some(lines) = &m.line_matches else {
            return header;
        };
        let mut out = vec![header.green().bold().to_string()];
        for line in lines {
            out.push(format!(
                "  {} │ {}",
                line.line_number.to_string().yellow(),
                highlight(line)
            ));
        }
        out.join("\n")
    }

    pub fn format_summary(&self, complete: &SearchComplete) -> String {
        let stats = &complete.stats;
        match self.format {
            OutputFormat::Json => json!({
                "summary": {
                    "limitHit": complete.limit_hit,
                    "stats": stats,
                }
            })
            .to_string(),
            OutputFormat::Text => {
                let mut line = format!(
                    "{} {} file(s) matched, {} walked, {} skipped in {:.2?}",
                    "Done:".green().bold(),
                    stats.files_matched,
                    stats.files_walked,
                    stats.files_skipped,
                    stats.elapsed
                );
                if complete.limit_hit {
                    line.push_str(&format!(" {}", "(result limit hit)".yellow()));
                }
                if stats.from_cache {
                    line.push_str(&format!(" {}", "(cached)".dimmed()));
                }
                line
            }
        }
    }
}

/// Preview text with every match range emphasised.
fn highlight(line: &LineMatch) -> String {
    let chars: Vec<char> = line.preview.chars().collect();
    let mut out = String::new();
    let mut pos = 0;
    for &(start, end) in &line.match_ranges {
        let start = start.min(chars.len()).max(pos);
        let end = end.min(chars.len()).max(start);
        out.extend(&chars[pos..start]);
        let matched: String = chars[start..end].iter().collect();
        out.push_str(&matched.yellow().bold().to_string());
        pos = end;
    }
    out.extend(&chars[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn highlight_keeps_text_outside_ranges() {
        colored::control::set_override(false);
        let line = LineMatch {
            line_number: 3,
            preview: "a needle here".to_string(),
            match_ranges: vec![(2, 8)],
        };
        assert_eq!(highlight(&line), "a needle here");
    }

    #[test]
    fn json_omits_line_matches_for_file_results() {
        let f = OutputFormatter::new(OutputFormat::Json);
        let s = f.format_match(&FileMatch::file(PathBuf::from("a/b.rs")));
        assert_eq!(s, r#"{"path":"a/b.rs"}"#);
    }
}
