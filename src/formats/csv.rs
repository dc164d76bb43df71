//! Delimiter separated tables.

use maud::{Markup, html};
use std::io::{Read, Write};

use crate::context::RenderContext;
use crate::dom::escape_html;
use crate::error::Result;
use crate::registry::Renderer;
use crate::sanitizer::SanitizerRule;

const DELIMITERS: [char; 5] = [',', ';', '\t', '|', '@'];

/// Lines sampled when guessing the delimiter.
const SAMPLE_LINES: usize = 10;

/// Renders CSV and TSV files as a numbered table.
///
/// Files larger than the configured limit are shown as plain text instead.
#[derive(Debug, Default)]
pub struct CsvRenderer;

impl Renderer for CsvRenderer {
    fn name(&self) -> &str {
        "csv"
    }

    fn extensions(&self) -> Vec<String> {
        vec![".csv".to_string(), ".tsv".to_string()]
    }

    fn sanitizer_rules(&self) -> Vec<SanitizerRule> {
        vec![
            SanitizerRule::matching("table", "class", r"^data-table$"),
            SanitizerRule::matching("th", "class", r"^line-num$"),
            SanitizerRule::matching("td", "class", r"^line-num$"),
        ]
    }

    fn render(&self, ctx: &mut RenderContext<'_>, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
        let limits = ctx.markup().settings().csv.clone();

        let mut bytes = Vec::new();
        Read::take(&mut *input, limits.max_file_size as u64 + 1).read_to_end(&mut bytes)?;
        if bytes.len() > limits.max_file_size {
            // too large for a table, show what was read plus the rest as text
            input.read_to_end(&mut bytes)?;
            let text = String::from_utf8_lossy(&bytes);
            write!(output, "<pre>{}</pre>", escape_html(&text))?;
            return Ok(());
        }

        let text = String::from_utf8_lossy(&bytes);
        let is_tsv = ctx.options.relative_path.to_lowercase().ends_with(".tsv");
        let delimiter = if is_tsv { '\t' } else { guess_delimiter(&text) };

        let mut rows = parse(&text, delimiter);
        if limits.max_rows > 0 && rows.len() > limits.max_rows {
            tracing::debug!(rows = rows.len(), max = limits.max_rows, "Truncating table");
            rows.truncate(limits.max_rows);
        }
        output.write_all(table(&rows).into_string().as_bytes())?;
        Ok(())
    }
}

fn table(rows: &[Vec<String>]) -> Markup {
    html! {
        table class="data-table" {
            @for (i, row) in rows.iter().enumerate() {
                @if i == 0 {
                    tr {
                        th class="line-num" { (i + 1) }
                        @for cell in row {
                            th { (cell) }
                        }
                    }
                } @else {
                    tr {
                        td class="line-num" { (i + 1) }
                        @for cell in row {
                            td { (cell) }
                        }
                    }
                }
            }
        }
    }
}

/// Picks the candidate delimiter occurring most consistently in the first
/// lines, falling back to a comma.
fn guess_delimiter(text: &str) -> char {
    let sample: String = text
        .lines()
        .take(SAMPLE_LINES)
        .collect::<Vec<_>>()
        .join("\n");

    let mut best = (',', 0usize);
    for delimiter in DELIMITERS {
        let rows = parse(&sample, delimiter);
        let Some(width) = rows.first().map(Vec::len) else {
            continue;
        };
        if width < 2 || !rows.iter().all(|r| r.len() == width) {
            continue;
        }
        if width > best.1 {
            best = (delimiter, width);
        }
    }
    best.0
}

/// Splits `text` into records, honoring double-quoted fields with `""`
/// escapes and embedded newlines. Blank lines are skipped.
fn parse(text: &str, delimiter: char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut touched = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if quoted {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => quoted = false,
                c => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => {
                quoted = true;
                touched = true;
            }
            c if c == delimiter => {
                row.push(std::mem::take(&mut field));
                touched = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                if touched || !field.is_empty() {
                    row.push(std::mem::take(&mut field));
                    rows.push(std::mem::take(&mut row));
                }
                touched = false;
            }
            c => {
                field.push(c);
                touched = true;
            }
        }
    }
    if touched || !field.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CsvSettings, MarkupSettings};
    use crate::render::Markup;

    fn render(markup: &Markup, path: &str, input: &str) -> String {
        let mut ctx = RenderContext::simple(markup);
        ctx.options.relative_path = path.to_string();
        let mut output = Vec::new();
        CsvRenderer
            .render(&mut ctx, &mut input.as_bytes(), &mut output)
            .expect("Should render");
        String::from_utf8(output).expect("Should be UTF-8")
    }

    #[test]
    fn test_parse_quoted_fields() {
        assert_eq!(
            parse("a,\"b,c\",\"say \"\"hi\"\"\"\n\n1,\"two\nlines\",3\n", ','),
            vec![
                vec!["a".to_string(), "b,c".to_string(), "say \"hi\"".to_string()],
                vec!["1".to_string(), "two\nlines".to_string(), "3".to_string()],
            ]
        );
    }

    #[test]
    fn test_guess_delimiter() {
        assert_eq!(guess_delimiter("a;b;c\n1;2;3\n"), ';');
        assert_eq!(guess_delimiter("a|b\n1|2\n"), '|');
        assert_eq!(guess_delimiter("just text\n"), ',');
    }

    #[test]
    fn test_render_table() {
        // Arrange
        let markup = Markup::new(MarkupSettings::default()).expect("Should build markup");

        // Act
        let html = render(&markup, "data.csv", "name,qty\n<b>,2\n");

        // Assert
        assert_eq!(
            html,
            concat!(
                r#"<table class="data-table">"#,
                r#"<tr><th class="line-num">1</th><th>name</th><th>qty</th></tr>"#,
                r#"<tr><td class="line-num">2</td><td>&lt;b&gt;</td><td>2</td></tr>"#,
                "</table>"
            )
        );
    }

    #[test]
    fn test_tsv_uses_tabs() {
        // Arrange
        let markup = Markup::new(MarkupSettings::default()).expect("Should build markup");

        // Act
        let html = render(&markup, "data.TSV", "a,b\tc\n");

        // Assert
        assert!(html.contains("<th>a,b</th><th>c</th>"), "Got: {}", html);
    }

    #[test]
    fn test_row_limit() {
        // Arrange
        let settings = MarkupSettings {
            csv: CsvSettings {
                max_rows: 2,
                ..CsvSettings::default()
            },
            ..MarkupSettings::default()
        };
        let markup = Markup::new(settings).expect("Should build markup");

        // Act
        let html = render(&markup, "data.csv", "a,b\n1,2\n3,4\n");

        // Assert
        assert_eq!(html.matches("<tr>").count(), 2);
    }

    #[test]
    fn test_oversized_file_falls_back_to_text() {
        // Arrange
        let settings = MarkupSettings {
            csv: CsvSettings {
                max_file_size: 8,
                ..CsvSettings::default()
            },
            ..MarkupSettings::default()
        };
        let markup = Markup::new(settings).expect("Should build markup");

        // Act
        let html = render(&markup, "data.csv", "a,b\n<1>,2\n3,4\n");

        // Assert
        assert_eq!(html, "<pre>a,b\n&lt;1&gt;,2\n3,4\n</pre>");
    }
}
