//! Math delimiters, rewritten to HTML before Markdown parsing.
//!
//! Inline math becomes `<code class="language-math">` with its content
//! entity-encoded so the Markdown parser keeps it verbatim. Block math on
//! its own lines becomes a single-line `<pre>` HTML block. Fenced code,
//! indented code and code spans are left alone. The rewrite keeps a map from output to input
//! offsets so source positions can be reported against the original text.

use crate::config::MathDelimiters;
use crate::dom::escape_html;
use crate::internal::RenderInternal;

/// Rewritten source and its offset map.
#[derive(Debug)]
pub struct MathSource {
    pub text: String,
    /// `(output offset, input offset)` at the start of every segment
    map: Vec<(usize, usize)>,
}

impl MathSource {
    /// Input offset corresponding to output offset `out`.
    ///
    /// Offsets inside a rewritten span map to the start of that span.
    pub fn original_offset(&self, out: usize) -> usize {
        let idx = self.map.partition_point(|(o, _)| *o <= out);
        match idx.checked_sub(1).map(|i| self.map[i]) {
            Some((o, i)) => i + (out - o),
            None => out,
        }
    }
}

struct Writer<'i> {
    out: String,
    map: Vec<(usize, usize)>,
    internal: &'i RenderInternal,
}

impl Writer<'_> {
    /// Copies input text starting at input offset `at`.
    fn copy(&mut self, text: &str, at: usize) {
        self.map.push((self.out.len(), at));
        self.out.push_str(text);
    }

    /// Emits generated HTML standing for input starting at `at`.
    fn emit(&mut self, html: &str, at: usize) {
        self.map.push((self.out.len(), at));
        self.out.push_str(&self.internal.protect_safe_attrs(html));
    }
}

/// Rewrites enabled math delimiters in `source`.
pub fn preprocess(source: &str, delims: MathDelimiters, internal: &RenderInternal) -> MathSource {
    let mut w = Writer {
        out: String::with_capacity(source.len()),
        map: vec![(0, 0)],
        internal,
    };

    let lines = line_spans(source);
    let mut fence: Option<(char, usize)> = None;
    // an indented line opens a code block only after a blank line, and
    // never inside a list item
    let mut after_blank = true;
    let mut indented_code = false;
    let mut in_list = false;
    let mut i = 0;
    while i < lines.len() {
        let (start, end) = lines[i];
        let line = &source[start..end];
        let content = line.trim_end_matches(['\n', '\r']);
        let trimmed = content.trim_start();
        let indent = &content[..content.len() - trimmed.len()];

        if let Some((ch, len)) = fence {
            if fence_marker(trimmed).is_some_and(|(c, l)| c == ch && l >= len && trimmed.trim_end().chars().all(|c| c == ch)) {
                fence = None;
                after_blank = true;
            }
            w.copy(line, start);
            i += 1;
            continue;
        }
        if trimmed.is_empty() {
            after_blank = true;
            w.copy(line, start);
            i += 1;
            continue;
        }
        let width = indent_width(indent);
        if width >= 4 && !in_list && (indented_code || after_blank) {
            indented_code = true;
            after_blank = false;
            w.copy(line, start);
            i += 1;
            continue;
        }
        indented_code = false;
        if width <= 3 {
            if is_list_item(trimmed) {
                in_list = true;
            } else if after_blank {
                in_list = false;
            }
        }
        after_blank = false;

        if width <= 3
            && let Some(marker) = fence_marker(trimmed)
        {
            fence = Some(marker);
            w.copy(line, start);
            i += 1;
            continue;
        }

        if let Some((body, consumed)) = block_math(source, &lines, i, delims) {
            let html = format!(
                r#"{}<pre class="code-block is-loading"><code class="language-math display">{}</code></pre>"#,
                indent,
                escape_html(body.trim_matches('\n')).replace('\n', "&#10;")
            );
            w.emit(&html, start);
            w.copy("\n", lines[i + consumed - 1].1);
            after_blank = true;
            i += consumed;
            continue;
        }

        inline_math(&mut w, line, start, delims);
        i += 1;
    }

    MathSource {
        text: w.out,
        map: w.map,
    }
}

fn line_spans(source: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (idx, _) in source.match_indices('\n') {
        spans.push((start, idx + 1));
        start = idx + 1;
    }
    if start < source.len() {
        spans.push((start, source.len()));
    }
    spans
}

/// Indentation in columns, with tabs advancing to the next multiple of 4.
fn indent_width(indent: &str) -> usize {
    indent
        .chars()
        .fold(0, |col, c| if c == '\t' { col + 4 - col % 4 } else { col + 1 })
}

/// Whether `line` (without indentation) starts a bullet or ordered list item.
fn is_list_item(line: &str) -> bool {
    let marker_end = match line.chars().next() {
        Some('-' | '*' | '+') => 1,
        Some(c) if c.is_ascii_digit() => {
            let digits = line.bytes().take_while(u8::is_ascii_digit).count();
            match line.as_bytes().get(digits) {
                Some(b'.' | b')') if digits <= 9 => digits + 1,
                _ => return false,
            }
        }
        _ => return false,
    };
    line[marker_end..].chars().next().is_none_or(|c| c == ' ' || c == '\t')
}

fn fence_marker(line: &str) -> Option<(char, usize)> {
    let ch = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = line.chars().take_while(|c| *c == ch).count();
    (len >= 3).then_some((ch, len))
}

/// Detects block math starting at line `i`; returns its body and the
/// number of lines consumed.
fn block_math<'s>(
    source: &'s str,
    lines: &[(usize, usize)],
    i: usize,
    delims: MathDelimiters,
) -> Option<(&'s str, usize)> {
    let line_text = |n: usize| source[lines[n].0..lines[n].1].trim();
    let first = line_text(i);

    let close = match first {
        "$$" if delims.block_dollar => "$$",
        r"\[" if delims.block_square_brackets => r"\]",
        _ => {
            // single line `$$ ... $$`
            if delims.block_dollar && first.len() > 4 && first.starts_with("$$") && first.ends_with("$$") {
                let inner = &first[2..first.len() - 2];
                if !inner.contains("$$") {
                    return Some((inner.trim(), 1));
                }
            }
            return None;
        }
    };

    let body_start = lines[i].1;
    for n in i + 1..lines.len() {
        if line_text(n) == close {
            return Some((&source[body_start..lines[n].0], n - i + 1));
        }
    }
    None
}

fn inline_math(w: &mut Writer<'_>, line: &str, line_start: usize, delims: MathDelimiters) {
    let bytes = line.as_bytes();
    let mut copied = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        match bytes[pos] {
            b'`' => {
                // code spans are skipped whole
                let run = bytes[pos..].iter().take_while(|b| **b == b'`').count();
                let ticks = &line[pos..pos + run];
                pos = match line[pos + run..].find(ticks) {
                    Some(close) => pos + run + close + run,
                    None => pos + run,
                };
            }
            b'\\' if delims.inline_parentheses && line[pos..].starts_with(r"\(") => {
                match line[pos + 2..].find(r"\)") {
                    Some(close) if close > 0 => {
                        let end = pos + 2 + close;
                        w.copy(&line[copied..pos], line_start + copied);
                        w.emit(&inline_html(&line[pos + 2..end]), line_start + pos);
                        pos = end + 2;
                        copied = pos;
                    }
                    _ => pos += 2,
                }
            }
            b'\\' => pos += 2,
            b'$' if delims.inline_dollar => match inline_dollar_end(line, pos) {
                Some(end) => {
                    w.copy(&line[copied..pos], line_start + copied);
                    w.emit(&inline_html(&line[pos + 1..end]), line_start + pos);
                    pos = end + 1;
                    copied = pos;
                }
                None => pos += bytes[pos..].iter().take_while(|b| **b == b'$').count(),
            },
            _ => pos += 1,
        }
    }
    if copied < line.len() {
        w.copy(&line[copied..], line_start + copied);
    }
}

/// Offset of the `$` closing the inline math opened at `open`.
///
/// The opener must not be followed by whitespace or another `$`; the closer
/// must not be preceded by whitespace or followed by a digit.
fn inline_dollar_end(line: &str, open: usize) -> Option<usize> {
    let rest = &line[open + 1..];
    let first = rest.chars().next()?;
    if first.is_whitespace() || first == '$' {
        return None;
    }

    let bytes = line.as_bytes();
    let mut pos = open + 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'$' => {
                let prev = line[..pos].chars().next_back();
                let next = line[pos + 1..].chars().next();
                if prev.is_some_and(|c| !c.is_whitespace()) && !next.is_some_and(|c| c.is_ascii_digit() || c == '$') {
                    return Some(pos);
                }
                return None;
            }
            _ => pos += 1,
        }
    }
    None
}

fn inline_html(math: &str) -> String {
    let mut encoded = String::with_capacity(math.len() * 2);
    for c in math.chars() {
        if c.is_ascii_punctuation() {
            encoded.push_str(&format!("&#{};", c as u32));
        } else {
            encoded.push(c);
        }
    }
    format!(r#"<code class="language-math">{}</code>"#, encoded)
}
