//! Terminal output with ANSI color sequences.

use std::io::{Read, Write};

use crate::context::RenderContext;
use crate::dom::escape_into;
use crate::error::Result;
use crate::filetype::SniffedType;
use crate::registry::{Capabilities, Renderer};
use crate::sanitizer::SanitizerRule;

const ESC: char = '\x1b';

/// Converts SGR color sequences to `term-*` classed spans.
///
/// Other control sequences are dropped.
#[derive(Debug, Default)]
pub struct ConsoleRenderer;

impl Renderer for ConsoleRenderer {
    fn name(&self) -> &str {
        "console"
    }

    fn extensions(&self) -> Vec<String> {
        vec![".sh-session".to_string()]
    }

    fn sanitizer_rules(&self) -> Vec<SanitizerRule> {
        vec![
            SanitizerRule::matching("pre", "class", r"^console$"),
            SanitizerRule::matching("span", "class", r"^term-[\w-]+( term-[\w-]+)*$"),
        ]
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            detector: true,
            ..Capabilities::default()
        }
    }

    /// Accepts text with at least two color sequences, no NUL byte and at
    /// most one invalid UTF-8 sequence, cut off at the end of `prefetch`.
    fn can_render(&self, _file_name: &str, sniffed: SniffedType, prefetch: &[u8]) -> bool {
        if !sniffed.is_text() {
            return false;
        }

        let text = String::from_utf8_lossy(prefetch);
        let chars: Vec<char> = text.chars().collect();
        let is_sep = |p: usize| chars.get(p).is_some_and(|c| *c == ';' || *c == 'm');

        let mut sequences = 0;
        let mut first_invalid = None;
        for (i, &c) in chars.iter().enumerate() {
            if c == '\0' {
                return false;
            }
            if c == ESC && chars.get(i + 1) == Some(&'[') && (2..=5).any(|off| is_sep(i + off)) {
                sequences += 1;
            }
            if c == char::REPLACEMENT_CHARACTER && first_invalid.is_none() {
                first_invalid = Some(i);
            }
        }

        if first_invalid.is_some_and(|pos| pos + 1 != chars.len()) {
            return false;
        }
        sequences >= 2
    }

    fn render(&self, _ctx: &mut RenderContext<'_>, input: &mut dyn Read, output: &mut dyn Write) -> Result<()> {
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        let html = render_ansi(&String::from_utf8_lossy(&bytes));
        output.write_all(html.as_bytes())?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct Style {
    fg: Option<String>,
    bg: Option<String>,
    bold: bool,
    italic: bool,
    underline: bool,
}

impl Style {
    fn classes(&self) -> Vec<String> {
        let mut classes = Vec::new();
        if self.bold {
            classes.push("term-fg1".to_string());
        }
        if self.italic {
            classes.push("term-fg3".to_string());
        }
        if self.underline {
            classes.push("term-fg4".to_string());
        }
        classes.extend(self.fg.iter().map(|c| format!("term-{}", c)));
        classes.extend(self.bg.iter().map(|c| format!("term-{}", c)));
        classes
    }

    fn apply(&mut self, params: &[u32]) {
        if params.is_empty() {
            *self = Self::default();
            return;
        }
        let mut i = 0;
        while i < params.len() {
            match params[i] {
                0 => *self = Self::default(),
                1 => self.bold = true,
                3 => self.italic = true,
                4 => self.underline = true,
                22 => self.bold = false,
                23 => self.italic = false,
                24 => self.underline = false,
                n @ (30..=37 | 90..=97) => self.fg = Some(format!("fg{}", n)),
                n @ (40..=47 | 100..=107) => self.bg = Some(format!("bg{}", n)),
                39 => self.fg = None,
                49 => self.bg = None,
                38 | 48 if params.get(i + 1) == Some(&5) => {
                    if let Some(index) = params.get(i + 2) {
                        let class = format!("{}x{}", if params[i] == 38 { "fg" } else { "bg" }, index);
                        if params[i] == 38 {
                            self.fg = Some(class);
                        } else {
                            self.bg = Some(class);
                        }
                    }
                    i += 2;
                }
                38 | 48 if params.get(i + 1) == Some(&2) => {
                    // truecolor has no class equivalent
                    i += 4;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// Renders terminal output as `<pre class="console">` with styled spans.
pub fn render_ansi(text: &str) -> String {
    let mut out = String::from(r#"<pre class="console">"#);
    let mut style = Style::default();
    let mut run = String::new();

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ESC if chars.peek() == Some(&'[') => {
                chars.next();
                let mut params = String::new();
                let mut terminator = None;
                for c in chars.by_ref() {
                    if c.is_ascii_digit() || c == ';' {
                        params.push(c);
                    } else {
                        terminator = Some(c);
                        break;
                    }
                }
                if terminator != Some('m') {
                    continue;
                }

                let values: Vec<u32> = params
                    .split(';')
                    .filter(|p| !p.is_empty())
                    .map(|p| p.parse().unwrap_or(0))
                    .collect();
                let mut next = style.clone();
                next.apply(&values);
                if next != style {
                    flush(&mut out, &mut run, &style);
                    style = next;
                }
            }
            ESC => {}
            '\r' if chars.peek() == Some(&'\n') => {}
            c => run.push(c),
        }
    }
    flush(&mut out, &mut run, &style);
    out.push_str("</pre>");
    out
}

/// Writes the pending text run in `style`.
fn flush(out: &mut String, run: &mut String, style: &Style) {
    if run.is_empty() {
        return;
    }
    let classes = style.classes();
    if classes.is_empty() {
        escape_into(out, run, false);
    } else {
        out.push_str("<span class=\"");
        out.push_str(&classes.join(" "));
        out.push_str("\">");
        escape_into(out, run, false);
        out.push_str("</span>");
    }
    run.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_colored_output() {
        // Arrange
        let renderer = ConsoleRenderer;
        let colored = b"\x1b[31mred\x1b[0m and \x1b[1;32mgreen\x1b[0m";

        // Act & Assert
        assert!(renderer.can_render("build.log", SniffedType::Text, colored));
        assert!(!renderer.can_render("build.log", SniffedType::Text, b"\x1b[31monly one"));
        assert!(!renderer.can_render("build.log", SniffedType::Binary, colored));
    }

    #[test]
    fn test_truncated_utf8_only_at_end() {
        // Arrange
        let renderer = ConsoleRenderer;
        let mut truncated = b"\x1b[31ma\x1b[0m \xe2\x82".to_vec();
        let mut middle = b"\x1b[31ma\xff\x1b[0m b".to_vec();

        // Act & Assert
        assert!(renderer.can_render("log", SniffedType::Text, &truncated));
        truncated.push(b'x');
        assert!(!renderer.can_render("log", SniffedType::Text, &truncated));
        middle.push(b'c');
        assert!(!renderer.can_render("log", SniffedType::Text, &middle));
    }

    #[test]
    fn test_nul_rejected() {
        assert!(!ConsoleRenderer.can_render("log", SniffedType::Text, b"\x1b[31ma\x1b[0m\0"));
    }

    #[test]
    fn test_render_colors() {
        assert_eq!(
            render_ansi("ok \x1b[1;31mfail <x>\x1b[0m done"),
            r#"<pre class="console">ok <span class="term-fg1 term-fg31">fail &lt;x&gt;</span> done</pre>"#
        );
    }

    #[test]
    fn test_render_256_colors_and_background() {
        assert_eq!(
            render_ansi("\x1b[38;5;208;44mx\x1b[39my"),
            r#"<pre class="console"><span class="term-fgx208 term-bg44">x</span><span class="term-bg44">y</span></pre>"#
        );
    }

    #[test]
    fn test_other_sequences_dropped() {
        assert_eq!(render_ansi("a\x1b[2Kb\r\n"), "<pre class=\"console\">ab\n</pre>");
    }
}
