//! YAML front matter: extraction, render configuration and display.

use maud::{Markup, html};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::Result;

/// How front matter is shown above the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaMode {
    None,
    Table,
    #[default]
    Details,
}

/// Render settings taken from front matter.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub meta: MetaMode,
    /// Icon name shown in the summary of the details block
    pub details_icon: String,
    /// Insert a table of contents before the content
    pub include_toc: bool,
    /// Language of the content, emitted as a `lang` wrapper
    pub lang: Option<String>,
    /// Decoded front matter, shown according to `meta`
    pub yaml: Option<Mapping>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            meta: MetaMode::default(),
            details_icon: "table".to_string(),
            include_toc: false,
            lang: None,
            yaml: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FlatKeys {
    include_toc: Option<bool>,
    lang: Option<String>,
    gitkyl: Option<GitkylKey>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GitkylKey {
    Mode(MetaMode),
    Nested(NestedKeys),
}

#[derive(Debug, Default, Deserialize)]
struct NestedKeys {
    meta: Option<MetaMode>,
    details_icon: Option<String>,
    include_toc: Option<bool>,
    lang: Option<String>,
}

/// A document split into its front matter and body.
#[derive(Debug)]
pub struct Split<'s> {
    pub yaml: Option<&'s str>,
    pub body: &'s str,
    /// Byte offset of `body` in the original source
    pub offset: usize,
}

/// Splits a leading `---` delimited block off `source`.
pub fn split(source: &str) -> Split<'_> {
    let none = Split {
        yaml: None,
        body: source,
        offset: 0,
    };
    let Some(first_end) = source.find('\n') else {
        return none;
    };
    if source[..first_end].trim_end() != "---" {
        return none;
    }

    let mut pos = first_end + 1;
    while pos <= source.len() {
        let line_end = source[pos..].find('\n').map_or(source.len(), |i| pos + i);
        let line = source[pos..line_end].trim_end();
        if line == "---" || line == "..." {
            let body_start = (line_end + 1).min(source.len());
            return Split {
                yaml: Some(&source[first_end + 1..pos]),
                body: &source[body_start..],
                offset: body_start,
            };
        }
        if line_end == source.len() {
            break;
        }
        pos = line_end + 1;
    }
    none
}

/// Decodes front matter into render settings.
///
/// Returns `Ok(None)` when the block is valid YAML but not a mapping, in
/// which case it is ordinary document content.
///
/// # Errors
///
/// Returns error if the block is not valid YAML or a known key has the
/// wrong type.
pub fn parse(yaml: &str) -> Result<Option<RenderConfig>> {
    let value: Value = serde_yaml::from_str(yaml)?;
    let Value::Mapping(mapping) = value else {
        return Ok(None);
    };

    let flat: FlatKeys = serde_yaml::from_value(Value::Mapping(mapping.clone()))?;
    let mut config = RenderConfig {
        include_toc: flat.include_toc.unwrap_or(false),
        lang: flat.lang,
        ..RenderConfig::default()
    };

    match flat.gitkyl {
        Some(GitkylKey::Mode(mode)) => config.meta = mode,
        Some(GitkylKey::Nested(nested)) => {
            if let Some(meta) = nested.meta {
                config.meta = meta;
            }
            match nested.details_icon {
                Some(icon) if is_icon_name(&icon) => config.details_icon = icon,
                Some(icon) => tracing::warn!(icon = %icon, "Ignoring invalid details icon"),
                None => {}
            }
            if let Some(include_toc) = nested.include_toc {
                config.include_toc = include_toc;
            }
            if nested.lang.is_some() {
                config.lang = nested.lang;
            }
        }
        None => {}
    }

    config.yaml = Some(mapping);
    Ok(Some(config))
}

/// Icon names are a single lowercase octicon slug.
fn is_icon_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Renders the front matter display block, if any.
pub fn render_meta(config: &RenderConfig) -> Option<Markup> {
    let yaml = config.yaml.as_ref().filter(|m| !m.is_empty())?;
    match config.meta {
        MetaMode::None => None,
        MetaMode::Table => Some(mapping_table(yaml)),
        MetaMode::Details => Some(html! {
            details class="frontmatter-content" {
                summary {
                    span class={ "octicon octicon-" (config.details_icon) } {}
                    "Frontmatter"
                }
                (mapping_table(yaml))
            }
        }),
    }
}

fn mapping_table(mapping: &Mapping) -> Markup {
    html! {
        table class="frontmatter-table" {
            thead {
                tr {
                    @for key in mapping.keys() {
                        th { (scalar(key)) }
                    }
                }
            }
            tbody {
                tr {
                    @for value in mapping.values() {
                        td { (value_cell(value)) }
                    }
                }
            }
        }
    }
}

fn value_cell(value: &Value) -> Markup {
    match value {
        Value::Mapping(mapping) => mapping_table(mapping),
        Value::Sequence(items) => html! {
            table {
                tbody {
                    tr {
                        @for item in items {
                            td { (value_cell(item)) }
                        }
                    }
                }
            }
        },
        Value::Tagged(tagged) => value_cell(&tagged.value),
        other => html! { (scalar(other)) },
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
