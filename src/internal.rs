//! Secure attribute protection for a single render.
//!
//! Attributes synthesized by the pipeline are emitted as
//! `data-attr-<name>="<secure id>:<value>"` so they survive sanitizing
//! without being allow-listed for user content. [`RenderInternal::finalize`]
//! turns attributes carrying this render's exact prefix back into
//! `<name>="<value>"`; anything else stays an inert `data-attr-*`.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::dom::{Attribute, Document, NodeData};

const SECURE_ID_BYTES: usize = 12;

/// Prefix of attributes holding a protected value.
pub const SAFE_ATTR_PREFIX: &str = "data-attr-";

static CLASS_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(<[^>]+)\s+class="([^"]+)"([^>]*>)"#).expect("class attribute pattern is valid")
});

/// Per-render state. Never shared between documents.
#[derive(Debug, Default)]
pub struct RenderInternal {
    secure_id_prefix: Option<String>,
}

impl RenderInternal {
    /// Generates a fresh secure id.
    ///
    /// Only the top-level document entry point calls this; nested renders
    /// reuse the id of the document they are part of.
    pub fn init(&mut self) {
        let mut bytes = [0u8; SECURE_ID_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        self.secure_id_prefix = Some(format!("{}:", URL_SAFE_NO_PAD.encode(bytes)));
    }

    pub fn is_initialized(&self) -> bool {
        self.secure_id_prefix.is_some()
    }

    /// Attribute name to emit for a trusted attribute `name`.
    pub fn safe_attr(&self, name: &str) -> String {
        if self.is_initialized() {
            format!("{}{}", SAFE_ATTR_PREFIX, name)
        } else {
            name.to_string()
        }
    }

    /// Attribute value to emit for a trusted attribute value.
    pub fn safe_value(&self, value: &str) -> String {
        match &self.secure_id_prefix {
            Some(prefix) => format!("{}{}", prefix, value),
            None => value.to_string(),
        }
    }

    /// Rewrites `class` attributes of a raw HTML string into protected form.
    pub fn protect_safe_attrs(&self, html: &str) -> String {
        if !self.is_initialized() {
            return html.to_string();
        }
        CLASS_ATTR
            .replace_all(html, |caps: &Captures<'_>| {
                format!(
                    r#"{} {}="{}"{}"#,
                    &caps[1],
                    self.safe_attr("class"),
                    self.safe_value(&caps[2]),
                    &caps[3]
                )
            })
            .into_owned()
    }

    /// Restores protected attributes in `doc` in place.
    pub fn recover(&self, doc: &mut Document) {
        let Some(prefix) = &self.secure_id_prefix else {
            return;
        };

        for id in doc.descendants(doc.root()) {
            let NodeData::Element { attrs, .. } = doc.data_mut(id) else {
                continue;
            };

            let recovered: Vec<Option<Attribute>> = attrs
                .iter()
                .map(|attr| {
                    let name = attr.name.strip_prefix(SAFE_ATTR_PREFIX)?;
                    let value = attr.value.strip_prefix(prefix.as_str())?;
                    Some(Attribute::new(name, value))
                })
                .collect();
            if recovered.iter().all(Option::is_none) {
                continue;
            }

            let mut result: Vec<Attribute> = Vec::with_capacity(attrs.len());
            for (attr, trusted) in attrs.drain(..).zip(recovered.iter()) {
                match trusted {
                    Some(trusted) => {
                        result.retain(|a| a.name != trusted.name);
                        result.push(trusted.clone());
                    }
                    None if recovered
                        .iter()
                        .flatten()
                        .any(|trusted| trusted.name == attr.name) => {}
                    None => result.push(attr),
                }
            }
            *attrs = result;
        }
    }

    /// Reparses `html` and restores protected attributes.
    pub fn finalize(&self, html: &str) -> String {
        if !self.is_initialized() {
            return html.to_string();
        }
        let mut doc = Document::parse_fragment(html);
        self.recover(&mut doc);
        doc.to_html()
    }
}
