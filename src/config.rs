//! Command line and rendering configuration.

use anyhow::{Context, bail};
use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Command line configuration for gitkyl-markup.
#[derive(Debug, Clone, Parser)]
#[command(name = "gitkyl-markup", version, about, long_about = None)]
pub struct Config {
    /// Markup file to render
    pub input: PathBuf,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Markup type (detected from the file name when omitted)
    #[arg(short = 't', long = "type")]
    pub markup_type: Option<String>,

    /// Settings file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Repository path used for commit lookups
    #[arg(long)]
    pub repo: Option<PathBuf>,

    /// Repository link on the hosting site, e.g. /owner/name
    #[arg(long)]
    pub repo_link: Option<String>,

    /// Current ref sub path, e.g. branch/main
    #[arg(long, default_value = "branch/main")]
    pub ref_path: String,

    /// Render the file as a wiki page
    #[arg(long)]
    pub wiki: bool,

    /// Render the input as a short description instead of a document
    #[arg(long)]
    pub description: bool,

    /// Rewrite resolved links to absolute URLs
    #[arg(long)]
    pub absolute_links: bool,
}

impl Config {
    /// Parses configuration from command line arguments.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Validates configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the input or repository path does not exist, or if
    /// wiki rendering is requested without a repository link.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.input.exists() {
            bail!("Input file does not exist: {}", self.input.display());
        }

        if let Some(repo) = &self.repo
            && !repo.exists()
        {
            bail!("Repository path does not exist: {}", repo.display());
        }

        if self.wiki && self.repo_link.is_none() {
            bail!("Wiki rendering requires --repo-link");
        }

        Ok(())
    }

    /// Loads rendering settings from the configured file, or defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the settings file cannot be read or parsed.
    pub fn settings(&self) -> anyhow::Result<MarkupSettings> {
        match &self.config {
            Some(path) => MarkupSettings::load(path)
                .with_context(|| format!("Failed to load settings from {}", path.display())),
            None => Ok(MarkupSettings::default()),
        }
    }
}

/// Process-wide rendering settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarkupSettings {
    /// Public URL of the application, with trailing slash.
    pub app_url: String,
    /// Sub path the application is mounted under (empty or `/sub`).
    pub app_sub_url: String,
    /// Prefix for static assets such as custom emoji images.
    pub static_url_prefix: String,
    /// Emoji names rendered from images instead of unicode codepoints.
    pub custom_emojis: Vec<String>,
    pub camo: CamoSettings,
    pub markdown: MarkdownSettings,
    pub csv: CsvSettings,
    /// Renderers backed by external commands.
    pub external_renderers: Vec<ExternalRendererSettings>,
}

impl Default for MarkupSettings {
    fn default() -> Self {
        Self {
            app_url: "http://localhost:3000/".to_string(),
            app_sub_url: String::new(),
            static_url_prefix: "/assets".to_string(),
            custom_emojis: vec!["gitea".to_string(), "codeberg".to_string(), "git".to_string()],
            camo: CamoSettings::default(),
            markdown: MarkdownSettings::default(),
            csv: CsvSettings::default(),
            external_renderers: Vec::new(),
        }
    }
}

impl MarkupSettings {
    /// Parses settings from TOML text.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid settings TOML.
    pub fn from_toml(text: &str) -> Result<Self> {
        let mut settings: Self = toml::from_str(text)?;
        settings.normalize();
        Ok(settings)
    }

    /// Reads and parses a TOML settings file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&text)
    }

    fn normalize(&mut self) {
        if !self.app_url.ends_with('/') {
            self.app_url.push('/');
        }
        self.app_sub_url = self.app_sub_url.trim_end_matches('/').to_string();
        self.camo.server_url = self.camo.server_url.trim_end_matches('/').to_string();
    }
}

/// Image proxy configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CamoSettings {
    pub enabled: bool,
    pub server_url: String,
    pub hmac_key: String,
    /// Proxy HTTPS sources too, not only plain HTTP.
    pub always: bool,
}

/// Markdown defaults applied when a render does not override them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarkdownSettings {
    pub enable_hard_line_break_in_comments: bool,
    pub enable_hard_line_break_in_documents: bool,
    pub math: MathDelimiters,
}

impl Default for MarkdownSettings {
    fn default() -> Self {
        Self {
            enable_hard_line_break_in_comments: true,
            enable_hard_line_break_in_documents: false,
            math: MathDelimiters::default(),
        }
    }
}

/// Math delimiter toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MathDelimiters {
    /// `$...$`
    pub inline_dollar: bool,
    /// `\(...\)`
    pub inline_parentheses: bool,
    /// `$$` on its own lines
    pub block_dollar: bool,
    /// `\[` and `\]` on their own lines
    pub block_square_brackets: bool,
}

impl Default for MathDelimiters {
    fn default() -> Self {
        Self {
            inline_dollar: true,
            inline_parentheses: true,
            block_dollar: true,
            block_square_brackets: true,
        }
    }
}

impl MathDelimiters {
    /// All delimiters disabled.
    pub fn none() -> Self {
        Self {
            inline_dollar: false,
            inline_parentheses: false,
            block_dollar: false,
            block_square_brackets: false,
        }
    }
}

/// Limits for the CSV renderer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CsvSettings {
    /// Inputs larger than this are rendered as plain preformatted text.
    pub max_file_size: usize,
    /// Rows beyond this count are dropped.
    pub max_rows: usize,
}

impl Default for CsvSettings {
    fn default() -> Self {
        Self {
            max_file_size: 512 * 1024,
            max_rows: 2500,
        }
    }
}

/// How the output of an external renderer is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentMode {
    #[default]
    Sanitized,
    NoSanitizer,
    Iframe,
}

/// Definition of a renderer backed by an external command.
///
/// The command reads the document on stdin and writes HTML to stdout.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalRendererSettings {
    pub name: String,
    pub extensions: Vec<String>,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub need_post_process: bool,
    #[serde(default)]
    pub content_mode: ContentMode,
    /// Sandbox attribute value used when the output is shown in an iframe.
    #[serde(default)]
    pub content_sandbox: Option<String>,
    #[serde(default)]
    pub sanitizer_rules: Vec<RuleSettings>,
}

/// Sanitizer rule declared in settings for an external renderer.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleSettings {
    pub element: String,
    pub allow_attr: String,
    #[serde(default)]
    pub regexp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(input: &str) -> Config {
        Config {
            input: PathBuf::from(input),
            output: None,
            markup_type: None,
            config: None,
            repo: None,
            repo_link: None,
            ref_path: "branch/main".to_string(),
            wiki: false,
            description: false,
            absolute_links: false,
        }
    }

    #[test]
    fn test_validate_existing_input() {
        // Arrange
        let config = config("Cargo.toml");

        // Act
        let result = config.validate();

        // Assert
        assert!(result.is_ok(), "Cargo.toml should be a valid input");
    }

    #[test]
    fn test_validate_missing_input() {
        // Arrange
        let config = config("does-not-exist.md");

        // Act
        let result = config.validate();

        // Assert
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("does not exist"));
    }

    #[test]
    fn test_validate_wiki_requires_repo_link() {
        // Arrange
        let mut config = config("Cargo.toml");
        config.wiki = true;

        // Act
        let result = config.validate();

        // Assert
        assert!(result.is_err(), "Wiki without repo link should be rejected");
    }

    #[test]
    fn test_settings_default_without_file() {
        // Arrange
        let config = config("Cargo.toml");

        // Act
        let settings = config.settings().expect("Defaults should load");

        // Assert
        assert_eq!(settings.app_url, "http://localhost:3000/");
        assert!(!settings.camo.enabled);
        assert_eq!(settings.markdown.math, MathDelimiters::default());
    }

    #[test]
    fn test_settings_from_toml_normalizes_urls() {
        // Arrange
        let text = r#"
app_url = "https://git.example.com"
app_sub_url = "/sub/"

[camo]
enabled = true
server_url = "https://camo.example.com/"
hmac_key = "secret"

[[external_renderers]]
name = "asciidoc"
extensions = [".adoc"]
command = "asciidoctor"
args = ["-s", "-"]
content_mode = "iframe"
"#;

        // Act
        let settings = MarkupSettings::from_toml(text).expect("Should parse settings");

        // Assert
        assert_eq!(settings.app_url, "https://git.example.com/");
        assert_eq!(settings.app_sub_url, "/sub");
        assert_eq!(settings.camo.server_url, "https://camo.example.com");
        assert_eq!(settings.external_renderers.len(), 1);
        assert_eq!(
            settings.external_renderers[0].content_mode,
            ContentMode::Iframe
        );
    }

    #[test]
    fn test_settings_from_invalid_toml() {
        // Act
        let result = MarkupSettings::from_toml("app_url = [");

        // Assert
        assert!(result.is_err());
    }
}
