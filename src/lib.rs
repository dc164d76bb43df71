//! Markup rendering and HTML post-processing for Git hosting pages.

mod config;
mod context;
mod dom;
mod emoji;
mod error;
mod filetype;
mod formats;
mod git;
mod helper;
mod internal;
mod links;
mod markdown;
mod postprocess;
mod registry;
mod render;
mod sanitizer;

pub use config::{
    CamoSettings, Config, ContentMode, CsvSettings, ExternalRendererSettings, MarkdownSettings,
    MarkupSettings, MathDelimiters, RuleSettings,
};
pub use context::{
    CancelToken, MarkdownMode, MarkdownOptions, RenderContext, RenderOptions, RenderOutputs,
    TocMode,
};
pub use error::{RenderError, Result};
pub use filetype::{SniffedType, sniff};
pub use formats::{AsciicastRenderer, ConsoleRenderer, CsvRenderer, ExternalRenderer};
pub use git::{RepoHandle, is_hex_object_id};
pub use helper::{
    RenderHelper, RepoCommentHelper, RepoFileHelper, RepoFileOptions, RepoWikiHelper,
    SimpleDocumentHelper,
};
pub use links::{LinkResolver, LinkType, is_full_url, parse_rendered_link};
pub use markdown::{
    HeadingIds, MarkdownRenderer, MetaMode, RenderConfig, TocEntry, USER_CONTENT_PREFIX, clean_value,
    render_toc,
};
pub use postprocess::{ProcessorSet, camo_encode, camo_rewrite, post_process};
pub use registry::{Capabilities, ExternalRendererOptions, Registry, Renderer};
pub use render::{
    CodePreviewOptions, IssueIconTitleOptions, Markup, MarkupBuilder, ProcessorHelper, global,
    init_global, install, post_process_default, render, render_commit_message,
    render_description, render_emoji, render_issue_title, render_string, reset_for_tests,
};
pub use sanitizer::{Sanitizer, SanitizerRule};
