use anyhow::{Context, Result};
use gitkyl_markup::{
    Config, RenderContext, RenderHelper, RenderOptions, RepoFileHelper, RepoFileOptions, RepoHandle,
    RepoWikiHelper, SimpleDocumentHelper,
};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Options shared by every helper choice.
fn render_options(config: &Config) -> RenderOptions {
    let mut options = RenderOptions {
        relative_path: config.input.to_string_lossy().into_owned(),
        markup_type: config.markup_type.clone(),
        use_abs_link: config.absolute_links,
        ..RenderOptions::default()
    };

    // `/owner/name` doubles as the metas used for references
    if let Some(link) = &config.repo_link {
        let mut parts = link.trim_matches('/').splitn(2, '/');
        if let (Some(owner), Some(name)) = (parts.next(), parts.next()) {
            options.metas.insert("user".to_string(), owner.to_string());
            options.metas.insert("repo".to_string(), name.to_string());
        }
    }
    options
}

fn run(config: &Config, markup: &gitkyl_markup::Markup, helper: impl RenderHelper + 'static) -> Result<String> {
    let mut ctx = RenderContext::new(markup, helper).with_options(render_options(config));

    if config.description {
        let text = fs::read_to_string(&config.input)
            .with_context(|| format!("Failed to read {}", config.input.display()))?;
        return gitkyl_markup::render_description(&mut ctx, &text).context("Failed to render description");
    }

    let mut input = fs::File::open(&config.input)
        .with_context(|| format!("Failed to open {}", config.input.display()))?;
    let mut output = Vec::new();
    gitkyl_markup::render(&mut ctx, &mut input, &mut output)
        .with_context(|| format!("Failed to render {}", config.input.display()))?;

    if let Some(toc) = &ctx.outputs.sidebar_toc {
        tracing::debug!(entries = ctx.outputs.toc.len(), bytes = toc.len(), "Sidebar table of contents");
    }
    Ok(String::from_utf8(output)?)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();
    config.validate().context("Invalid configuration")?;

    let markup = gitkyl_markup::init_global(config.settings()?).context("Failed to build markup engine")?;
    let repo_link = config.repo_link.clone().unwrap_or_default();

    let html = if config.wiki {
        let repo = match &config.repo {
            Some(path) => Some(RepoHandle::open(path).context("Failed to open repository")?),
            None => None,
        };
        run(&config, &markup, RepoWikiHelper::new(repo_link, repo))?
    } else if let Some(path) = &config.repo {
        let tree_path = Path::new(&config.input)
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let helper = RepoFileHelper::open(
            path,
            RepoFileOptions {
                repo_link,
                current_ref_path: config.ref_path.clone(),
                current_tree_path: tree_path,
            },
        )
        .context("Failed to open repository")?;
        run(&config, &markup, helper)?
    } else {
        run(&config, &markup, SimpleDocumentHelper::new(repo_link))?
    };

    match &config.output {
        Some(path) => {
            fs::write(path, &html).with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = html.len(), "Wrote rendered output");
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(html.as_bytes()).context("Failed to write output")?;
            stdout.write_all(b"\n").context("Failed to write output")?;
        }
    }

    Ok(())
}
