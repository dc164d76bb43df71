//! Integration tests for gitkyl-markup.
//!
//! Tests the public entry points end to end: renderer dispatch,
//! post-processing enrichments, sanitizing and repository lookups.

mod common;

use anyhow::Result;
use gitkyl_markup::{
    CamoSettings, Markup, MarkupSettings, ProcessorHelper, ProcessorSet, RenderContext,
    RepoFileHelper, RepoFileOptions, camo_encode, post_process, render_commit_message,
    render_description, render_string,
};
use pretty_assertions::assert_eq;

fn mentionable_markup() -> Result<Markup> {
    Ok(Markup::builder(MarkupSettings::default())
        .processor_helper(ProcessorHelper {
            is_username_mentionable: Some(Box::new(|_: &RenderContext<'_>, name: &str| {
                name.starts_with("user")
            })),
            ..ProcessorHelper::default()
        })
        .build()?)
}

fn camo_settings() -> MarkupSettings {
    MarkupSettings {
        app_url: "https://git.example.com/".to_string(),
        camo: CamoSettings {
            enabled: true,
            server_url: "https://camo.example.com".to_string(),
            hmac_key: "secret".to_string(),
            always: false,
        },
        ..MarkupSettings::default()
    }
}

/// Tests mentions of existing users become profile links.
#[test]
fn test_markdown_mention() -> Result<()> {
    // Arrange
    let markup = mentionable_markup()?;
    let mut ctx = RenderContext::simple(&markup);
    ctx.options.relative_path = "README.md".to_string();

    // Act
    let html = render_string(&mut ctx, "Thanks @user2 and @nobody!")?;

    // Assert
    assert_eq!(
        html,
        "<p>Thanks <a href=\"/user2\" rel=\"nofollow\">@user2</a> and @nobody!</p>\n"
    );
    Ok(())
}

/// Tests emoji shortcodes survive sanitizing with their class.
#[test]
fn test_markdown_emoji_shortcode() -> Result<()> {
    // Arrange
    let markup = Markup::new(MarkupSettings::default())?;
    let mut ctx = RenderContext::simple(&markup);
    ctx.options.relative_path = "README.md".to_string();

    // Act
    let html = render_string(&mut ctx, "Cheers :beer:")?;

    // Assert
    assert_eq!(
        html,
        "<p>Cheers <span class=\"emoji\" aria-label=\"beer\">🍺</span></p>\n"
    );
    Ok(())
}

/// Tests commit ids are linked only when the commit exists.
#[test]
fn test_commit_sha_links_existing_commits() -> Result<()> {
    // Arrange
    let repo = common::create_test_repo()?;
    let sha = common::commit_file(repo.path(), "README.md", "# Test\n", "Initial commit")?;
    let missing = hex::encode([0xab_u8; 20]);

    let markup = Markup::new(MarkupSettings::default())?;
    let helper = RepoFileHelper::open(
        repo.path(),
        RepoFileOptions {
            repo_link: "/owner/repo".to_string(),
            current_ref_path: "branch/main".to_string(),
            current_tree_path: String::new(),
        },
    )?;
    let mut ctx = RenderContext::new(&markup, helper);
    ctx.options.metas.insert("user".to_string(), "owner".to_string());
    ctx.options.metas.insert("repo".to_string(), "repo".to_string());

    // Act
    let html = render_commit_message(&mut ctx, &format!("Revert {} and {}", sha, missing))?;

    // Assert
    assert_eq!(
        html,
        format!(
            "Revert <a href=\"/owner/repo/commit/{}\"><code>{}</code></a> and {}",
            sha,
            &sha[..10],
            missing
        )
    );
    Ok(())
}

/// Tests insecure images are proxied and secure ones left alone.
#[test]
fn test_camo_proxies_insecure_images() -> Result<()> {
    // Arrange
    let settings = camo_settings();
    let expected = camo_encode(&settings.camo, "http://images.example.org/img.jpg")
        .expect("Key should be usable");
    let markup = Markup::new(settings)?;
    let mut ctx = RenderContext::simple(&markup);
    ctx.options.relative_path = "README.md".to_string();

    // Act
    let html = render_string(
        &mut ctx,
        "![a](http://images.example.org/img.jpg) ![b](https://images.example.org/img.jpg)",
    )?;

    // Assert
    assert!(expected.starts_with("https://camo.example.com/"));
    assert!(html.contains(&format!("src=\"{}\"", expected)), "Got: {}", html);
    assert!(
        html.contains("src=\"https://images.example.org/img.jpg\""),
        "Got: {}",
        html
    );
    Ok(())
}

/// Tests camo signatures depend on the key only through the digest.
#[test]
fn test_camo_encoding_is_deterministic() {
    // Arrange
    let settings = camo_settings();
    let mut other = settings.camo.clone();
    other.hmac_key = "other".to_string();
    let url = "http://images.example.org/img.jpg";

    // Act
    let first = camo_encode(&settings.camo, url);
    let second = camo_encode(&settings.camo, url);
    let rekeyed = camo_encode(&other, url);

    // Assert
    assert_eq!(first, second);
    assert_ne!(first, rekeyed);
}

/// Tests running the processors over their own output changes nothing.
#[test]
fn test_post_processing_is_idempotent() -> Result<()> {
    // Arrange
    let markup = mentionable_markup()?;
    let mut ctx = RenderContext::simple(&markup);
    ctx.options.metas.insert("user".to_string(), "owner".to_string());
    ctx.options.metas.insert("repo".to_string(), "repo".to_string());
    let html = "<p>@user1 fixed #12 :tada: mail me at dev@example.com</p>";

    // Act
    let once = post_process(&mut ctx, html, &ProcessorSet::DEFAULT)?;
    let twice = post_process(&mut ctx, &once, &ProcessorSet::DEFAULT)?;

    // Assert
    assert!(once.contains("href=\"/user1\""), "Got: {}", once);
    assert!(once.contains("href=\"/owner/repo/issues/12\""), "Got: {}", once);
    assert_eq!(once, twice);
    Ok(())
}

/// Tests protected attributes written by users never become real ones.
#[test]
fn test_forged_attributes_stay_inert() -> Result<()> {
    // Arrange
    let markup = Markup::new(MarkupSettings::default())?;
    let mut first = RenderContext::simple(&markup);
    first.options.relative_path = "a.md".to_string();
    let mut second = RenderContext::simple(&markup);
    second.options.relative_path = "b.md".to_string();
    let forged = "<span data-attr-class=\"AAAAAAAAAAAAAAAA:emoji\">x</span>";

    // Act
    let first_html = render_string(&mut first, forged)?;
    let second_html = render_string(&mut second, forged)?;

    // Assert
    for html in [first_html, second_html] {
        assert!(!html.contains(" class=\"emoji\""), "Got: {}", html);
        assert!(html.contains("data-attr-class="), "Got: {}", html);
    }
    Ok(())
}

/// Tests repeated headings get numbered ids.
#[test]
fn test_heading_ids_are_unique() -> Result<()> {
    // Arrange
    let markup = Markup::new(MarkupSettings::default())?;
    let mut ctx = RenderContext::simple(&markup);
    ctx.options.relative_path = "doc.md".to_string();

    // Act
    let html = render_string(&mut ctx, "# x\n\n# x\n")?;

    // Assert
    assert!(html.contains("<h1 id=\"user-content-x\">x</h1>"), "Got: {}", html);
    assert!(html.contains("<h1 id=\"user-content-x-1\">x</h1>"), "Got: {}", html);
    assert_eq!(ctx.outputs.toc.len(), 2);
    Ok(())
}

/// Tests ids written in the document do not clash with generated ones.
#[test]
fn test_explicit_heading_ids_stay_unique() -> Result<()> {
    // Arrange
    let markup = Markup::new(MarkupSettings::default())?;
    let mut ctx = RenderContext::simple(&markup);
    ctx.options.relative_path = "doc.md".to_string();

    // Act
    let html = render_string(&mut ctx, "# Foo\n\n<h2 id=\"foo\">Other</h2>\n")?;

    // Assert
    assert_eq!(html.matches("id=\"user-content-foo\"").count(), 1, "Got: {}", html);
    assert!(html.contains("<h2 id=\"user-content-foo-1\">Other</h2>"), "Got: {}", html);
    Ok(())
}

/// Tests front matter cannot smuggle classes into the meta block.
#[test]
fn test_front_matter_icon_is_not_trusted() -> Result<()> {
    // Arrange
    let markup = Markup::new(MarkupSettings::default())?;
    let mut ctx = RenderContext::simple(&markup);
    ctx.options.relative_path = "doc.md".to_string();
    let source = "---\ngitkyl:\n  details_icon: \"x gitea-modal evil-overlay\"\ntitle: t\n---\nbody\n";

    // Act
    let html = render_string(&mut ctx, source)?;

    // Assert
    assert!(html.contains("<span class=\"octicon octicon-table\">"), "Got: {}", html);
    assert!(!html.contains("evil-overlay"), "Got: {}", html);
    Ok(())
}

/// Tests descriptions only keep inline markup.
#[test]
fn test_description_policy() -> Result<()> {
    // Arrange
    let markup = Markup::new(MarkupSettings::default())?;
    let mut ctx = RenderContext::simple(&markup);

    // Act
    let html = render_description(&mut ctx, "Tools :hammer: see https://docs.example.com.")?;

    // Assert
    assert_eq!(
        html,
        "Tools <span class=\"emoji\" aria-label=\"hammer\">🔨</span> see <a href=\"https://docs.example.com\">https://docs.example.com</a>."
    );
    Ok(())
}

/// Tests the binary renders a file to stdout.
#[test]
fn test_cli_renders_file() -> Result<()> {
    // Arrange
    let dir = tempfile::TempDir::new()?;
    let input = dir.path().join("README.md");
    std::fs::write(&input, "# Hello\n\n- [x] done\n")?;

    // Act
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_gitkyl-markup"))
        .arg(&input)
        .output()?;

    // Assert
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let html = String::from_utf8(output.stdout)?;
    assert!(html.contains("<h1 id=\"user-content-hello\">Hello</h1>"), "Got: {}", html);
    assert!(html.contains("<li class=\"task-list-item\">"), "Got: {}", html);
    assert!(html.contains("checked=\"\""), "Got: {}", html);
    Ok(())
}

/// Tests the binary rejects missing input files.
#[test]
fn test_cli_missing_input_fails() -> Result<()> {
    // Act
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_gitkyl-markup"))
        .arg("does-not-exist.md")
        .output()?;

    // Assert
    assert!(!output.status.success());
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("Invalid configuration"),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(())
}
