//! Template build orchestration.
//!
//! Every template builds as its own task; a failing template is logged and
//! counted, never aborting its siblings.
//!
//! # Architecture
//!
//! ```text
//! build_all()
//!     │
//!     └── build_template()            one task per template
//!             │
//!             ├── render ──────┐      concurrent, blocking work off-thread
//!             ├── compile styles ┘
//!             ├── resolve images
//!             ├── production_html()
//!             ├── development_html()
//!             └── persist() ──► <output>/<tpl>/<tpl>.{html,dev.html,txt}
//! ```

use crate::{
    config::KilnConfig,
    context::BuildContext,
    dom::Document,
    error::BuildError,
    html::{attrs, finalize, head, inline, unused},
    images::{self, ResolvedImages},
    log,
    logger::ProgressBar,
    output::WriteStatus,
    render::render_template,
    style::CompiledStyles,
    template::Template,
    typography,
};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Final contents of one template, before persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifacts {
    pub html: String,
    pub html_dev: String,
    pub text: String,
    /// Image sizing misses, already logged.
    pub warnings: Vec<String>,
}

/// Result of a successful template build.
#[derive(Debug)]
pub struct TemplateOutcome {
    pub artifacts: Artifacts,
    /// Artifacts whose contents changed on disk.
    pub written: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub built: usize,
    pub failed: usize,
}

/// Build every template concurrently.
pub async fn build_all(ctx: Arc<BuildContext>, templates: Vec<Template>) -> BuildSummary {
    log!("build"; "building {} templates", templates.len());
    let progress = ProgressBar::new("build", templates.len());

    let mut tasks = JoinSet::new();
    for template in templates {
        let ctx = Arc::clone(&ctx);
        tasks.spawn(async move {
            let result = build_template(&ctx, &template).await;
            (template, result)
        });
    }

    let mut summary = BuildSummary::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(_))) => summary.built += 1,
            Ok((template, Err(err))) => {
                summary.failed += 1;
                log!("error"; "{}: {:#}", template.name, anyhow::Error::from(err));
            }
            Err(err) => {
                summary.failed += 1;
                log!("error"; "build task failed: {err}");
            }
        }
        if let Some(bar) = &progress {
            bar.inc();
        }
    }
    if let Some(bar) = &progress {
        bar.finish();
    }

    summary
}

/// Build and persist one template.
pub async fn build_template(
    ctx: &BuildContext,
    template: &Template,
) -> Result<TemplateOutcome, BuildError> {
    let artifacts = assemble(ctx, template).await?;
    let written = persist(ctx, template, &artifacts).await?;
    Ok(TemplateOutcome { artifacts, written })
}

/// Render, style and post-process one template without writing it.
pub async fn assemble(ctx: &BuildContext, template: &Template) -> Result<Artifacts, BuildError> {
    let renderer = Arc::clone(&ctx.renderer);
    let options = ctx.render_options.clone();
    let owned = template.clone();
    let render = tokio::task::spawn_blocking(move || {
        render_template(renderer.as_ref(), &owned, &options)
    });

    let (rendered, styles) = tokio::join!(render, ctx.styles.compile(template));
    let rendered = rendered??;
    let styles = styles?;

    let text = typography::normalize_text(&rendered.text);
    let doc = Document::parse(&rendered.html)?;

    let resolved = if ctx.config.images.enable {
        ctx.images.resolve(&doc, template).await
    } else {
        ResolvedImages::default()
    };
    for warning in &resolved.warnings {
        log!("warn"; "{}: {warning}", template.name);
    }

    Ok(Artifacts {
        html: production_html(&ctx.config, doc.clone(), &styles, &resolved),
        html_dev: development_html(&ctx.config, doc, &styles, &resolved),
        text,
        warnings: resolved.warnings,
    })
}

/// Email-ready markup: inlined styles, head CSS, sized images, minified.
pub fn production_html(
    config: &KilnConfig,
    mut doc: Document,
    styles: &CompiledStyles,
    resolved: &ResolvedImages,
) -> String {
    let html = &config.html;

    attrs::apply_default_attributes(&mut doc, html.link_target.as_deref());
    if html.empty_cell {
        attrs::fill_empty_cells(&mut doc);
    }
    if html.meta_tags {
        head::inject_meta_tags(&mut doc);
    }
    head::inject_head_css(&mut doc, &styles.head);
    inline::inline_styles(&mut doc, &styles.inline, &html.size_attributes);
    images::annotate(&mut doc, resolved, true);
    if html.remove_unused_css {
        unused::remove_unused_css(&mut doc, &html.whitelist);
    }
    finalize::strip_comments(&mut doc);

    let mut markup = doc.to_html();
    if html.minify {
        markup = finalize::minify(&markup);
    }
    let markup = finalize::patch_delimiters(&typography::encode_non_ascii(&markup));
    finalize::apply_doctype(&markup, &config.build.doctype)
}

/// Readable markup linking the compiled stylesheets instead of inlining them.
pub fn development_html(
    config: &KilnConfig,
    mut doc: Document,
    styles: &CompiledStyles,
    resolved: &ResolvedImages,
) -> String {
    attrs::apply_default_attributes(&mut doc, config.html.link_target.as_deref());
    if config.html.empty_cell {
        attrs::fill_empty_cells(&mut doc);
    }
    head::inject_dev_links(&mut doc, &styles.dev_links);
    images::annotate(&mut doc, resolved, false);

    let markup = finalize::patch_delimiters(&typography::encode_non_ascii(&doc.to_html()));
    finalize::apply_doctype(&markup, &config.build.doctype)
}

/// Write the three artifacts, skipping unchanged ones.
async fn persist(
    ctx: &BuildContext,
    template: &Template,
    artifacts: &Artifacts,
) -> Result<usize, BuildError> {
    let outputs = [
        ("html", &artifacts.html),
        ("dev.html", &artifacts.html_dev),
        ("txt", &artifacts.text),
    ];

    let mut written = 0;
    for (suffix, contents) in outputs {
        let rel = template.artifact_path(suffix);
        if ctx.output.write(&rel, contents.as_bytes()).await? == WriteStatus::Written {
            log!("write"; "{}", rel.display());
            written += 1;
        }
    }
    Ok(written)
}
