//! SCSS compilation and head/inline style assembly.
//!
//! Each template compiles three sources: its main stylesheet plus a head
//! reset and an inline reset. A reset is either a per-template override or
//! the shared default from the common directory; shared defaults compile
//! once per build and are reused by every template.
//!
//! ```text
//! head   = reset-head + at-rules(reset-inline) + head(main)
//! inline = rules(reset-inline) + inline(main)
//! ```

mod partition;

pub use partition::Partition;

use crate::{
    config::KilnConfig,
    css::{self, Stylesheet},
    error::BuildError,
    log,
    output::{OutputWriter, PendingWrites},
    template::Template,
};
use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::OnceCell;

/// Directory under the output root holding compiled shared resets.
pub const COMMON_CSS_DIR: &str = ".common";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    Head,
    Inline,
}

/// Head/inline CSS ready for document assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledStyles {
    pub head: String,
    pub inline: String,
    /// Dev-variant stylesheet hrefs, relative to the template output dir:
    /// reset-head, reset-inline, main.
    pub dev_links: Vec<String>,
}

/// One compiled stylesheet source.
struct Compiled {
    css: String,
    custom: bool,
    file_name: String,
}

pub struct StyleCompiler {
    common: PathBuf,
    main: String,
    reset_head: String,
    reset_inline: String,
    write_css: bool,
    output: Arc<OutputWriter>,
    pending: Arc<PendingWrites>,
    shared_head: OnceCell<String>,
    shared_inline: OnceCell<String>,
    shared_compilations: AtomicUsize,
}

impl StyleCompiler {
    pub fn new(config: &KilnConfig, output: Arc<OutputWriter>, pending: Arc<PendingWrites>) -> Self {
        Self {
            common: config.build.common.clone(),
            main: config.styles.main.clone(),
            reset_head: config.styles.reset_head.clone(),
            reset_inline: config.styles.reset_inline.clone(),
            write_css: config.styles.write_css,
            output,
            pending,
            shared_head: OnceCell::new(),
            shared_inline: OnceCell::new(),
            shared_compilations: AtomicUsize::new(0),
        }
    }

    /// How many shared resets were actually compiled in this build.
    pub fn shared_compilations(&self) -> usize {
        self.shared_compilations.load(Ordering::Relaxed)
    }

    /// Compile and partition all styles of a template.
    pub async fn compile(&self, template: &Template) -> Result<CompiledStyles, BuildError> {
        let (reset_head, reset_inline, main) = tokio::try_join!(
            self.reset(template, ResetKind::Head),
            self.reset(template, ResetKind::Inline),
            self.main(template),
        )?;

        let reset_head_css = css::minify(&reset_head.css);
        let reset_inline_split = Partition::split_inlinable(Stylesheet::parse(&reset_inline.css));
        let main_split = Partition::split(Stylesheet::parse(&main.css));

        let head = [
            reset_head_css,
            reset_inline_split.head.to_minified(),
            main_split.head_css(),
        ]
        .concat();
        let inline = [reset_inline_split.inline_css(), main_split.inline_css()].concat();

        let dev_links = [&reset_head, &reset_inline, &main]
            .into_iter()
            .map(dev_href)
            .collect();

        Ok(CompiledStyles {
            head,
            inline,
            dev_links,
        })
    }

    async fn main(&self, template: &Template) -> Result<Compiled, BuildError> {
        let path = template.dir.join(&self.main);
        if let Err(err) = tokio::fs::metadata(&path).await {
            return Err(BuildError::SourceMissing(path, err));
        }
        let css = compile_scss(path, vec![template.dir.clone(), self.common.clone()]).await?;
        let file_name = css_file_name(&self.main);
        self.emit(Path::new(&template.name).join("css").join(&file_name), &css);
        Ok(Compiled {
            css,
            custom: true,
            file_name,
        })
    }

    async fn reset(&self, template: &Template, kind: ResetKind) -> Result<Compiled, BuildError> {
        let name = match kind {
            ResetKind::Head => &self.reset_head,
            ResetKind::Inline => &self.reset_inline,
        };
        let file_name = css_file_name(name);

        let custom = template.dir.join(name);
        if tokio::fs::metadata(&custom).await.is_ok() {
            let css = compile_scss(custom, vec![template.dir.clone(), self.common.clone()]).await?;
            self.emit(Path::new(&template.name).join("css").join(&file_name), &css);
            return Ok(Compiled {
                css,
                custom: true,
                file_name,
            });
        }

        let cell = match kind {
            ResetKind::Head => &self.shared_head,
            ResetKind::Inline => &self.shared_inline,
        };
        let css = cell
            .get_or_try_init(|| async {
                let shared = self.common.join(name);
                if tokio::fs::metadata(&shared).await.is_err() {
                    log!("warn"; "shared reset `{}` not found, using empty styles", shared.display());
                    return Ok(String::new());
                }
                self.shared_compilations.fetch_add(1, Ordering::Relaxed);
                log!("style"; "compiling shared {}", name);
                let css = compile_scss(shared, vec![self.common.clone()]).await?;
                self.emit(Path::new(COMMON_CSS_DIR).join(&file_name), &css);
                Ok::<_, BuildError>(css)
            })
            .await?
            .clone();

        Ok(Compiled {
            css,
            custom: false,
            file_name,
        })
    }

    /// Queue a compiled stylesheet for inspection output.
    fn emit(&self, rel: PathBuf, css: &str) {
        if self.write_css {
            self.pending.spawn(self.output.clone(), rel, css.to_owned());
        }
    }
}

/// Compile an SCSS file on the blocking pool.
async fn compile_scss(path: PathBuf, load_paths: Vec<PathBuf>) -> Result<String, BuildError> {
    tokio::task::spawn_blocking(move || {
        let options = load_paths
            .iter()
            .fold(grass::Options::default(), |options, dir| options.load_path(dir))
            .style(grass::OutputStyle::Expanded);
        grass::from_path(&path, &options)
            .map_err(|err| BuildError::StyleCompile(path.clone(), err.to_string()))
    })
    .await?
}

fn css_file_name(scss_name: &str) -> String {
    match scss_name.strip_suffix(".scss") {
        Some(stem) => format!("{stem}.css"),
        None => format!("{scss_name}.css"),
    }
}

fn dev_href(compiled: &Compiled) -> String {
    if compiled.custom {
        format!("css/{}", compiled.file_name)
    } else {
        format!("../{COMMON_CSS_DIR}/{}", compiled.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        compiler: StyleCompiler,
        pending: Arc<PendingWrites>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::create_dir_all(root.join("common")).unwrap();
        fs::create_dir_all(root.join("templates")).unwrap();
        fs::write(root.join("common/reset-head.scss"), "body { margin: 0; }\n").unwrap();
        fs::write(
            root.join("common/reset-inline.scss"),
            "$pad: 0;\ntd { padding: $pad; }\n@media (max-width: 480px) { td { padding: 4px; } }\n",
        )
        .unwrap();

        let mut config = KilnConfig::default();
        config.update_path_with_root(&root, Path::new("mailkiln.toml"));
        let output = Arc::new(OutputWriter::new(root.join("build")));
        let pending = Arc::new(PendingWrites::default());
        let compiler = StyleCompiler::new(&config, output, pending.clone());
        Fixture {
            _dir: dir,
            root,
            compiler,
            pending,
        }
    }

    fn template(root: &Path, name: &str, style: &str) -> Template {
        let dir = root.join("templates").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("style.scss"), style).unwrap();
        Template::new(dir)
    }

    #[tokio::test]
    async fn test_compile_partitions_and_orders() {
        let fx = fixture();
        let tpl = template(
            &fx.root,
            "welcome",
            "$brand: orange;\ntable { background: $brand; }\na { text-decoration: none;\n  &:hover { text-decoration: underline; } }\n@media (max-width: 600px) { tr { display: block; } }\n",
        );

        let styles = fx.compiler.compile(&tpl).await.unwrap();
        assert_eq!(
            styles.head,
            "body{margin:0}@media (max-width:480px){td{padding:4px}}a:hover{text-decoration:underline!important}@media (max-width:600px){tr{display:block!important}}"
        );
        assert_eq!(
            styles.inline,
            "td{padding:0}table{background:orange}a{text-decoration:none}"
        );
        assert_eq!(
            styles.dev_links,
            vec!["../.common/reset-head.css", "../.common/reset-inline.css", "css/style.css"]
        );
    }

    #[tokio::test]
    async fn test_empty_main_stylesheet() {
        let fx = fixture();
        let tpl = template(&fx.root, "plain", "");
        let styles = fx.compiler.compile(&tpl).await.unwrap();
        assert_eq!(styles.inline, "td{padding:0}");
    }

    #[tokio::test]
    async fn test_shared_reset_compiled_once() {
        let fx = fixture();
        let a = template(&fx.root, "a", "p { color: red; }");
        let b = template(&fx.root, "b", "p { color: blue; }");

        let (ra, rb) = tokio::join!(fx.compiler.compile(&a), fx.compiler.compile(&b));
        ra.unwrap();
        rb.unwrap();
        fx.compiler.compile(&a).await.unwrap();

        assert_eq!(fx.compiler.shared_compilations(), 2);
    }

    #[tokio::test]
    async fn test_custom_reset_overrides_shared() {
        let fx = fixture();
        let tpl = template(&fx.root, "custom", "");
        fs::write(tpl.dir.join("reset-head.scss"), "html { color: #000; }").unwrap();

        let styles = fx.compiler.compile(&tpl).await.unwrap();
        assert!(styles.head.starts_with("html{color:#000}"));
        assert!(!styles.head.contains("body{margin:0}"));
        assert_eq!(styles.dev_links[0], "css/reset-head.css");
        // the head override never touched the shared head cell
        assert_eq!(fx.compiler.shared_compilations(), 1);
    }

    #[tokio::test]
    async fn test_missing_main_stylesheet() {
        let fx = fixture();
        let dir = fx.root.join("templates/nostyle");
        fs::create_dir_all(&dir).unwrap();

        let err = fx.compiler.compile(&Template::new(dir)).await.unwrap_err();
        assert!(matches!(err, BuildError::SourceMissing(..)));
    }

    #[tokio::test]
    async fn test_scss_syntax_error() {
        let fx = fixture();
        let tpl = template(&fx.root, "broken", "table { color: red;");

        let err = fx.compiler.compile(&tpl).await.unwrap_err();
        assert!(matches!(err, BuildError::StyleCompile(..)));
    }

    #[tokio::test]
    async fn test_compiled_css_files_emitted() {
        let fx = fixture();
        let tpl = template(&fx.root, "welcome", "p { color: red; }");
        fx.compiler.compile(&tpl).await.unwrap();
        fx.pending.drain().await;

        let build = fx.root.join("build");
        assert!(build.join("welcome/css/style.css").exists());
        assert!(build.join(".common/reset-head.css").exists());
        assert!(build.join(".common/reset-inline.css").exists());
    }

    #[test]
    fn test_css_file_name() {
        assert_eq!(css_file_name("reset-head.scss"), "reset-head.css");
        assert_eq!(css_file_name("main"), "main.css");
    }
}
