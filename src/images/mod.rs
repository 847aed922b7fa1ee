//! Image dimension resolution.
//!
//! Every `<img>` missing a `width` or `height` attribute is sized from, in
//! order: the persisted cache, a remote fetch for `http(s)` sources, or the
//! file relative to the template directory. Sources whose stem ends in
//! `@2x` / `@3x` are scaled down to their CSS size.
//!
//! Misses never fail a build; they come back as warnings.

mod cache;
mod fetch;

use crate::{
    config::KilnConfig,
    css::Declaration,
    dom::{Document, NodeId},
    output::OutputWriter,
    template::Template,
};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::{
    sync::{OnceCell, Semaphore},
    task::JoinSet,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Why an image could not be sized. Reported as a warning.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    #[error("failed to fetch `{0}`: {1}")]
    Http(String, String),

    #[error("`{0}` responded with HTTP {1}")]
    Status(String, u16),

    #[error("cannot read dimensions of `{0}`: {1}")]
    Decode(String, String),

    #[error("image `{0}` not found")]
    NotFound(String),
}

/// Dimensions found for one document, keyed by `src`.
#[derive(Debug, Default)]
pub struct ResolvedImages {
    dims: FxHashMap<String, Dimensions>,
    pub warnings: Vec<String>,
}

impl ResolvedImages {
    pub fn get(&self, src: &str) -> Option<Dimensions> {
        self.dims.get(src).copied()
    }
}

type SharedFetch = Arc<OnceCell<Result<Dimensions, ImageError>>>;

pub struct ImageSizer {
    cache: cache::ImageCache,
    agent: ureq::Agent,
    /// Remote lookups shared by every template, one per source.
    remote: Mutex<FxHashMap<String, SharedFetch>>,
    /// Local files already copied to the output tree.
    copied: Mutex<FxHashSet<PathBuf>>,
    output: Arc<OutputWriter>,
    limit: Arc<Semaphore>,
    copy_local: bool,
}

impl ImageSizer {
    /// Open the cache and its writer. Must run inside a runtime.
    pub fn new(config: &KilnConfig, output: Arc<OutputWriter>) -> Self {
        Self {
            cache: cache::ImageCache::open(config.image_cache_path()),
            agent: fetch::agent(Duration::from_secs(config.images.timeout_secs)),
            remote: Mutex::new(FxHashMap::default()),
            copied: Mutex::new(FxHashSet::default()),
            output,
            limit: Arc::new(Semaphore::new(config.images.max_concurrent)),
            copy_local: config.images.copy_local,
        }
    }

    /// Resolve every unsized image of `doc` concurrently.
    pub async fn resolve(self: &Arc<Self>, doc: &Document, template: &Template) -> ResolvedImages {
        let sources: BTreeSet<String> = unsized_images(doc).into_iter().map(|(_, src)| src).collect();

        let mut tasks = JoinSet::new();
        for src in sources {
            let sizer = Arc::clone(self);
            let template = template.clone();
            tasks.spawn(async move {
                let _permit = sizer.limit.clone().acquire_owned().await;
                let mut warnings = Vec::new();
                let dims = match sizer.lookup(&src, &template, &mut warnings).await {
                    Ok(dims) => Some(scale_retina(&src, dims, &mut warnings)),
                    Err(err) => {
                        warnings.push(err.to_string());
                        None
                    }
                };
                (src, dims, warnings)
            });
        }

        let mut resolved = ResolvedImages::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((src, dims, warnings)) => {
                    if let Some(dims) = dims {
                        resolved.dims.insert(src, dims);
                    }
                    resolved.warnings.extend(warnings);
                }
                Err(err) => resolved.warnings.push(format!("image task failed: {err}")),
            }
        }
        resolved.warnings.sort();
        resolved
    }

    /// Wait for pending cache writes.
    pub async fn close(&self) {
        self.cache.close().await;
    }

    async fn lookup(
        &self,
        src: &str,
        template: &Template,
        warnings: &mut Vec<String>,
    ) -> Result<Dimensions, ImageError> {
        if let Some(dims) = self.cache.get(src) {
            return Ok(dims);
        }
        match remote_url(src) {
            Some(url) => self.fetch(src, url).await,
            None => self.local(src, template, warnings).await,
        }
    }

    async fn fetch(&self, src: &str, url: String) -> Result<Dimensions, ImageError> {
        let cell = self.remote.lock().entry(src.to_owned()).or_default().clone();
        cell.get_or_init(|| async {
            let agent = self.agent.clone();
            let probe = url.clone();
            let result = tokio::task::spawn_blocking(move || fetch::remote_dimensions(&agent, &probe))
                .await
                .unwrap_or_else(|err| Err(ImageError::Http(url, err.to_string())));
            if let Ok(dims) = &result {
                self.cache.record(src, *dims);
            }
            result
        })
        .await
        .clone()
    }

    async fn local(
        &self,
        src: &str,
        template: &Template,
        warnings: &mut Vec<String>,
    ) -> Result<Dimensions, ImageError> {
        let rel = local_path(src);
        let path = template.dir.join(rel);

        let probe = path.clone();
        let owned = src.to_owned();
        let dims = tokio::task::spawn_blocking(move || fetch::local_dimensions(&owned, &probe))
            .await
            .unwrap_or_else(|err| Err(ImageError::Decode(src.to_owned(), err.to_string())))?;

        let first_copy = self.copy_local && self.copied.lock().insert(path.clone());
        if first_copy {
            match self.output.copy(&path, &Path::new(&template.name).join(rel)).await {
                Ok(_) => warnings.push(format!(
                    "local image `{src}` copied to output, local references will not work in production"
                )),
                Err(err) => warnings.push(err.to_string()),
            }
        }
        Ok(dims)
    }
}

/// Images without both size attributes, with their decoded `src`.
pub fn unsized_images(doc: &Document) -> Vec<(NodeId, String)> {
    doc.find_all("img")
        .into_iter()
        .filter_map(|id| {
            let elem = doc.element(id)?;
            if elem.has_attr("width") && elem.has_attr("height") {
                return None;
            }
            let src = elem.attr_decoded("src")?.trim().to_owned();
            let skip = src.is_empty()
                || src.contains("{{")
                || src.contains("{%")
                || src.starts_with("data:");
            (!skip).then_some((id, src))
        })
        .collect()
}

/// Write resolved sizes onto unsized images. Production output also gets
/// pixel sizes in the inline style when it lacks them.
pub fn annotate(doc: &mut Document, resolved: &ResolvedImages, production: bool) {
    for (id, src) in unsized_images(doc) {
        let Some(dims) = resolved.get(&src) else {
            continue;
        };
        let Some(elem) = doc.element_mut(id) else {
            continue;
        };
        elem.set_attr_if_missing("width", &dims.width.to_string());
        elem.set_attr_if_missing("height", &dims.height.to_string());
        if !production {
            continue;
        }

        let mut style = elem.attr("style").unwrap_or_default().trim().to_owned();
        let declared = Declaration::parse_list(&style);
        let has = |prop: &str| declared.iter().any(|d| d.property == prop);
        let mut additions = Vec::new();
        if !has("width") {
            additions.push(format!("width:{}px;", dims.width));
        }
        if !has("height") {
            additions.push(format!("height:{}px;", dims.height));
        }
        if additions.is_empty() {
            continue;
        }
        if !style.is_empty() {
            if !style.ends_with(';') {
                style.push(';');
            }
            style.push(' ');
        }
        style.push_str(&additions.concat());
        elem.set_attr("style", &style);
    }
}

fn remote_url(src: &str) -> Option<String> {
    let lower = src.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        Some(src.to_owned())
    } else {
        src.strip_prefix("//").map(|rest| format!("https://{rest}"))
    }
}

/// Template-relative file path of a local source.
fn local_path(src: &str) -> &str {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    path.trim_start_matches("./").trim_start_matches('/')
}

fn retina_factor(src: &str) -> Option<u32> {
    let path = src.split(['?', '#']).next().unwrap_or(src);
    let file = path.rsplit('/').next().unwrap_or(path);
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    if stem.ends_with("@2x") {
        Some(2)
    } else if stem.ends_with("@3x") {
        Some(3)
    } else {
        None
    }
}

/// Divide retina dimensions down, flooring, with a warning per uneven axis.
fn scale_retina(src: &str, dims: Dimensions, warnings: &mut Vec<String>) -> Dimensions {
    let Some(factor) = retina_factor(src) else {
        return dims;
    };
    for (axis, value) in [("width", dims.width), ("height", dims.height)] {
        if value % factor != 0 {
            warnings.push(format!(
                "`{src}` {axis} {value} is not divisible by {factor}, rounding down"
            ));
        }
    }
    Dimensions::new(dims.width / factor, dims.height / factor)
}

/// PNG bytes of a blank `width`×`height` image.
#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image::RgbImage::new(width, height)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{collections::BTreeMap, fs};

    struct Fixture {
        _dir: tempfile::TempDir,
        template: Template,
        output: PathBuf,
        sizer: Arc<ImageSizer>,
    }

    fn fixture(cached: &[(&str, u32, u32)]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let tpl_dir = dir.path().join("templates").join("welcome");
        fs::create_dir_all(&tpl_dir).unwrap();

        let mut config = KilnConfig::default();
        config.build.cache = dir.path().join("cache");
        config.build.output = dir.path().join("build");
        if !cached.is_empty() {
            let entries: BTreeMap<_, _> = cached
                .iter()
                .map(|(src, w, h)| (src.to_string(), Dimensions::new(*w, *h)))
                .collect();
            fs::create_dir_all(&config.build.cache).unwrap();
            fs::write(config.image_cache_path(), serde_json::to_string(&entries).unwrap()).unwrap();
        }

        let output = Arc::new(OutputWriter::new(&config.build.output));
        Fixture {
            sizer: Arc::new(ImageSizer::new(&config, output)),
            output: config.build.output.clone(),
            template: Template::new(tpl_dir),
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_retina_from_cache() {
        let fx = fixture(&[
            ("https://cdn.test/icon@2x.png", 200, 250),
            ("https://cdn.test/icon@3x.png?v=2", 300, 300),
            ("https://cdn.test/plain.png", 64, 32),
        ]);
        let doc = Document::parse(concat!(
            r#"<img src="https://cdn.test/icon@2x.png">"#,
            r#"<img src="https://cdn.test/icon@3x.png?v=2">"#,
            r#"<img src="https://cdn.test/plain.png">"#,
        ))
        .unwrap();

        let resolved = fx.sizer.resolve(&doc, &fx.template).await;
        assert!(resolved.warnings.is_empty(), "{:?}", resolved.warnings);
        assert_eq!(resolved.get("https://cdn.test/icon@2x.png"), Some(Dimensions::new(100, 125)));
        assert_eq!(resolved.get("https://cdn.test/icon@3x.png?v=2"), Some(Dimensions::new(100, 100)));
        assert_eq!(resolved.get("https://cdn.test/plain.png"), Some(Dimensions::new(64, 32)));
        fx.sizer.close().await;
    }

    #[tokio::test]
    async fn test_retina_uneven_floors_with_warning() {
        let fx = fixture(&[("https://cdn.test/hero@2x.jpg", 201, 250)]);
        let doc = Document::parse(r#"<img src="https://cdn.test/hero@2x.jpg">"#).unwrap();

        let resolved = fx.sizer.resolve(&doc, &fx.template).await;
        assert_eq!(resolved.get("https://cdn.test/hero@2x.jpg"), Some(Dimensions::new(100, 125)));
        assert_eq!(resolved.warnings.len(), 1);
        assert!(resolved.warnings[0].contains("width 201"));
        fx.sizer.close().await;
    }

    #[tokio::test]
    async fn test_sized_and_templated_images_skipped() {
        let doc = Document::parse(concat!(
            r#"<img src="a.png" width="1" height="2">"#,
            r#"<img src="">"#,
            r#"<img src="{{ logo }}">"#,
            r#"<img src="data:image/png;base64,AAAA">"#,
            r#"<img src="b.png" width="5">"#,
        ))
        .unwrap();
        let sources: Vec<_> = unsized_images(&doc).into_iter().map(|(_, src)| src).collect();
        assert_eq!(sources, vec!["b.png"]);
    }

    #[tokio::test]
    async fn test_local_image_sized_and_copied_once() {
        let fx = fixture(&[]);
        fs::create_dir_all(fx.template.dir.join("img")).unwrap();
        fs::write(fx.template.dir.join("img/logo@2x.png"), png_bytes(120, 40)).unwrap();
        let doc = Document::parse(r#"<img src="img/logo@2x.png"><img src="img/missing.png">"#).unwrap();

        let resolved = fx.sizer.resolve(&doc, &fx.template).await;
        assert_eq!(resolved.get("img/logo@2x.png"), Some(Dimensions::new(60, 20)));
        assert_eq!(resolved.get("img/missing.png"), None);
        assert_eq!(resolved.warnings.len(), 2);
        assert!(resolved.warnings.iter().any(|w| w.contains("not found")));
        assert!(fx.output.join("welcome/img/logo@2x.png").is_file());

        let again = fx.sizer.resolve(&doc, &fx.template).await;
        assert_eq!(again.warnings.len(), 1);
        fx.sizer.close().await;
    }

    #[tokio::test]
    async fn test_concurrent_remote_fetch_deduplicated() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hits = Arc::new(AtomicUsize::new(0));
        let server_hits = Arc::clone(&hits);
        let server = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                server_hits.fetch_add(1, Ordering::SeqCst);
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let body = png_bytes(48, 24);
                let head = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                );
                let _ = stream.write_all(head.as_bytes()).await;
                let _ = stream.write_all(&body).await;
                let _ = stream.shutdown().await;
            }
        });

        let fx = fixture(&[]);
        let url = format!("http://127.0.0.1:{port}/a.png");
        let doc = Document::parse(&format!(r#"<img src="{url}">"#)).unwrap();
        let (first, second) = tokio::join!(
            fx.sizer.resolve(&doc, &fx.template),
            fx.sizer.resolve(&doc, &fx.template),
        );

        assert_eq!(first.get(&url), Some(Dimensions::new(48, 24)), "{:?}", first.warnings);
        assert_eq!(second.get(&url), Some(Dimensions::new(48, 24)), "{:?}", second.warnings);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        fx.sizer.close().await;
        server.abort();
    }

    #[test]
    fn test_annotate_production_and_dev() {
        let mut resolved = ResolvedImages::default();
        resolved.dims.insert("a.png".into(), Dimensions::new(100, 50));
        let html = r#"<img src="a.png" style="display: block;"><img src="a.png" width="80" style="width: 80px;">"#;

        let mut doc = Document::parse(html).unwrap();
        annotate(&mut doc, &resolved, true);
        assert_eq!(
            doc.to_html(),
            concat!(
                r#"<img src="a.png" style="display: block; width:100px;height:50px;" width="100" height="50">"#,
                r#"<img src="a.png" width="80" style="width: 80px; height:50px;" height="50">"#,
            )
        );

        let mut doc = Document::parse(html).unwrap();
        annotate(&mut doc, &resolved, false);
        assert_eq!(
            doc.to_html(),
            concat!(
                r#"<img src="a.png" style="display: block;" width="100" height="50">"#,
                r#"<img src="a.png" width="80" style="width: 80px;" height="50">"#,
            )
        );
    }

    #[test]
    fn test_source_classification() {
        assert_eq!(remote_url("//cdn.test/a.png").as_deref(), Some("https://cdn.test/a.png"));
        assert_eq!(remote_url("HTTPS://cdn.test/a.png").as_deref(), Some("HTTPS://cdn.test/a.png"));
        assert_eq!(remote_url("img/a.png"), None);
        assert_eq!(local_path("./img/a.png?v=1"), "img/a.png");
        assert_eq!(retina_factor("https://x.test/a@2x.png?w=1"), Some(2));
        assert_eq!(retina_factor("a@2x/b.png"), None);
        assert_eq!(retina_factor("b@3x"), Some(3));
    }
}
