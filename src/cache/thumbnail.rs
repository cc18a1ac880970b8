use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lazy_static::lazy_static;
use log::{debug, info, warn};
use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::OnceCell;

use crate::cache::CacheDirError;
use crate::images::tools::DEFAULT_JPEG_QUALITY;
use crate::images::{make_thumbnail, ImageFetcher, MaxDimensions, ThumbnailError};

/// Every thumbnail is re-encoded as JPEG, whatever the source format.
pub const THUMBNAIL_SUFFIX: &str = "_thumbnail.jpg";

const MAX_VERBATIM_STEM_LEN: usize = 200;

lazy_static! {
    static ref SAFE_STEM: Regex = Regex::new(r"^[a-z0-9_-][a-z0-9_.-]*$").unwrap();
}

/// Filename stem for a record id. Lowercase plain ids are used as-is; anything
/// else is replaced by `@` + md5 hex, and `@` never occurs in a plain stem.
/// Uppercase ids are hashed too, since `IMG001` and `img001` name the same file
/// on case-insensitive filesystems.
pub fn cache_stem(id: &str) -> String {
    if id.len() <= MAX_VERBATIM_STEM_LEN && SAFE_STEM.is_match(id) {
        id.to_string()
    } else {
        format!("@{:x}", md5::compute(id.as_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailOutcome {
    /// A file was already on disk; nothing was fetched.
    Hit(PathBuf),
    /// Fetched, resized and written during this run.
    Created(PathBuf),
    /// Fetch, decode, encode or write failed. Already logged.
    Failed,
}

impl ThumbnailOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ThumbnailOutcome::Hit(path) | ThumbnailOutcome::Created(path) => Some(path.as_path()),
            ThumbnailOutcome::Failed => None,
        }
    }

    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            ThumbnailOutcome::Hit(path) | ThumbnailOutcome::Created(path) => Some(path),
            ThumbnailOutcome::Failed => None,
        }
    }
}

/// Filesystem-backed thumbnail store. A file at the target path is a hit, and
/// its contents are never re-validated.
pub struct ThumbnailCache {
    cache_dir: PathBuf,
    bounds: MaxDimensions,
    quality: u8,
    fetcher: Arc<dyn ImageFetcher>,
    // One cell per id so concurrent callers share a single fetch
    entries: Mutex<HashMap<String, Arc<OnceCell<ThumbnailOutcome>>>>,
}

impl ThumbnailCache {
    pub fn new(cache_dir: impl Into<PathBuf>, bounds: MaxDimensions, fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            bounds,
            quality: DEFAULT_JPEG_QUALITY,
            fetcher,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Creates the cache directory if needed. Safe to call repeatedly and
    /// from several tasks at once.
    pub fn prepare(&self) -> Result<(), CacheDirError> {
        fs::create_dir_all(&self.cache_dir).map_err(|source| CacheDirError {
            path: self.cache_dir.clone(),
            source,
        })?;
        info!("Thumbnail cache ready at {}", self.cache_dir.display());
        Ok(())
    }

    pub fn target_path(&self, id: &str) -> PathBuf {
        self.cache_dir.join(format!("{}{}", cache_stem(id), THUMBNAIL_SUFFIX))
    }

    /// Path of a usable thumbnail for `id`, or `None` if one couldn't be made.
    pub async fn ensure_thumbnail(&self, id: &str, source_url: &str) -> Option<PathBuf> {
        self.ensure(id, source_url).await.into_path()
    }

    /// Like [`ensure_thumbnail`](Self::ensure_thumbnail) but reports whether
    /// the file was already cached. Repeated calls for an id within the same
    /// cache return the first outcome without touching disk or network again.
    pub async fn ensure(&self, id: &str, source_url: &str) -> ThumbnailOutcome {
        let cell = {
            let mut entries = self.entries.lock();
            Arc::clone(entries.entry(id.to_string()).or_default())
        };

        cell.get_or_init(|| self.resolve(id, source_url)).await.clone()
    }

    async fn resolve(&self, id: &str, source_url: &str) -> ThumbnailOutcome {
        let path = self.target_path(id);

        if is_file(&path).await {
            debug!("Thumbnail cache hit for '{}': {}", id, path.display());
            return ThumbnailOutcome::Hit(path);
        }

        debug!("Thumbnail cache miss for '{}', fetching {}", id, source_url);
        match self.create(source_url, &path).await {
            Ok(()) => {
                info!("Created thumbnail for '{}' at {}", id, path.display());
                ThumbnailOutcome::Created(path)
            }
            Err(e) => {
                warn!("Error creating thumbnail for '{}' from {}: {}", id, source_url, e);
                ThumbnailOutcome::Failed
            }
        }
    }

    async fn create(&self, source_url: &str, path: &Path) -> Result<(), ThumbnailError> {
        let data = self.fetcher.fetch(source_url).await?;

        let bounds = self.bounds;
        let quality = self.quality;
        let encoded = tokio::task::spawn_blocking(move || make_thumbnail(&data, bounds, quality)).await??;

        write_atomically(path, &encoded).await
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

/// Writes to a uniquely named sibling first and renames it over `path`, so a
/// half-written file is never visible under the final name.
async fn write_atomically(path: &Path, data: &[u8]) -> Result<(), ThumbnailError> {
    let temp_path = temp_path_for(path);

    if let Err(source) = tokio::fs::write(&temp_path, data).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(ThumbnailError::Write { path: temp_path, source });
    }

    if let Err(source) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(ThumbnailError::Write {
            path: path.to_path_buf(),
            source,
        });
    }

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{:016x}.tmp", name, rand::random::<u64>()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use image::{DynamicImage, ImageFormat};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct CountingFetcher {
        payload: Result<Vec<u8>, u16>,
        calls: AtomicUsize,
    }

    impl CountingFetcher {
        fn serving(payload: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                payload: Ok(payload),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                payload: Err(status),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ImageFetcher for CountingFetcher {
        fn fetch<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<Vec<u8>, ThumbnailError>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = match &self.payload {
                Ok(data) => Ok(data.clone()),
                Err(status) => Err(ThumbnailError::FetchStatus(
                    reqwest::StatusCode::from_u16(*status).unwrap(),
                )),
            };
            Box::pin(async move { result })
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut output = Vec::new();
        DynamicImage::new_rgb8(width, height)
            .write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
            .unwrap();
        output
    }

    fn cache_in(dir: &TempDir, fetcher: Arc<CountingFetcher>) -> ThumbnailCache {
        let cache = ThumbnailCache::new(dir.path().join("thumbnails"), MaxDimensions::new(128, 128), fetcher);
        cache.prepare().unwrap();
        cache
    }

    #[test]
    fn plain_ids_are_used_verbatim() {
        assert_eq!(cache_stem("img001"), "img001");
        assert_eq!(cache_stem("photo.2024-01_a"), "photo.2024-01_a");
    }

    #[test]
    fn ids_with_uppercase_are_hashed() {
        for id in ["IMG001", "Img001", "photo_A"] {
            let stem = cache_stem(id);
            assert!(stem.starts_with('@'), "{:?} -> {}", id, stem);
        }
        assert_ne!(cache_stem("IMG001"), cache_stem("Img001"));
    }

    #[test]
    fn ids_differing_only_in_case_never_share_a_file() {
        let cache = ThumbnailCache::new("cache", MaxDimensions::new(128, 128), CountingFetcher::failing(404));
        let ids = ["img001", "IMG001", "Img001", "iMG001", "a", "A"];

        let mut folded: Vec<String> = ids
            .iter()
            .map(|id| cache.target_path(id).to_string_lossy().to_lowercase())
            .collect();
        folded.sort();
        folded.dedup();
        assert_eq!(folded.len(), ids.len());
    }

    #[test]
    fn unsafe_ids_are_hashed() {
        for id in ["../etc/passwd", "a/b", "with space", "", ".hidden", "café"] {
            let stem = cache_stem(id);
            assert!(stem.starts_with('@'), "{:?} -> {}", id, stem);
            assert_eq!(stem.len(), 33);
        }
    }

    #[test]
    fn distinct_ids_never_share_a_path() {
        let dir = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(dir.path(), MaxDimensions::new(128, 128), CountingFetcher::failing(404));
        let hashed = cache_stem("a/b");
        let ids = ["a", "A", "a_", "a/b", "a b", hashed.as_str(), "img.jpg", "img_jpg"];

        let mut paths: Vec<PathBuf> = ids.iter().map(|id| cache.target_path(id)).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), ids.len());
    }

    #[test]
    fn target_path_is_deterministic() {
        let cache = ThumbnailCache::new("cache", MaxDimensions::new(128, 128), CountingFetcher::failing(404));
        assert_eq!(cache.target_path("img001"), PathBuf::from("cache/img001_thumbnail.jpg"));
        assert_eq!(
            cache.target_path("IMG001"),
            PathBuf::from(format!("cache/@{:x}_thumbnail.jpg", md5::compute("IMG001")))
        );
        assert_eq!(cache.target_path("IMG001"), cache.target_path("IMG001"));
    }

    #[test]
    fn prepare_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let cache = ThumbnailCache::new(dir.path().join("a/b"), MaxDimensions::new(64, 64), CountingFetcher::failing(404));
        cache.prepare().unwrap();
        cache.prepare().unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }

    #[test]
    fn prepare_fails_when_path_is_a_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("thumbnails");
        fs::write(&blocker, b"not a directory").unwrap();

        let cache = ThumbnailCache::new(&blocker, MaxDimensions::new(64, 64), CountingFetcher::failing(404));
        assert!(cache.prepare().is_err());
    }

    #[tokio::test]
    async fn miss_fetches_and_writes_jpeg() {
        let dir = TempDir::new().unwrap();
        let fetcher = CountingFetcher::serving(png_bytes(400, 300));
        let cache = cache_in(&dir, fetcher.clone());

        let outcome = cache.ensure("IMG001", "https://x/1.jpg").await;
        let path = cache.target_path("IMG001");
        assert_eq!(outcome, ThumbnailOutcome::Created(path.clone()));
        assert_eq!(fetcher.calls(), 1);

        let written = fs::read(&path).unwrap();
        assert_eq!(image::guess_format(&written).unwrap(), ImageFormat::Jpeg);
    }

    #[tokio::test]
    async fn second_call_is_a_pure_hit() {
        let dir = TempDir::new().unwrap();
        let fetcher = CountingFetcher::serving(png_bytes(64, 64));
        let cache = cache_in(&dir, fetcher.clone());

        let first = cache.ensure_thumbnail("IMG001", "https://x/1.jpg").await;
        let second = cache.ensure_thumbnail("IMG001", "https://x/1.jpg").await;
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn existing_file_short_circuits_regardless_of_content() {
        let dir = TempDir::new().unwrap();
        let fetcher = CountingFetcher::serving(png_bytes(64, 64));
        let cache = cache_in(&dir, fetcher.clone());
        let path = cache.target_path("IMG001");
        fs::write(&path, b"definitely not a jpeg").unwrap();

        let outcome = cache.ensure("IMG001", "https://x/1.jpg").await;
        assert_eq!(outcome, ThumbnailOutcome::Hit(path.clone()));
        assert_eq!(fetcher.calls(), 0);
        assert_eq!(fs::read(&path).unwrap(), b"definitely not a jpeg");
    }

    #[tokio::test]
    async fn fetch_failure_yields_no_path_and_no_file() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir, CountingFetcher::failing(404));

        assert_eq!(cache.ensure_thumbnail("IMG404", "https://x/404.jpg").await, None);
        assert!(!cache.target_path("IMG404").exists());
    }

    #[tokio::test]
    async fn undecodable_payload_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let cache = cache_in(&dir, CountingFetcher::serving(b"<html>".to_vec()));

        assert_eq!(cache.ensure("IMG002", "https://x/2.jpg").await, ThumbnailOutcome::Failed);
        let leftovers = fs::read_dir(cache.cache_dir()).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn concurrent_calls_for_one_id_fetch_once() {
        let dir = TempDir::new().unwrap();
        let fetcher = CountingFetcher::serving(png_bytes(300, 200));
        let cache = cache_in(&dir, fetcher.clone());

        let calls = (0..6).map(|_| cache.ensure_thumbnail("IMG001", "https://x/1.jpg"));
        let results = futures::future::join_all(calls).await;

        assert!(results.iter().all(|r| r.as_deref() == Some(cache.target_path("IMG001").as_path())));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn write_failure_is_contained() {
        let dir = TempDir::new().unwrap();
        let fetcher = CountingFetcher::serving(png_bytes(64, 64));
        let cache = ThumbnailCache::new(dir.path().join("missing"), MaxDimensions::new(64, 64), fetcher.clone());

        // no prepare(), so the directory never exists
        assert_eq!(cache.ensure_thumbnail("IMG001", "https://x/1.jpg").await, None);
        assert_eq!(fetcher.calls(), 1);
    }
}
