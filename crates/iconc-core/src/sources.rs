//! Source discovery
//!
//! Walks a source tree laid out as `{category}/{size}/{name}.{png,svg}` and
//! reduces it to one canonical [`IconSource`] per `(category, name)`.
//!
//! Precedence when a name is seen more than once:
//! 1. the same file again is ignored
//! 2. a `scalable` source replaces whatever was recorded
//! 3. a recorded `scalable` source is never replaced by a raster
//! 4. between rasters the larger pixel size wins, ties keep the first

use crate::error::ResolveError;
use crate::types::{IconSource, IconSourceMap, SourceFormat};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Upper bound on symbolic link hops before a chain is treated as a cycle
pub const MAX_LINK_HOPS: usize = 40;

/// Predicate dropping sources before deduplication
pub type ExcludeFn = Arc<dyn Fn(&IconSource) -> bool + Send + Sync>;

/// What [`SourceIndex::insert`] did with a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First source for its name
    Recorded,
    /// Replaced the previously recorded source
    Replaced,
    /// Lost against the recorded source
    Skipped,
}

/// Deduplicating source collection
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    map: IconSourceMap,
    len: usize,
}

impl SourceIndex {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a candidate, applying the precedence rules
    pub fn insert(&mut self, source: IconSource) -> Admission {
        let category = self.map.entry(source.category.clone()).or_default();
        let Some(existing) = category.get(&source.name) else {
            category.insert(source.name.clone(), source);
            self.len += 1;
            return Admission::Recorded;
        };

        if existing.path == source.path {
            return Admission::Skipped;
        }

        if source.size.is_scalable() {
            if existing.size.is_scalable() {
                tracing::warn!(
                    existing = %existing.path.display(),
                    incoming = %source.path.display(),
                    "existing source is already scalable, keeping the later one"
                );
            }
            category.insert(source.name.clone(), source);
            return Admission::Replaced;
        }

        if existing.size.is_scalable() {
            tracing::debug!(
                "skipping source '{}', existing source '{}' is scalable",
                source.path.display(),
                existing.path.display()
            );
            return Admission::Skipped;
        }

        if source.size.pixels() > existing.size.pixels() {
            tracing::debug!(
                "replaced source '{}' with '{}'",
                existing.path.display(),
                source.path.display()
            );
            category.insert(source.name.clone(), source);
            return Admission::Replaced;
        }

        Admission::Skipped
    }

    /// Number of canonical sources
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether nothing has been recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Canonical sources grouped by category
    #[must_use]
    pub fn into_map(self) -> IconSourceMap {
        self.map
    }
}

/// Walks a source root into an [`IconSourceMap`]
#[derive(Clone)]
pub struct SourceResolver {
    root: PathBuf,
    exclude: Option<ExcludeFn>,
}

impl SourceResolver {
    /// Resolver over `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            exclude: None,
        }
    }

    /// Drop every source for which `exclude` returns true
    #[must_use]
    pub fn with_exclude(mut self, exclude: ExcludeFn) -> Self {
        self.exclude = Some(exclude);
        self
    }

    /// Root being walked
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree and deduplicate
    ///
    /// # Errors
    /// - `ResolveError::RootNotFound` if the root is missing or not a directory
    /// - `ResolveError::Walk` for I/O failures other than vanished entries
    pub fn resolve(&self) -> Result<IconSourceMap, ResolveError> {
        let root = match fs::canonicalize(&self.root) {
            Ok(root) if root.is_dir() => root,
            Ok(_) => return Err(ResolveError::RootNotFound(self.root.clone())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ResolveError::RootNotFound(self.root.clone()));
            }
            Err(source) => {
                return Err(ResolveError::Walk {
                    path: self.root.clone(),
                    source,
                });
            }
        };

        let mut index = SourceIndex::new();
        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map_or_else(|| root.clone(), Path::to_path_buf);
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| io::Error::other("filesystem loop"));
                    if source.kind() == io::ErrorKind::NotFound {
                        continue;
                    }
                    return Err(ResolveError::Walk { path, source });
                }
            };

            let candidate = if entry.path_is_symlink() {
                resolve_link(entry.path())
            } else if entry.file_type().is_file() && entry.depth() >= 3 {
                Ok(Some(entry.path().to_path_buf()))
            } else {
                Ok(None)
            };

            let path = match candidate {
                Ok(Some(path)) => path,
                Ok(None) => continue,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(ResolveError::Walk {
                        path: entry.path().to_path_buf(),
                        source,
                    });
                }
            };

            let Some(source) = source_from_path(&path) else {
                continue;
            };

            if self.exclude.as_ref().is_some_and(|exclude| exclude(&source)) {
                tracing::trace!("excluded source '{}'", source.path.display());
                continue;
            }

            index.insert(source);
        }

        tracing::debug!(sources = index.len(), root = %root.display(), "resolved sources");
        Ok(index.into_map())
    }
}

impl std::fmt::Debug for SourceResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceResolver")
            .field("root", &self.root)
            .field("exclude", &self.exclude.is_some())
            .finish()
    }
}

/// Follow a link chain to a regular file
///
/// `Ok(None)` for chains ending somewhere other than a file, or longer than
/// [`MAX_LINK_HOPS`].
fn resolve_link(link: &Path) -> io::Result<Option<PathBuf>> {
    let mut current = link.to_path_buf();
    for _ in 0..MAX_LINK_HOPS {
        let metadata = fs::symlink_metadata(&current)?;
        if !metadata.file_type().is_symlink() {
            if !metadata.is_file() {
                return Ok(None);
            }
            let resolved = fs::canonicalize(&current)?;
            tracing::debug!("resolved symbolic link: '{}' -> '{}'", link.display(), resolved.display());
            return Ok(Some(resolved));
        }

        let target = fs::read_link(&current)?;
        current = match current.parent() {
            Some(parent) => parent.join(target),
            None => target,
        };
    }

    tracing::warn!(link = %link.display(), "dropping symbolic link cycle");
    Ok(None)
}

/// Derive a source from `{category}/{size}/{name}.{ext}`
fn source_from_path(path: &Path) -> Option<IconSource> {
    SourceFormat::from_path(path)?;

    let name = path.file_stem()?.to_str()?;
    let size_dir = path.parent()?;
    let size = size_dir.file_name()?.to_str()?;
    let category = size_dir.parent()?.file_name()?.to_str()?;

    Some(IconSource::new(category, name, path, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SCALABLE;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn source(category: &str, name: &str, size: &str) -> IconSource {
        let ext = if size == SCALABLE { "svg" } else { "png" };
        IconSource::new(category, name, format!("/src/{category}/{size}/{name}.{ext}"), size)
    }

    fn sizes_of(map: &IconSourceMap) -> Vec<(String, String, String)> {
        map.iter()
            .flat_map(|(category, names)| {
                names
                    .iter()
                    .map(move |(name, source)| (category.clone(), name.clone(), source.size.to_string()))
            })
            .collect()
    }

    #[test]
    fn scalable_beats_raster_in_either_order() {
        for order in [["48", SCALABLE], [SCALABLE, "48"]] {
            let mut index = SourceIndex::new();
            for size in order {
                index.insert(source("apps", "foo", size));
            }
            let map = index.into_map();
            assert!(map["apps"]["foo"].size.is_scalable());
        }
    }

    #[test]
    fn larger_raster_wins_in_either_order() {
        for order in [["48", "96"], ["96", "48"]] {
            let mut index = SourceIndex::new();
            for size in order {
                index.insert(source("apps", "foo", size));
            }
            assert_eq!(index.into_map()["apps"]["foo"].size.as_str(), "96");
        }
    }

    #[test]
    fn admission_outcomes() {
        let mut index = SourceIndex::new();
        assert_eq!(index.insert(source("apps", "foo", "32")), Admission::Recorded);
        assert_eq!(index.insert(source("apps", "foo", "32")), Admission::Skipped);
        assert_eq!(index.insert(source("apps", "foo", "16")), Admission::Skipped);
        assert_eq!(index.insert(source("apps", "foo", "64")), Admission::Replaced);
        assert_eq!(index.insert(source("apps", "foo", SCALABLE)), Admission::Replaced);
        assert_eq!(index.insert(source("apps", "foo", "256")), Admission::Skipped);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn later_scalable_replaces_earlier_scalable() {
        let mut index = SourceIndex::new();
        let first = IconSource::new("apps", "foo", "/a/apps/scalable/foo.svg", SCALABLE);
        let second = IconSource::new("apps", "foo", "/b/apps/scalable/foo.svg", SCALABLE);

        index.insert(first);
        assert_eq!(index.insert(second.clone()), Admission::Replaced);
        assert_eq!(index.into_map()["apps"]["foo"], second);
    }

    #[test]
    fn numeric_size_beats_non_numeric() {
        let mut index = SourceIndex::new();
        index.insert(source("apps", "foo", "symbolic"));
        assert_eq!(index.insert(source("apps", "foo", "16")), Admission::Replaced);
        assert_eq!(index.insert(source("apps", "foo", "symbolic")), Admission::Skipped);
    }

    #[test]
    fn mixed_scenario() {
        let mut index = SourceIndex::new();
        index.insert(source("apps", "foo", SCALABLE));
        index.insert(source("apps", "foo", "32"));
        index.insert(source("apps", "bar", "64"));

        assert_eq!(
            sizes_of(&index.into_map()),
            vec![
                ("apps".to_string(), "bar".to_string(), "64".to_string()),
                ("apps".to_string(), "foo".to_string(), SCALABLE.to_string()),
            ]
        );
    }

    #[test]
    fn path_shape() {
        let source = source_from_path(Path::new("/icons/status/48x48/dialog-error.png")).unwrap();
        assert_eq!(source.category, "status");
        assert_eq!(source.name, "dialog-error");
        assert_eq!(source.size.as_str(), "48x48");

        assert!(source_from_path(Path::new("/icons/status/48/readme.txt")).is_none());
        assert!(source_from_path(Path::new("/icons/status/48/upper.PNG")).is_none());
    }

    fn candidates() -> impl Strategy<Value = Vec<IconSource>> {
        // Distinct sizes per name and at most one scalable, so the outcome is order independent
        let per_name = (proptest::sample::subsequence(vec![8u32, 16, 24, 32, 48, 64, 96, 128], 1..5), any::<bool>());
        proptest::collection::btree_map("[a-e]", per_name, 1..4).prop_map(|names| {
            names
                .into_iter()
                .flat_map(|(name, (sizes, scalable))| {
                    let mut sources: Vec<IconSource> = sizes
                        .into_iter()
                        .map(|size| source("apps", &name, &size.to_string()))
                        .collect();
                    if scalable {
                        sources.push(source("apps", &name, SCALABLE));
                    }
                    sources
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn dedup_is_order_independent(
            (sources, shuffled) in candidates().prop_flat_map(|sources| {
                let shuffled = Just(sources.clone()).prop_shuffle();
                (Just(sources), shuffled)
            })
        ) {
            let mut forward = SourceIndex::new();
            for source in sources {
                forward.insert(source);
            }
            let mut permuted = SourceIndex::new();
            for source in shuffled {
                permuted.insert(source);
            }

            prop_assert_eq!(forward.len(), permuted.len());
            prop_assert_eq!(forward.into_map(), permuted.into_map());
        }
    }
}
