use iconc_core::error::ResolveError;
use iconc_core::sources::SourceResolver;
use iconc_core::types::{flatten_sources, IconSource};
use iconc_test_utils::IconTree;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn sizes(tree: &IconTree) -> Vec<(String, String)> {
    let map = SourceResolver::new(tree.root()).resolve().unwrap();
    flatten_sources(&map)
        .into_iter()
        .map(|source| (source.key(), source.size.to_string()))
        .collect()
}

#[test]
fn test_scalable_wins_over_rasters() {
    let tree = IconTree::new();
    tree.svg("apps", "foo");
    tree.png("apps", "foo", "32");
    tree.png("apps", "bar", "64");

    assert_eq!(
        sizes(&tree),
        vec![
            ("apps/bar".to_string(), "64".to_string()),
            ("apps/foo".to_string(), "scalable".to_string()),
        ]
    );
}

#[test]
fn test_raster_fixture_is_category_size_name() {
    let tree = IconTree::new();
    let path = tree.png("apps", "foo", "48");
    assert!(path.ends_with("src/apps/48/foo.png"), "{}", path.display());

    let map = SourceResolver::new(tree.root()).resolve().unwrap();
    let foo = &map["apps"]["foo"];
    assert_eq!(foo.name, "foo");
    assert_eq!(foo.size.to_string(), "48");
}

#[test]
fn test_largest_raster_wins() {
    let tree = IconTree::new();
    tree.png("status", "dialog", "16");
    tree.png("status", "dialog", "96");
    tree.png("status", "dialog", "48");

    assert_eq!(sizes(&tree), vec![("status/dialog".to_string(), "96".to_string())]);
}

#[test]
fn test_one_source_per_name_across_categories() {
    let tree = IconTree::new();
    tree.png("apps", "terminal", "48");
    tree.png("places", "terminal", "48");

    let map = SourceResolver::new(tree.root()).resolve().unwrap();
    assert_eq!(map.len(), 2);
    assert!(map["apps"].contains_key("terminal"));
    assert!(map["places"].contains_key("terminal"));
}

#[test]
fn test_ignores_other_files_and_shapes() {
    let tree = IconTree::new();
    tree.file("apps/48/readme.txt", b"notes");
    tree.file("loose.svg", b"<svg/>");
    tree.file("apps/stray.png", b"png");
    tree.png("apps", "foo", "48");

    assert_eq!(sizes(&tree), vec![("apps/foo".to_string(), "48".to_string())]);
}

#[test]
fn test_exclude_runs_before_dedup() {
    let tree = IconTree::new();
    tree.svg("apps", "chrome");
    tree.png("apps", "chrome", "48");
    tree.png("apps", "firefox", "48");

    let map = SourceResolver::new(tree.root())
        .with_exclude(Arc::new(|source: &IconSource| source.size.is_scalable()))
        .resolve()
        .unwrap();

    let keys: Vec<_> = flatten_sources(&map).into_iter().map(|s| (s.key(), s.size.to_string())).collect();
    assert_eq!(
        keys,
        vec![
            ("apps/chrome".to_string(), "48".to_string()),
            ("apps/firefox".to_string(), "48".to_string()),
        ]
    );
}

#[test]
fn test_missing_root_is_an_error() {
    let tree = IconTree::new();
    let result = SourceResolver::new(tree.base().join("nope")).resolve();
    assert!(matches!(result, Err(ResolveError::RootNotFound(_))));
}

#[cfg(unix)]
mod links {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_link_resolves_to_real_path() {
        let tree = IconTree::new();
        let real = tree.png("apps", "foo", "48");
        tree.symlink("apps/48/foo-alias.png", &real);

        let map = SourceResolver::new(tree.root()).resolve().unwrap();
        let foo = &map["apps"]["foo"];

        assert_eq!(foo.path, real.canonicalize().unwrap());
        assert!(!map["apps"].contains_key("foo-alias"));
    }

    #[test]
    fn test_link_shape_comes_from_target() {
        let tree = IconTree::new();
        let real = tree.svg("actions", "go-next");
        tree.symlink("actions/48/go-forward.png", &real);

        let map = SourceResolver::new(tree.root()).resolve().unwrap();
        assert_eq!(map["actions"].len(), 1);
        assert!(map["actions"]["go-next"].size.is_scalable());
    }

    #[test]
    fn test_dangling_link_is_dropped() {
        let tree = IconTree::new();
        tree.png("apps", "foo", "48");
        tree.symlink("apps/48/ghost.png", tree.root().join("apps/48/missing.png"));

        assert_eq!(sizes(&tree), vec![("apps/foo".to_string(), "48".to_string())]);
    }

    #[test]
    fn test_link_cycle_is_dropped() {
        let tree = IconTree::new();
        tree.png("apps", "foo", "48");
        let a = tree.root().join("apps/48/a.png");
        let b = tree.root().join("apps/48/b.png");
        tree.symlink("apps/48/a.png", &b);
        tree.symlink("apps/48/b.png", &a);

        assert_eq!(sizes(&tree), vec![("apps/foo".to_string(), "48".to_string())]);
    }
}
