use crate::{Inspect, LayoutCache, TypeLayout, instance_size, pointer_width};
use std::mem::size_of;

#[derive(Inspect)]
struct Sample {
    key: u64,
    live: bool,
    count: u16,
}

#[derive(Clone, Copy)]
struct Lopsided {
    _big: u64,
    _small: u8,
}

#[test]
fn instance_size_matches_the_compiler() {
    assert_eq!(instance_size::<u8>(), 1);
    assert_eq!(instance_size::<u64>(), 8);
    assert_eq!(instance_size::<Lopsided>(), size_of::<Lopsided>());
    assert_eq!(instance_size::<Sample>(), size_of::<Sample>());
    assert_eq!(instance_size::<()>(), 0);
}

#[test]
fn pointer_width_matches_the_platform() {
    assert_eq!(pointer_width(), size_of::<usize>());
}

#[test]
fn layouts_are_idempotent() {
    let first = TypeLayout::of::<Sample>().unwrap();
    let second = TypeLayout::of::<Sample>().unwrap();
    assert_eq!(first, second);
}

#[test]
fn cache_returns_the_same_layout() {
    let cache = LayoutCache::new();
    assert!(cache.is_empty());

    let first = TypeLayout::of_cached::<Sample>(&cache).unwrap();
    assert!(!cache.is_empty());
    let populated = cache.len();

    let second = TypeLayout::of_cached::<Sample>(&cache).unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.len(), populated, "a hit must not grow the cache");

    let uncached = TypeLayout::of::<Sample>().unwrap();
    assert_eq!(first, uncached);
}

#[test]
fn display_summarizes_the_layout() {
    let rendered = TypeLayout::of::<Sample>().unwrap().to_string();
    assert!(rendered.contains("Type layout for"));
    assert!(rendered.contains("Size:"));
    assert!(rendered.contains("padding"));
    assert!(rendered.contains("key"));
}
