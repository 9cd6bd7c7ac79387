// AHash-backed maps and sets for the hot paths (dedup, aggregation).
// Use `crate::types::{HashMap, HashSet}` everywhere; bring `HashMapExt` /
// `HashSetExt` into scope where `::new()` or `::with_capacity()` is needed.
pub(crate) type HashMap<K, V> = ahash::HashMap<K, V>;
pub(crate) type HashSet<K> = ahash::HashSet<K>;
pub(crate) use ahash::HashMapExt;
pub(crate) use ahash::HashSetExt;
