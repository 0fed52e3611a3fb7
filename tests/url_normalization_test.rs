//! URL normalization invariants used by dedup and cache keys.

use pagesift::utils::normalize_url;
use proptest::prelude::*;

#[test]
fn equivalent_urls_normalize_equal() {
    let variants = [
        "HTTPS://Example.com/Path?b=2&a=1#frag",
        "https://example.com/Path?a=1&b=2",
    ];
    let normalized: Vec<String> = variants
        .iter()
        .map(|u| normalize_url(u).unwrap())
        .collect();
    assert_eq!(normalized[0], normalized[1]);
}

#[test]
fn fragment_is_identity_free() {
    assert_eq!(
        normalize_url("https://example.com/a#one").unwrap(),
        normalize_url("https://example.com/a#two").unwrap()
    );
}

#[test]
fn query_key_order_is_deterministic() {
    assert_eq!(
        normalize_url("https://example.com/s?z=1&m=2&a=3").unwrap(),
        "https://example.com/s?a=3&m=2&z=1"
    );
}

proptest! {
    #[test]
    fn normalization_is_idempotent(
        host in "[a-z]{1,12}",
        path in "[a-z/]{0,20}",
        key_a in "[a-z]{1,5}",
        key_b in "[a-z]{1,5}",
    ) {
        let raw = format!("https://{host}.example/{path}?{key_b}=1&{key_a}=2");
        let once = normalize_url(&raw).unwrap();
        prop_assert_eq!(normalize_url(&once).unwrap(), once);
    }
}
