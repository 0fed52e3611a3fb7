//! Canonicalization and fingerprint invariants.

use pagesift::distill::{AddressMeta, canonicalize, fingerprint, is_valid_fingerprint, verify};
use proptest::prelude::*;

#[test]
fn reference_canonical_form() {
    assert_eq!(
        canonicalize("<DIV>  Hello  World  </DIV>"),
        "<div>Hello World</div>"
    );
}

#[test]
fn equivalent_markup_fingerprints_identically() {
    let meta = AddressMeta::new("https://example.com/article");
    let a = fingerprint("<DIV>  Hello  World  </DIV>", &meta);
    let b = fingerprint("<div>Hello World</div>", &meta);
    assert_eq!(a, b);
}

#[test]
fn fingerprint_shape_is_enforced() {
    let meta = AddressMeta::new("https://example.com/");
    let print = fingerprint("<p>x</p>", &meta);
    assert!(is_valid_fingerprint(&print));
    assert!(print.starts_with("sha256:"));
    assert_eq!(print.len(), "sha256:".len() + 64);

    assert!(!is_valid_fingerprint("sha256:short"));
    assert!(!is_valid_fingerprint("sha1:0000000000000000000000000000000000000000"));
}

#[test]
fn fingerprints_are_stable_across_calls() {
    let meta = AddressMeta::new("https://example.com/stable");
    let html = "<article><h1>Title</h1><p>Body text.</p></article>";
    let first = fingerprint(html, &meta);
    for _ in 0..20 {
        assert_eq!(fingerprint(html, &meta), first);
    }
}

#[test]
fn content_type_participates_in_identity() {
    let html = "<p>same</p>";
    let default = fingerprint(html, &AddressMeta::new("https://example.com/"));
    let xml = fingerprint(
        html,
        &AddressMeta::new("https://example.com/").with_content_type("application/xhtml+xml"),
    );
    assert_ne!(default, xml);
}

proptest! {
    #[test]
    fn canonicalize_is_idempotent(input in ".{0,400}") {
        let once = canonicalize(&input);
        prop_assert_eq!(canonicalize(&once), once);
    }

    #[test]
    fn verify_round_trips(body in "[a-zA-Z0-9 <>/]{0,200}", url in "[a-z]{1,10}") {
        let meta = AddressMeta::new(format!("https://{url}.example/"));
        let print = fingerprint(&body, &meta);
        prop_assert!(verify(&body, &meta, &print));
    }

    #[test]
    fn whitespace_runs_never_change_identity(words in proptest::collection::vec("[a-z]{1,8}", 1..8)) {
        let tight = format!("<p>{}</p>", words.join(" "));
        let loose = format!("<P>  {}  </P>", words.join("   "));
        let meta = AddressMeta::new("https://example.com/ws");
        prop_assert_eq!(fingerprint(&tight, &meta), fingerprint(&loose, &meta));
    }
}
