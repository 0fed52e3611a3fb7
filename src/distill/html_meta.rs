//! Page metadata recovery shared by the DOM-based extractors.

use scraper::{Html, Selector};

use crate::distill::extractor::CandidateMetadata;
use crate::utils::clean_fragment;

fn select_first<'a>(doc: &'a Html, selector: &str) -> Option<scraper::ElementRef<'a>> {
    Selector::parse(selector)
        .ok()
        .and_then(|sel| doc.select(&sel).next())
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    select_first(doc, selector)
        .and_then(|el| el.value().attr("content").map(clean_fragment))
        .filter(|s| !s.is_empty())
}

/// Best-available page title: `og:title`, then `<title>`, then the first
/// `<h1>`.
#[must_use]
pub fn page_title(doc: &Html) -> Option<String> {
    meta_content(doc, r#"meta[property="og:title"]"#)
        .or_else(|| {
            select_first(doc, "title")
                .map(|el| clean_fragment(&el.text().collect::<String>()))
                .filter(|s| !s.is_empty())
        })
        .or_else(|| {
            select_first(doc, "h1")
                .map(|el| clean_fragment(&el.text().collect::<String>()))
                .filter(|s| !s.is_empty())
        })
}

/// Author, publish date, excerpt, site name, and language from the usual
/// meta tags.
#[must_use]
pub fn page_metadata(doc: &Html) -> CandidateMetadata {
    CandidateMetadata {
        author: meta_content(doc, r#"meta[name="author"]"#)
            .or_else(|| meta_content(doc, r#"meta[property="article:author"]"#)),
        publish_date: meta_content(doc, r#"meta[property="article:published_time"]"#)
            .or_else(|| meta_content(doc, r#"meta[name="date"]"#)),
        excerpt: meta_content(doc, r#"meta[property="og:description"]"#)
            .or_else(|| meta_content(doc, r#"meta[name="description"]"#)),
        site_name: meta_content(doc, r#"meta[property="og:site_name"]"#),
        lang: select_first(doc, "html")
            .and_then(|el| el.value().attr("lang"))
            .map(str::to_string)
            .filter(|s| !s.is_empty()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_prefers_og_over_title_tag() {
        let doc = Html::parse_document(
            r#"<html><head><meta property="og:title" content="OG Title">
            <title>Tag Title</title></head><body><h1>H1 Title</h1></body></html>"#,
        );
        assert_eq!(page_title(&doc).as_deref(), Some("OG Title"));
    }

    #[test]
    fn metadata_collects_common_tags() {
        let doc = Html::parse_document(
            r#"<html lang="en"><head>
            <meta name="author" content="Jo Writer">
            <meta property="article:published_time" content="2025-02-03">
            <meta name="description" content="A summary.">
            <meta property="og:site_name" content="Example News">
            </head><body></body></html>"#,
        );
        let meta = page_metadata(&doc);
        assert_eq!(meta.author.as_deref(), Some("Jo Writer"));
        assert_eq!(meta.publish_date.as_deref(), Some("2025-02-03"));
        assert_eq!(meta.excerpt.as_deref(), Some("A summary."));
        assert_eq!(meta.site_name.as_deref(), Some("Example News"));
        assert_eq!(meta.lang.as_deref(), Some("en"));
    }
}
