use url::Url;

use super::document::Document;
use crate::config::Selectors;

/// What a listing page yields: detail links and the pagination target.
#[derive(Debug, Default)]
pub struct ListingPage {
    pub detail_urls: Vec<Url>,
    pub next_page: Option<Url>,
}

pub fn parse(body: &str, url: Url, selectors: &Selectors) -> ListingPage {
    let doc = Document::parse(body, url);

    let mut detail_urls: Vec<Url> = Vec::new();
    for mut link in doc.scoped_links(&selectors.listing_item, &selectors.listing_link, "href") {
        link.set_fragment(None);
        if !detail_urls.contains(&link) {
            detail_urls.push(link);
        }
    }

    // The last pagination control is "next"; on the final page it is a "#" stub.
    let next_page = doc
        .links(&selectors.next_page, "href")
        .into_iter()
        .last()
        .map(|mut next| {
            next.set_fragment(None);
            next
        })
        .filter(|next| {
            let mut here = doc.url().clone();
            here.set_fragment(None);
            *next != here
        });

    ListingPage {
        detail_urls,
        next_page,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;

    fn selectors() -> Selectors {
        SelectorConfig::default().compile().unwrap()
    }

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    #[test]
    fn first_page_items_and_next() {
        let url = Url::parse("https://djinni.co/jobs/?primary_keyword=Python").unwrap();
        let page = parse(&fixture("listing_page1"), url, &selectors());
        let urls: Vec<&str> = page.detail_urls.iter().map(|u| u.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://djinni.co/jobs/612345-senior-python-developer/",
                "https://djinni.co/jobs/612346-middle-python-engineer/",
                "https://djinni.co/jobs/612347-python-team-lead/",
            ]
        );
        assert_eq!(
            page.next_page.unwrap().as_str(),
            "https://djinni.co/jobs/?primary_keyword=Python&page=2"
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let url = Url::parse("https://djinni.co/jobs/?primary_keyword=Python&page=2").unwrap();
        let page = parse(&fixture("listing_page2"), url, &selectors());
        assert_eq!(page.detail_urls.len(), 1);
        assert!(page.next_page.is_none());
    }

    #[test]
    fn missing_markup_yields_nothing() {
        let url = Url::parse("https://djinni.co/jobs/").unwrap();
        let page = parse("<html><body><p>Maintenance</p></body></html>", url, &selectors());
        assert!(page.detail_urls.is_empty());
        assert!(page.next_page.is_none());
    }
}
