use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// A parsed HTML page plus the URL it was served from.
///
/// `scraper::Html` is not `Send`, so a `Document` lives only inside the
/// synchronous parse step and never crosses an `.await`.
pub struct Document {
    html: Html,
    url: Url,
}

impl Document {
    pub fn parse(body: &str, url: Url) -> Self {
        Self {
            html: Html::parse_document(body),
            url,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Direct text children of the first match, like Scrapy's `::text`.
    pub fn own_text(&self, selector: &Selector) -> Option<String> {
        let el = self.html.select(selector).next()?;
        Some(direct_text(el))
    }

    /// All descendant text of every match, joined by spaces.
    pub fn all_text(&self, selector: &Selector) -> String {
        self.html
            .select(selector)
            .flat_map(|el| el.text())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Descendant text of each match, one entry per element.
    pub fn texts(&self, selector: &Selector) -> Vec<String> {
        self.html
            .select(selector)
            .map(|el| el.text().collect::<String>())
            .collect()
    }

    /// Descendant text of each match with every `<br>` turned into `'\n'`.
    pub fn text_lines(&self, selector: &Selector) -> Vec<String> {
        self.html.select(selector).map(line_text).collect()
    }

    /// `attr` of every match, resolved against the page URL.
    pub fn links(&self, selector: &Selector, attr: &str) -> Vec<Url> {
        self.html
            .select(selector)
            .filter_map(|el| el.value().attr(attr))
            .filter_map(|href| self.url.join(href.trim()).ok())
            .collect()
    }

    /// Elements matching `outer`, each scoped for an inner query.
    pub fn scoped_links(&self, outer: &Selector, inner: &Selector, attr: &str) -> Vec<Url> {
        self.html
            .select(outer)
            .filter_map(|item| item.select(inner).next())
            .filter_map(|a| a.value().attr(attr))
            .filter_map(|href| self.url.join(href.trim()).ok())
            .collect()
    }
}

fn direct_text(el: ElementRef<'_>) -> String {
    el.children()
        .filter_map(|child| child.value().as_text())
        .map(|t| &**t)
        .collect::<String>()
}

fn line_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(t) => out.push_str(t),
            Node::Element(e) if e.name() == "br" => out.push('\n'),
            _ => {}
        }
    }
    out
}

/// Collapse every whitespace run (newlines included) into one space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Document {
        Document::parse(body, Url::parse("https://djinni.co/jobs/?page=2").unwrap())
    }

    fn sel(s: &str) -> Selector {
        Selector::parse(s).unwrap()
    }

    #[test]
    fn own_text_skips_nested_elements() {
        let d = doc("<h1>\n  Senior Python Developer\n  <span>$5000</span></h1>");
        let text = d.own_text(&sel("h1")).unwrap();
        assert_eq!(collapse_whitespace(&text), "Senior Python Developer");
    }

    #[test]
    fn links_resolve_relative_hrefs() {
        let d = doc(r#"<a class="x" href="/jobs/123-python/">a</a><a class="x" href="?page=3">b</a>"#);
        let links = d.links(&sel("a.x"), "href");
        assert_eq!(links[0].as_str(), "https://djinni.co/jobs/123-python/");
        assert_eq!(links[1].as_str(), "https://djinni.co/jobs/?page=3");
    }

    #[test]
    fn missing_node_is_none() {
        let d = doc("<p>nothing</p>");
        assert!(d.own_text(&sel("h1")).is_none());
        assert!(d.texts(&sel("h1")).is_empty());
    }

    #[test]
    fn text_lines_breaks_on_br_and_decodes_entities() {
        let d = doc(r#"<p class="m">Posted 15&nbsp;March <b>2024</b><br>42 views</p>"#);
        assert_eq!(d.text_lines(&sel("p.m")), vec!["Posted 15\u{A0}March 2024\n42 views"]);
    }

    #[test]
    fn collapse() {
        assert_eq!(collapse_whitespace("  Acme\n\n  Corp \t"), "Acme Corp");
    }
}
