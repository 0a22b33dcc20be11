use percent_encoding::percent_decode_str;
use regex::Regex;
use std::sync::LazyLock;

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("valid href regex")
});
static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*:").expect("valid scheme regex"));

/// Anything that can list candidate links
pub trait LinkSource {
    fn links(&self) -> Vec<String>;
}

/// An HTML page whose anchors are the links
#[derive(Debug, Clone)]
pub struct HtmlDocument {
    html: String,
}

impl HtmlDocument {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

impl LinkSource for HtmlDocument {
    fn links(&self) -> Vec<String> {
        extract_links(&self.html)
    }
}

impl LinkSource for Vec<String> {
    fn links(&self) -> Vec<String> {
        self.clone()
    }
}

/// `href` targets of every `<a>` element, in document order
pub fn extract_links(html: &str) -> Vec<String> {
    HREF_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| decode_entities(m.as_str().trim()))
        .filter(|link| !link.is_empty())
        .collect()
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Prefix `http://` unless the URL starts with a scheme and `//`
pub fn ensure_scheme(url: &str) -> String {
    if SCHEME_RE
        .find(url)
        .is_some_and(|m| url[m.end()..].starts_with("//"))
    {
        url.to_string()
    } else {
        format!("http://{url}")
    }
}

/// Resolve `link` against the page it was found on
pub fn resolve_link(base: &str, link: &str) -> String {
    if SCHEME_RE.is_match(link) {
        return link.to_string();
    }

    let (scheme, rest) = match base.split_once("://") {
        Some(parts) => parts,
        None => return link.to_string(),
    };
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let authority = &rest[..authority_end];
    let path = rest[authority_end..]
        .split(['?', '#'])
        .next()
        .unwrap_or_default();

    if let Some(stripped) = link.strip_prefix("//") {
        return format!("{scheme}://{stripped}");
    }
    if link.starts_with('/') {
        return format!("{scheme}://{authority}{link}");
    }
    if link.starts_with('?') {
        return format!("{scheme}://{authority}{path}{link}");
    }
    if link.starts_with('#') {
        let without_fragment = base.split('#').next().unwrap_or(base);
        return format!("{without_fragment}{link}");
    }

    let dir = match path.rfind('/') {
        Some(idx) => &path[..=idx],
        None => "/",
    };
    format!("{scheme}://{authority}{}", normalize_path(&format!("{dir}{link}")))
}

/// Collapse `.` and `..` segments of an absolute path
fn normalize_path(path: &str) -> String {
    let (path, suffix) = match path.find(['?', '#']) {
        Some(idx) => path.split_at(idx),
        None => (path, ""),
    };
    let trailing_slash = path.ends_with('/') || path.ends_with("/.") || path.ends_with("/..");

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut out = format!("/{}", segments.join("/"));
    if trailing_slash && !out.ends_with('/') {
        out.push('/');
    }
    out.push_str(suffix);
    out
}

/// Name to save a downloaded link under: the last path segment, unescaped
/// unless unescaping would produce a path separator
pub fn file_name_for(link: &str) -> Option<String> {
    let without_query = link.split(['?', '#']).next().unwrap_or(link);
    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, p)| p).unwrap_or(""),
        None => without_query,
    };
    let raw = path
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")?;

    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    if decoded.contains(['/', '\\']) || decoded == "." || decoded == ".." {
        Some(raw.to_string())
    } else {
        Some(decoded.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_links_handles_quoting_styles() {
        let html = r#"
<html><body>
  <a href="one.pdf">One</a>
  <A class="x" HREF='two.html'>Two</A>
  <a href=three.jpg>Three</a>
  <a name="anchor">no href</a>
  <link href="style.css">
  <a
     href = "/four?x=1&amp;y=2">Four</a>
</body></html>
"#;
        assert_eq!(
            extract_links(html),
            vec!["one.pdf", "two.html", "three.jpg", "/four?x=1&y=2"]
        );
    }

    #[test]
    fn test_ensure_scheme() {
        assert_eq!(ensure_scheme("example.com"), "http://example.com");
        assert_eq!(ensure_scheme("https://example.com"), "https://example.com");
        assert_eq!(ensure_scheme("HTTP://example.com"), "HTTP://example.com");
        assert_eq!(ensure_scheme("file:///tmp/a.html"), "file:///tmp/a.html");
        assert_eq!(
            ensure_scheme("example.com/go?to=https://x.org"),
            "http://example.com/go?to=https://x.org"
        );
        assert_eq!(ensure_scheme("localhost:8080/x"), "http://localhost:8080/x");
    }

    #[test]
    fn test_resolve_link_forms() {
        let base = "https://example.com/files/index.html?page=2";
        assert_eq!(
            resolve_link(base, "http://other.org/a.pdf"),
            "http://other.org/a.pdf"
        );
        assert_eq!(
            resolve_link(base, "mailto:someone@example.com"),
            "mailto:someone@example.com"
        );
        assert_eq!(
            resolve_link(base, "//cdn.example.com/x.js"),
            "https://cdn.example.com/x.js"
        );
        assert_eq!(resolve_link(base, "/root.txt"), "https://example.com/root.txt");
        assert_eq!(
            resolve_link(base, "a.pdf"),
            "https://example.com/files/a.pdf"
        );
        assert_eq!(
            resolve_link(base, "../up/b.pdf"),
            "https://example.com/up/b.pdf"
        );
        assert_eq!(
            resolve_link(base, "./sub/"),
            "https://example.com/files/sub/"
        );
        assert_eq!(
            resolve_link(base, "?page=3"),
            "https://example.com/files/index.html?page=3"
        );
        assert_eq!(
            resolve_link("https://example.com", "c.pdf"),
            "https://example.com/c.pdf"
        );
    }

    #[test]
    fn test_file_name_for() {
        assert_eq!(
            file_name_for("https://example.com/files/a.pdf?dl=1").as_deref(),
            Some("a.pdf")
        );
        assert_eq!(file_name_for("docs/b.txt").as_deref(), Some("b.txt"));
        assert_eq!(file_name_for("https://example.com/"), None);
        assert_eq!(file_name_for("https://example.com"), None);
        assert_eq!(
            file_name_for("file:///site/my%20file.pdf").as_deref(),
            Some("my file.pdf")
        );
        assert_eq!(
            file_name_for("http://h/..%2F..%2Fetc").as_deref(),
            Some("..%2F..%2Fetc")
        );
    }

    #[test]
    fn test_html_document_is_a_link_source() {
        let doc = HtmlDocument::new(r#"<a href="x">x</a>"#);
        assert_eq!(doc.links(), vec!["x"]);
    }
}
