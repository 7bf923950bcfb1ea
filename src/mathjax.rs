use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// MathJax build used when no script URL is given.
pub const DEFAULT_MATHJAX_URL: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/mathjax/2.7.5/latest.js?config=TeX-MML-AM_CHTML";

static MATHJAX_SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<script[^<]+?[Mm]ath[Jj]ax.+?</script>").unwrap());

/// Replaces every MathJax `<script>` block with an async load of `url`.
pub fn replace_mathjax<'a>(html: &'a str, url: &str) -> Cow<'a, str> {
    let replacement = format!(r#"<script src="{url}" async></script>"#);
    MATHJAX_SCRIPT.replace_all(html, regex::NoExpand(&replacement))
}
