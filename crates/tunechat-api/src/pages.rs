//! The two HTML pages, embedded at compile time.

use std::sync::LazyLock;

use minijinja::{context, Environment};

/// Shown to visitors without a session.
pub const LOGIN_HTML: &str = include_str!("../assets/login.html");

const CHAT_TEMPLATE_NAME: &str = "chat.html";

// The `.html` name turns on HTML auto-escaping.
static TEMPLATES: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.add_template(CHAT_TEMPLATE_NAME, include_str!("../assets/chat.html"))
        .expect("Invalid chat template");
    env
});

/// The chat page greeting `display_name`.
pub fn chat_html(display_name: &str) -> Result<String, minijinja::Error> {
    TEMPLATES
        .get_template(CHAT_TEMPLATE_NAME)?
        .render(context! { display_name => display_name })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_html_escapes_name() {
        let page = chat_html(r#"<script>alert("x & y")</script>"#).unwrap();
        assert!(page.contains("Hi, &lt;script&gt;alert(&quot;x &amp; y&quot;)&lt;&#x2f;script&gt;"));
        assert!(!page.contains("<script>alert"));
        assert!(!page.contains("display_name"));
    }

    #[test]
    fn test_chat_html_keeps_plain_names() {
        let page = chat_html("Björk").unwrap();
        assert!(page.contains("Hi, Björk</span>"));
    }

    #[test]
    fn test_chat_page_renders_previews_and_tags() {
        let page = chat_html("Ada").unwrap();
        assert!(page.contains("if (t.preview_url) card.appendChild(previewButton(t.preview_url));"));
        assert!(page.contains("new Audio(url)"));
        assert!(page.contains("addTag(tags, recs.mood, 'mood')"));
        assert!(page.contains("addTag(tags, g, 'genre')"));
    }

    #[test]
    fn test_login_page_links_to_login() {
        assert!(LOGIN_HTML.contains("href=\"/login\""));
    }
}
