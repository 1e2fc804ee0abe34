use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../templates/index.html");

/// Serve the front end page.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_talks_to_both_endpoints() {
        assert!(INDEX_HTML.contains("/sse"));
        assert!(INDEX_HTML.contains("/messages"));
        assert!(INDEX_HTML.contains("weather.update"));
    }
}
