use serde::Serialize;

use crate::entities::posts;

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i32,
    pub body: String,
    pub body_html: String,
    pub timestamp: String,
    pub author_id: i32,
}

impl Post {
    /// A post that has not been stored yet.
    #[must_use]
    pub fn draft(author_id: i32, body: &str) -> Self {
        let mut post = Self {
            id: 0,
            body: String::new(),
            body_html: String::new(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            author_id,
        };
        post.set_body(body);
        post
    }

    /// Stores the text and its rendered HTML together.
    pub fn set_body(&mut self, body: &str) {
        self.body = body.to_string();
        self.body_html = render_body(body);
    }
}

impl From<posts::Model> for Post {
    fn from(model: posts::Model) -> Self {
        Self {
            id: model.id,
            body: model.body,
            body_html: model.body_html,
            timestamp: model.timestamp,
            author_id: model.author_id,
        }
    }
}

/// Escapes all markup, then wraps each blank-line separated block in `<p>`.
/// Single newlines inside a block become `<br>`.
#[must_use]
pub fn render_body(body: &str) -> String {
    let normalized = body.replace("\r\n", "\n");

    normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|block| !block.is_empty())
        .map(|block| {
            let lines: Vec<String> = block
                .lines()
                .map(|line| html_escape::encode_text(line.trim()).into_owned())
                .collect();
            format!("<p>{}</p>", lines.join("<br>"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
