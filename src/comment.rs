//! HTML bodies of the comments posted to Plane issues.

use std::fmt::Write as _;

use pulldown_cmark_escape::escape_html;

use crate::gitea::PullRequestEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentTemplate {
    /// Generic update, mentioning the action that triggered it.
    Updated { action: String },
    Merged,
    Closed,
}

impl CommentTemplate {
    fn headline(&self) -> &'static str {
        match self {
            CommentTemplate::Updated { .. } => "🔄 Pull Request Update",
            CommentTemplate::Merged => "✅ Pull Request Merged",
            CommentTemplate::Closed => "🚫 Pull Request Closed",
        }
    }

    pub fn render(&self, event: &PullRequestEvent) -> anyhow::Result<String> {
        let mut title = String::new();
        escape_html(&mut title, &event.title)?;
        let mut author = String::new();
        escape_html(&mut author, &format!("{} ({})", event.sender_name, event.sender_email))?;
        let mut link = String::new();
        escape_html(&mut link, &event.pr_link)?;

        let mut html = String::new();
        writeln!(html, "<h3>{}</h3>", self.headline())?;
        if let CommentTemplate::Updated { action } = self {
            let mut action_html = String::new();
            escape_html(&mut action_html, action)?;
            writeln!(html, "<p><strong>Action:</strong> {action_html}</p>")?;
        }
        writeln!(html, "<p><strong>Title:</strong> {title}</p>")?;
        writeln!(html, "<p><strong>Author:</strong> {author}</p>")?;
        writeln!(
            html,
            r#"<p><strong>PR Link:</strong> <a href="{link}" target="_blank">{link}</a></p>"#
        )?;
        writeln!(
            html,
            "<p><em>This comment was automatically generated from a Gitea webhook.</em></p>"
        )?;
        Ok(html)
    }
}
