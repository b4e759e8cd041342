//! Server-rendered HTML pages. Every user-supplied value goes through [`escape_html`].

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::models::{Message, PublicMessage};

const STYLE: &str = r#"
    :root { color-scheme: dark; }
    body { font-family: system-ui, sans-serif; padding: 24px; background: #0b0b0c; color: #eaeaea; }
    .wrap { max-width: 1100px; margin: 0 auto; }
    table { width: 100%; border-collapse: collapse; }
    th, td { padding: 10px; border-bottom: 1px solid #2a2a2a; text-align: left; vertical-align: top; }
    th { position: sticky; top: 0; background: #131316; }
    form { display: flex; gap: .5rem; flex-wrap: wrap; margin-bottom: 1rem; }
    input, textarea, button { font: inherit; padding: .5rem; border: 1px solid #444; border-radius: .5rem; }
    textarea { flex: 1; min-height: 70px; }
    a { color: #9ad; }
"#;

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn when(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn author_or_anonymous(author: Option<&str>) -> String {
    match author {
        Some(a) => escape_html(a),
        None => "<em>Anonymous</em>".to_string(),
    }
}

fn page(title: &str, body: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
<head>
  <meta charset="utf-8"/>
  <meta name="viewport" content="width=device-width,initial-scale=1"/>
  <title>{title}</title>
  <style>{STYLE}</style>
</head>
<body>
  <div class="wrap">
{body}
  </div>
</body>
</html>"#
    )
}

/// Landing page with the submission form.
pub fn landing_page(submitted: bool) -> String {
    let notice = if submitted { "    <p><strong>Thanks, your message was saved.</strong></p>\n" } else { "" };
    let body = format!(
        r#"    <h1>Leave a message</h1>
{notice}    <form method="POST" action="/messages">
      <input name="author" placeholder="Your name (optional)"/>
      <textarea name="text" placeholder="Write a message..." required></textarea>
      <button type="submit">Post</button>
    </form>
    <p><a href="/messages-public">Read recent messages</a></p>"#
    );
    page("Guestbook", &body)
}

/// Full table for the protected listing, including source IP and user agent.
pub fn messages_table(messages: &[Message]) -> String {
    let mut rows = String::new();
    for m in messages {
        let _ = write!(
            rows,
            "\n        <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            when(&m.created_at),
            author_or_anonymous(m.author.as_deref()),
            escape_html(&m.text),
            escape_html(m.source_ip.as_deref().unwrap_or("")),
            escape_html(m.user_agent.as_deref().unwrap_or("")),
        );
    }
    if rows.is_empty() {
        rows.push_str(r#"<tr><td colspan="5">No messages yet.</td></tr>"#);
    }
    let body = format!(
        r#"    <h1>Messages</h1>
    <p><a href="/">&larr; Back to form</a></p>
    <table>
      <thead><tr><th>Time</th><th>Name</th><th>Message</th><th>IP</th><th>User agent</th></tr></thead>
      <tbody>{rows}</tbody>
    </table>"#
    );
    page("Messages (protected)", &body)
}

/// Redacted list for the public listing.
pub fn public_list(messages: &[PublicMessage]) -> String {
    let mut items = String::new();
    for m in messages {
        let _ = write!(
            items,
            "\n      <li>{}: {} <small>{}</small></li>",
            author_or_anonymous(m.author.as_deref()),
            escape_html(&m.text),
            when(&m.time),
        );
    }
    if items.is_empty() {
        items.push_str("<li><em>No messages yet.</em></li>");
    }
    let body = format!(
        r#"    <h1>Messages</h1>
    <ol>{items}</ol>
    <p><a href="/">&larr; Back home</a></p>"#
    );
    page("Messages", &body)
}
