use crate::models::{Post, StatKind, Stats};

/// User-supplied text goes in last, and braces in it are escaped, so it can
/// never be expanded as a placeholder.
pub fn render_index(user_name: &str, status: &Stats, posts: &[Post]) -> String {
    INDEX_HTML
        .replace("{{STATUS}}", &render_status(status))
        .replace("{{COUNT}}", &posts.len().to_string())
        .replace("{{TIMELINE}}", &render_timeline(posts))
        .replace("{{USER}}", &escape_html(user_name))
}

fn render_status(status: &Stats) -> String {
    let mut html = String::new();
    for kind in StatKind::ALL {
        html.push_str(&format!(
            r#"<div class="stat"><span class="label">{label}</span><span class="value">{value}</span><form method="post" action="/status/adjust">"#,
            label = kind.label(),
            value = status.get(kind),
        ));
        for amount in [1, 10, -1, -10] {
            html.push_str(&format!(
                r#"<button name="amount" value="{amount}">{amount:+}</button>"#
            ));
        }
        html.push_str(&format!(
            r#"<input type="hidden" name="stat" value="{}" /></form></div>"#,
            kind.key()
        ));
    }
    html
}

fn render_timeline(posts: &[Post]) -> String {
    if posts.is_empty() {
        return r#"<p class="empty">No entries yet.</p>"#.to_string();
    }

    let mut html = String::from("<ul class=\"timeline\">");
    for post in posts {
        let deltas: Vec<String> = StatKind::ALL
            .into_iter()
            .filter(|kind| post.parameters.get(*kind) != 0)
            .map(|kind| format!("{} {:+}", kind.label(), post.parameters.get(kind)))
            .collect();
        html.push_str(&format!(
            r#"<li><div class="when">{date} {time}</div><div class="episode">{episode}</div><div class="deltas">{deltas}</div>"#,
            date = post.date,
            time = post.time,
            episode = escape_html(&post.episode),
            deltas = deltas.join(" · "),
        ));
        if let Some(comment) = &post.ai_comment {
            html.push_str(&format!(
                r#"<div class="comment">{}</div>"#,
                escape_html(comment)
            ));
        }
        html.push_str(&format!(
            r#"<form method="post" action="/posts/{}/delete"><button>Delete</button></form></li>"#,
            escape_html(&post.id)
        ));
    }
    html.push_str("</ul>");
    html
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            _ => out.push(c),
        }
    }
    out
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>Diary</title>
  <style>
    body { font-family: sans-serif; max-width: 720px; margin: 0 auto; padding: 24px; }
    .status { display: grid; grid-template-columns: repeat(auto-fit, minmax(150px, 1fr)); gap: 12px; }
    .stat { border: 1px solid #ddd; border-radius: 8px; padding: 12px; }
    .stat .label { display: block; font-size: 0.8rem; text-transform: uppercase; color: #777; }
    .stat .value { display: block; font-size: 1.6rem; font-weight: 600; }
    .timeline { list-style: none; padding: 0; }
    .timeline li { border-bottom: 1px solid #eee; padding: 12px 0; }
    .when, .deltas { color: #777; font-size: 0.85rem; }
    .comment { background: #f4f8fb; border-radius: 6px; padding: 6px 10px; margin-top: 6px; }
    textarea { width: 100%; min-height: 80px; }
  </style>
</head>
<body>
  <h1>{{USER}}</h1>
  <section class="status">{{STATUS}}</section>

  <h2>New entry</h2>
  <form method="post" action="/posts">
    <textarea name="episode" required></textarea>
    <label>Health <input name="health" inputmode="numeric" /></label>
    <label>Happiness <input name="happiness" inputmode="numeric" /></label>
    <label>Mental state <input name="mentalState" inputmode="numeric" /></label>
    <label>Hunger <input name="hunger" inputmode="numeric" /></label>
    <button type="submit">Post</button>
  </form>

  <h2>Timeline ({{COUNT}})</h2>
  {{TIMELINE}}
</body>
</html>
"#;
