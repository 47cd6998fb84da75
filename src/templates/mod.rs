pub mod admin;
pub mod pages;

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use rust_embed::RustEmbed;

use crate::{
    data_formats::FormErrors,
    flash::FlashMessage,
    models::DEFAULT_PROFILE_PIC,
};

#[derive(RustEmbed)]
#[folder = "templates/"]
struct Templates;

/// Who is looking at the page, plus the flash messages drained for it.
#[derive(Debug, Default, Clone)]
pub struct PageContext {
    pub username: Option<String>,
    pub is_staff: bool,
    pub messages: Vec<FlashMessage>,
}

fn load(name: &str) -> Result<String> {
    let file = Templates::get(name).with_context(|| format!("template {} not found", name))?;
    let text = std::str::from_utf8(&file.data).with_context(|| format!("template {} is not utf-8", name))?;
    Ok(text.to_owned())
}

/// Replaces every `{{key}}` in the template with its value in one pass, so
/// placeholders inside substituted values are left alone. Values are inserted
/// verbatim; escape them first.
pub fn fill(name: &str, vars: &[(&str, &str)]) -> Result<String> {
    let template = load(name)?;
    let mut out = String::with_capacity(template.len());
    let mut rest = template.as_str();
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = match after.find("}}") {
            Some(end) => end,
            None => bail!("template {} has an unclosed placeholder", name),
        };
        let key = after[..end].trim();
        match vars.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => bail!("template {} needs a value for {}", name, key),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

/// Wraps page content in the site layout.
pub fn layout(ctx: &PageContext, title: &str, content: &str) -> Result<String> {
    fill(
        "base.html",
        &[
            ("title", &escape(title)),
            ("nav", &nav(ctx)),
            ("messages", &messages(ctx)),
            ("content", content),
        ],
    )
}

fn nav(ctx: &PageContext) -> String {
    match &ctx.username {
        Some(username) => {
            let admin = if ctx.is_staff {
                r#"<a href="/admin/">Admin</a>"#
            } else {
                ""
            };
            format!(
                r#"<a href="/">Feed</a><a href="/post/create/">New post</a><a href="/profile/{}/">{}</a>{}<span class="spacer"></span><form method="post" action="/logout/"><button type="submit">Log out</button></form>"#,
                path_segment(username),
                escape(username),
                admin
            )
        }
        None => r#"<a href="/">SocialApp</a><span class="spacer"></span><a href="/login/">Log in</a><a href="/register/">Register</a>"#
            .to_owned(),
    }
}

fn messages(ctx: &PageContext) -> String {
    if ctx.messages.is_empty() {
        return String::new();
    }
    let items: String = ctx
        .messages
        .iter()
        .map(|m| format!(r#"<li class="{}">{}</li>"#, m.level.as_str(), escape(&m.text)))
        .collect();
    format!(r#"<ul class="messages">{}</ul>"#, items)
}

// ----------------- Escaping -----------------

pub fn escape(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

pub fn attr(value: &str) -> String {
    html_escape::encode_double_quoted_attribute(value).into_owned()
}

/// Escaped text with line breaks kept.
pub fn multiline(text: &str) -> String {
    escape(text).replace('\n', "<br>")
}

pub fn path_segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

pub fn media_url(path: Option<&str>) -> String {
    let path = path.filter(|p| !p.is_empty()).unwrap_or(DEFAULT_PROFILE_PIC);
    let encoded: Vec<String> = path.split('/').map(path_segment).collect();
    format!("/media/{}", encoded.join("/"))
}

pub fn timestamp(at: &NaiveDateTime) -> String {
    at.format("%b %-d, %Y, %H:%M").to_string()
}

// ----------------- Form Errors -----------------

pub fn field_errors(errors: &FormErrors, field: &str) -> String {
    let items: String = errors
        .for_field(field)
        .map(|m| format!("<li>{}</li>", escape(m)))
        .collect();
    if items.is_empty() {
        String::new()
    } else {
        format!(r#"<ul class="errorlist">{}</ul>"#, items)
    }
}

/// `(placeholder, rendered errors)` for each field, keyed as `{field}_errors`.
pub fn error_slots(errors: &FormErrors, fields: &[&str]) -> Vec<(String, String)> {
    fields
        .iter()
        .map(|field| {
            let key = if *field == crate::data_formats::NON_FIELD {
                "non_field_errors".to_owned()
            } else {
                format!("{}_errors", field)
            };
            (key, field_errors(errors, field))
        })
        .collect()
}

/// Joins owned slots and borrowed pairs into the slice `fill` wants.
pub fn with_slots<'a>(
    vars: &[(&'a str, &'a str)],
    slots: &'a [(String, String)],
) -> Vec<(&'a str, &'a str)> {
    vars.iter()
        .copied()
        .chain(slots.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::Level;

    #[test]
    fn fill_is_single_pass() {
        let page = fill(
            "error.html",
            &[("title", "{{detail}}"), ("detail", "<b>")],
        )
        .unwrap();
        assert!(page.contains("<h1>{{detail}}</h1>"));
        assert!(page.contains("<p><b></p>"));
    }

    #[test]
    fn missing_values_are_reported() {
        let err = fill("error.html", &[("title", "x")]).unwrap_err();
        assert!(err.to_string().contains("detail"));
        assert!(fill("nope.html", &[]).is_err());
    }

    #[test]
    fn layout_escapes_messages_and_shows_staff_link() {
        let ctx = PageContext {
            username: Some("al<i>ce".into()),
            is_staff: true,
            messages: vec![FlashMessage {
                level: Level::Warning,
                text: "<script>".into(),
            }],
        };
        let page = layout(&ctx, "Feed", "<p>body</p>").unwrap();
        assert!(page.contains(r#"<li class="warning">&lt;script&gt;</li>"#));
        assert!(page.contains("al&lt;i&gt;ce"));
        assert!(page.contains(r#"href="/admin/""#));
        assert!(page.contains("<p>body</p>"));

        let anonymous = layout(&PageContext::default(), "Log in", "").unwrap();
        assert!(anonymous.contains(r#"href="/register/""#));
        assert!(!anonymous.contains("/admin/"));
    }

    #[test]
    fn media_urls_fall_back_to_the_default_avatar() {
        assert_eq!(media_url(None), "/media/profile_pics/default-avatar.png");
        assert_eq!(media_url(Some("post_images/my cat.png")), "/media/post_images/my%20cat.png");
    }

    #[test]
    fn field_errors_render_only_for_their_field() {
        let errors = FormErrors::single("content", "This field is required.");
        assert!(field_errors(&errors, "content").contains("errorlist"));
        assert_eq!(field_errors(&errors, "image"), "");
    }
}
