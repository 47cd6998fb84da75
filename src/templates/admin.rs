use anyhow::Result;

use crate::{
    data_formats::{AdminUserInput, FormErrors, NON_FIELD},
    db_helpers::{AdminCommentRow, AdminEntity, AdminFollowRow, AdminPostRow},
    models::{User, DEFAULT_PROFILE_PIC},
};

use super::{
    attr, error_slots, escape, fill, layout, media_url, timestamp, with_slots, PageContext,
};

const PREVIEW_CHARS: usize = 60;

fn preview(text: &str) -> String {
    let mut short: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        short.push('…');
    }
    escape(&short)
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub fn index_page(ctx: &PageContext, counts: &[(AdminEntity, i64)]) -> Result<String> {
    let rows: String = counts
        .iter()
        .map(|(entity, count)| {
            format!(
                r#"<tr><td><a href="/admin/{}/">{}</a></td><td>{}</td></tr>"#,
                entity.slug(),
                entity.label(),
                count
            )
        })
        .collect();
    let content = fill("admin/index.html", &[("rows", &rows)])?;
    layout(ctx, "Site administration", &content)
}

/// A change list. Each row is `(id, already escaped cells)`.
fn list_page(
    ctx: &PageContext,
    entity: AdminEntity,
    query: Option<&str>,
    headers: &[&str],
    rows: Vec<(i64, Vec<String>)>,
) -> Result<String> {
    let search = match query {
        Some(q) => format!(
            r#"<form method="get" action="/admin/{}/" class="actions"><input type="search" name="q" value="{}"><button type="submit">Search</button></form>"#,
            entity.slug(),
            attr(q)
        ),
        None => String::new(),
    };
    let headers: String = headers.iter().map(|h| format!("<th>{}</th>", h)).collect();
    let count = rows.len().to_string();
    let rows: String = rows
        .into_iter()
        .map(|(id, cells)| {
            let cells: String = cells.iter().map(|c| format!("<td>{}</td>", c)).collect();
            format!(
                r#"<tr>{}<td><form method="post" action="/admin/{}/{}/delete/" class="inline"><button type="submit">Delete</button></form></td></tr>"#,
                cells,
                entity.slug(),
                id
            )
        })
        .collect();
    let content = fill(
        "admin/list.html",
        &[
            ("heading", entity.label()),
            ("search", &search),
            ("count", &count),
            ("headers", &headers),
            ("rows", &rows),
        ],
    )?;
    layout(ctx, entity.label(), &content)
}

pub fn users_page(ctx: &PageContext, users: &[User], query: &str) -> Result<String> {
    let rows = users
        .iter()
        .map(|u| {
            (
                u.id,
                vec![
                    format!(r#"<a href="/admin/users/{}/">{}</a>"#, u.id, escape(&u.username)),
                    escape(&u.email),
                    escape(&u.first_name),
                    escape(&u.last_name),
                    yes_no(u.is_staff).to_owned(),
                ],
            )
        })
        .collect();
    list_page(
        ctx,
        AdminEntity::Users,
        Some(query),
        &["Username", "Email", "First name", "Last name", "Staff"],
        rows,
    )
}

pub fn posts_page(ctx: &PageContext, posts: &[AdminPostRow], query: &str) -> Result<String> {
    let rows = posts
        .iter()
        .map(|p| {
            (
                p.id,
                vec![
                    escape(&p.author_username),
                    format!(r#"<a href="/post/{}/">{}</a>"#, p.id, preview(&p.content)),
                    timestamp(&p.created_at),
                ],
            )
        })
        .collect();
    list_page(ctx, AdminEntity::Posts, Some(query), &["Author", "Content", "Created"], rows)
}

pub fn comments_page(ctx: &PageContext, comments: &[AdminCommentRow], query: &str) -> Result<String> {
    let rows = comments
        .iter()
        .map(|c| {
            (
                c.id,
                vec![
                    escape(&c.author_username),
                    format!(r#"<a href="/post/{}/">{}</a>"#, c.post_id, preview(&c.post_content)),
                    preview(&c.content),
                    timestamp(&c.created_at),
                ],
            )
        })
        .collect();
    list_page(
        ctx,
        AdminEntity::Comments,
        Some(query),
        &["Author", "Post", "Content", "Created"],
        rows,
    )
}

pub fn follows_page(ctx: &PageContext, follows: &[AdminFollowRow]) -> Result<String> {
    let rows = follows
        .iter()
        .map(|f| {
            (
                f.id,
                vec![
                    escape(&f.follower_username),
                    escape(&f.following_username),
                    timestamp(&f.created_at),
                ],
            )
        })
        .collect();
    list_page(ctx, AdminEntity::Follows, None, &["Follower", "Following", "Created"], rows)
}

/// `current_pic` is the stored picture, shown until a new one is saved.
pub fn user_form_page(
    ctx: &PageContext,
    user_id: i64,
    form: &AdminUserInput,
    current_pic: &str,
    errors: &FormErrors,
) -> Result<String> {
    let slots = error_slots(
        errors,
        &[NON_FIELD, "username", "email", "first_name", "last_name", "profile_pic"],
    );
    let checked = |flag: bool| if flag { "checked" } else { "" };
    let clear = if current_pic == DEFAULT_PROFILE_PIC {
        ""
    } else {
        r#"<label class="inline"><input type="checkbox" name="profile_pic-clear"> Clear</label>"#
    };
    let id = user_id.to_string();
    let username = attr(&form.username);
    let email = attr(&form.email);
    let first_name = attr(&form.first_name);
    let last_name = attr(&form.last_name);
    let bio = escape(&form.bio);
    let profile_pic = media_url(Some(current_pic));
    let content = fill(
        "admin/user_form.html",
        &with_slots(
            &[
                ("id", id.as_str()),
                ("username", username.as_str()),
                ("email", email.as_str()),
                ("first_name", first_name.as_str()),
                ("last_name", last_name.as_str()),
                ("is_active", checked(form.is_active)),
                ("is_staff", checked(form.is_staff)),
                ("bio", bio.as_str()),
                ("profile_pic", profile_pic.as_str()),
                ("clear_profile_pic", clear),
            ],
            &slots,
        ),
    )?;
    layout(ctx, "Change user", &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn staff() -> PageContext {
        PageContext {
            username: Some("root".into()),
            is_staff: true,
            messages: Vec::new(),
        }
    }

    #[test]
    fn index_links_every_entity() {
        let counts: Vec<(AdminEntity, i64)> = AdminEntity::ALL.iter().map(|e| (*e, 3)).collect();
        let page = index_page(&staff(), &counts).unwrap();
        for entity in AdminEntity::ALL {
            assert!(page.contains(&format!(r#"href="/admin/{}/""#, entity.slug())));
        }
    }

    #[test]
    fn post_list_has_search_and_delete_buttons() {
        let rows = [AdminPostRow {
            id: 7,
            author_username: "alice".into(),
            content: "x".repeat(100),
            created_at: NaiveDate::from_ymd_opt(2024, 1, 2)
                .and_then(|d| d.and_hms_opt(3, 4, 5))
                .unwrap(),
        }];
        let page = posts_page(&staff(), &rows, "al\"").unwrap();
        assert!(page.contains(r#"value="al&quot;""#));
        assert!(page.contains(r#"action="/admin/posts/7/delete/""#));
        assert!(page.contains(&format!("{}…", "x".repeat(PREVIEW_CHARS))));
    }

    #[test]
    fn follow_list_has_no_search_box() {
        let page = follows_page(&staff(), &[]).unwrap();
        assert!(!page.contains(r#"name="q""#));
        assert!(page.contains("0 shown"));
    }

    #[test]
    fn user_form_reflects_checkboxes() {
        let form = AdminUserInput {
            username: "bob".into(),
            is_staff: true,
            ..Default::default()
        };
        let page =
            user_form_page(&staff(), 2, &form, DEFAULT_PROFILE_PIC, &FormErrors::default()).unwrap();
        assert!(page.contains(r#"name="is_staff" checked"#));
        assert!(page.contains(r#"name="is_active" >"#));
        assert!(page.contains(r#"action="/admin/users/2/delete/""#));
        assert!(page.contains(r#"enctype="multipart/form-data""#));
        assert!(!page.contains("profile_pic-clear"));
    }

    #[test]
    fn user_form_shows_a_custom_picture_with_a_clear_box() {
        let form = AdminUserInput {
            username: "bob".into(),
            ..Default::default()
        };
        let errors = FormErrors::single("profile_pic", "bad image");
        let page = user_form_page(&staff(), 2, &form, "profile_pics/bob.png", &errors).unwrap();
        assert!(page.contains(r#"src="/media/profile_pics/bob.png""#));
        assert!(page.contains(r#"name="profile_pic-clear""#));
        assert!(page.contains("bad image"));
    }
}
