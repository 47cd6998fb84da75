use std::collections::HashSet;

use anyhow::Result;

use crate::{
    data_formats::{FormErrors, ProfileInput, RegisterRequest, NON_FIELD},
    models::{CommentView, PostView, ProfileDetail},
};

use super::{
    attr, error_slots, escape, fill, layout, media_url, multiline, path_segment, timestamp,
    with_slots, PageContext,
};

/// How much of a post card to show for the current viewer.
pub struct CardOptions<'a> {
    pub viewer_id: i64,
    /// Authors the viewer follows; marked with a badge.
    pub following: Option<&'a HashSet<i64>>,
    /// Render the inline comment form that posts to `/post/{id}/comment/`.
    pub comment_form: bool,
}

// ----------------- Auth Pages -----------------

pub fn register_page(ctx: &PageContext, form: &RegisterRequest, errors: &FormErrors) -> Result<String> {
    let slots = error_slots(
        errors,
        &[NON_FIELD, "username", "email", "first_name", "last_name", "password1", "password2"],
    );
    let (username, email) = (attr(&form.username), attr(&form.email));
    let (first_name, last_name) = (attr(&form.first_name), attr(&form.last_name));
    let content = fill(
        "register.html",
        &with_slots(
            &[
                ("username", username.as_str()),
                ("email", email.as_str()),
                ("first_name", first_name.as_str()),
                ("last_name", last_name.as_str()),
            ],
            &slots,
        ),
    )?;
    layout(ctx, "Register", &content)
}

pub fn login_page(
    ctx: &PageContext,
    username: &str,
    next: Option<&str>,
    errors: &FormErrors,
) -> Result<String> {
    let slots = error_slots(errors, &[NON_FIELD, "username", "password"]);
    let username = attr(username);
    let next = attr(next.unwrap_or_default());
    let content = fill(
        "login.html",
        &with_slots(
            &[("username", username.as_str()), ("next", next.as_str())],
            &slots,
        ),
    )?;
    layout(ctx, "Log in", &content)
}

// ----------------- Posts -----------------

fn comment_form(post_id: i64, action: &str, draft: &str, errors: &FormErrors) -> Result<String> {
    let slots = error_slots(errors, &["content"]);
    let post_id = post_id.to_string();
    let draft = escape(draft);
    fill(
        "comment_form.html",
        &with_slots(
            &[
                ("post_id", post_id.as_str()),
                ("action", action),
                ("content", draft.as_str()),
            ],
            &slots,
        ),
    )
}

pub fn post_card(post: &PostView, options: &CardOptions) -> Result<String> {
    let id = post.id.to_string();
    let badge = match options.following {
        Some(following) if following.contains(&post.author_id) => {
            r#"<span class="badge">following</span>"#
        }
        _ => "",
    };
    let image = match &post.image {
        Some(path) => format!(r#"<img class="post-image" src="{}" alt="">"#, media_url(Some(path))),
        None => String::new(),
    };
    let owner_links = if post.author_id == options.viewer_id {
        format!(
            r#"<a href="/post/{id}/edit/">Edit</a> <a href="/post/{id}/delete/">Delete</a>"#,
            id = post.id
        )
    } else {
        String::new()
    };
    let comment_form = if options.comment_form {
        comment_form(post.id, &format!("/post/{}/comment/", post.id), "", &FormErrors::default())?
    } else {
        String::new()
    };
    fill(
        "post_card.html",
        &[
            ("id", &id),
            ("author_pic", &media_url(post.author_pic.as_deref())),
            ("author_path", &path_segment(&post.author_username)),
            ("author", &escape(&post.author_username)),
            ("badge", badge),
            ("created_at", &timestamp(&post.created_at)),
            ("content", &multiline(&post.content)),
            ("image", &image),
            ("like_label", if post.liked { "Unlike" } else { "Like" }),
            ("likes_count", &post.likes_count.to_string()),
            ("comments_count", &post.comments_count.to_string()),
            ("owner_links", &owner_links),
            ("comment_form", &comment_form),
        ],
    )
}

fn post_list(posts: &[PostView], options: &CardOptions) -> Result<String> {
    if posts.is_empty() {
        return Ok(r#"<p class="card muted">No posts yet.</p>"#.to_owned());
    }
    posts.iter().map(|post| post_card(post, options)).collect()
}

pub fn feed_page(
    ctx: &PageContext,
    posts: &[PostView],
    viewer_id: i64,
    following: &HashSet<i64>,
) -> Result<String> {
    let options = CardOptions {
        viewer_id,
        following: Some(following),
        comment_form: true,
    };
    let content = fill("feed.html", &[("posts", &post_list(posts, &options)?)])?;
    layout(ctx, "Feed", &content)
}

pub fn post_detail_page(
    ctx: &PageContext,
    post: &PostView,
    comments: &[CommentView],
    viewer_id: i64,
    draft: &str,
    errors: &FormErrors,
) -> Result<String> {
    let options = CardOptions {
        viewer_id,
        following: None,
        comment_form: false,
    };
    let mut listing: String = comments
        .iter()
        .map(|c| {
            format!(
                r#"<div class="actions"><img class="avatar" src="{}" alt=""><div><a href="/profile/{}/">{}</a> <span class="muted">{}</span><p>{}</p></div></div>"#,
                media_url(c.author_pic.as_deref()),
                path_segment(&c.author_username),
                escape(&c.author_username),
                timestamp(&c.created_at),
                multiline(&c.content)
            )
        })
        .collect();
    if comments.is_empty() {
        listing.push_str(r#"<p class="muted">No comments yet.</p>"#);
    }
    listing.push_str(&comment_form(post.id, &format!("/post/{}/", post.id), draft, errors)?);

    let content = fill(
        "post_detail.html",
        &[("post", &post_card(post, &options)?), ("comments", &listing)],
    )?;
    layout(ctx, "Post", &content)
}

pub enum PostFormTarget<'a> {
    Create,
    Edit { id: i64, current_image: Option<&'a str> },
}

pub fn post_form_page(
    ctx: &PageContext,
    target: PostFormTarget,
    content: &str,
    errors: &FormErrors,
) -> Result<String> {
    let slots = error_slots(errors, &[NON_FIELD, "content", "image"]);
    let (heading, action, submit, cancel, current_image) = match target {
        PostFormTarget::Create => (
            "Create post",
            "/post/create/".to_owned(),
            "Post",
            "/".to_owned(),
            String::new(),
        ),
        PostFormTarget::Edit { id, current_image } => (
            "Edit post",
            format!("/post/{}/edit/", id),
            "Save",
            format!("/post/{}/", id),
            match current_image {
                Some(path) => format!(
                    r#"<p class="muted">Currently: <a href="{url}">{name}</a> <label class="inline"><input type="checkbox" name="image-clear"> Clear</label></p>"#,
                    url = media_url(Some(path)),
                    name = escape(path)
                ),
                None => String::new(),
            },
        ),
    };
    let content = escape(content);
    let page = fill(
        "post_form.html",
        &with_slots(
            &[
                ("heading", heading),
                ("action", action.as_str()),
                ("content", content.as_str()),
                ("current_image", current_image.as_str()),
                ("submit_label", submit),
                ("cancel_href", cancel.as_str()),
            ],
            &slots,
        ),
    )?;
    layout(ctx, heading, &page)
}

/// GET side of a two-step delete.
pub fn confirm_page(
    ctx: &PageContext,
    heading: &str,
    question: &str,
    action: &str,
    cancel_href: &str,
) -> Result<String> {
    let content = fill(
        "confirm.html",
        &[
            ("heading", &escape(heading)),
            ("question", &escape(question)),
            ("action", &attr(action)),
            ("cancel_href", &attr(cancel_href)),
        ],
    )?;
    layout(ctx, heading, &content)
}

// ----------------- Profiles -----------------

pub fn profile_page(ctx: &PageContext, detail: &ProfileDetail, posts: &[PostView], viewer_id: i64) -> Result<String> {
    let user = &detail.user;
    let actions = if user.id == viewer_id {
        r#"<a href="/profile/edit/">Edit profile</a>"#.to_owned()
    } else {
        format!(
            r#"<form method="post" action="/profile/{}/follow/"><button type="submit">{}</button></form>"#,
            path_segment(&user.username),
            if detail.is_following { "Unfollow" } else { "Follow" }
        )
    };
    let full_name = format!("{} {}", user.first_name, user.last_name);
    let options = CardOptions {
        viewer_id,
        following: None,
        comment_form: false,
    };
    let content = fill(
        "profile.html",
        &[
            ("profile_pic", &media_url(Some(&detail.profile.profile_pic))),
            ("username", &escape(&user.username)),
            ("full_name", &escape(full_name.trim())),
            ("posts_count", &posts.len().to_string()),
            ("followers_count", &detail.followers_count.to_string()),
            ("following_count", &detail.following_count.to_string()),
            ("bio", &multiline(&detail.profile.bio)),
            ("profile_actions", &actions),
            ("posts", &post_list(posts, &options)?),
        ],
    )?;
    layout(ctx, &user.username, &content)
}

pub fn edit_profile_page(
    ctx: &PageContext,
    username: &str,
    input: &ProfileInput,
    current_pic: &str,
    errors: &FormErrors,
) -> Result<String> {
    let slots = error_slots(
        errors,
        &[NON_FIELD, "first_name", "last_name", "email", "bio", "profile_pic"],
    );
    let clear = if current_pic == crate::models::DEFAULT_PROFILE_PIC {
        String::new()
    } else {
        r#"<label class="inline"><input type="checkbox" name="profile_pic-clear"> Clear</label>"#.to_owned()
    };
    let first_name = attr(&input.first_name);
    let last_name = attr(&input.last_name);
    let email = attr(&input.email);
    let bio = escape(&input.bio);
    let profile_pic = media_url(Some(current_pic));
    let username_path = path_segment(username);
    let content = fill(
        "edit_profile.html",
        &with_slots(
            &[
                ("first_name", first_name.as_str()),
                ("last_name", last_name.as_str()),
                ("email", email.as_str()),
                ("bio", bio.as_str()),
                ("profile_pic", profile_pic.as_str()),
                ("clear_profile_pic", clear.as_str()),
                ("username_path", username_path.as_str()),
            ],
            &slots,
        ),
    )?;
    layout(ctx, "Edit profile", &content)
}

// ----------------- Error Pages -----------------

fn error_page(title: &str, detail: &str) -> String {
    fill("error.html", &[("title", &escape(title)), ("detail", &escape(detail))])
        .unwrap_or_else(|_| format!("{}: {}", title, detail))
}

pub fn not_found_page() -> String {
    error_page("Not Found", "The requested resource was not found on this server.")
}

pub fn bad_request_page(message: &str) -> String {
    error_page("Bad Request", message)
}

pub fn server_error_page() -> String {
    error_page("Server Error", "Something went wrong. Please try again later.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Profile, User, DEFAULT_PROFILE_PIC};
    use chrono::NaiveDate;

    fn at() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(12, 30, 0))
            .unwrap()
    }

    fn post(id: i64, author_id: i64, author: &str) -> PostView {
        PostView {
            id,
            author_id,
            author_username: author.into(),
            author_pic: None,
            content: "hello <world>\nsecond line".into(),
            image: None,
            created_at: at(),
            likes_count: 2,
            comments_count: 1,
            liked: true,
        }
    }

    fn viewer() -> PageContext {
        PageContext {
            username: Some("bob".into()),
            ..Default::default()
        }
    }

    #[test]
    fn feed_marks_followed_authors_and_own_posts() {
        let following: HashSet<i64> = [1].into_iter().collect();
        let page = feed_page(&viewer(), &[post(10, 1, "alice"), post(11, 2, "bob")], 2, &following).unwrap();
        assert_eq!(page.matches(r#"<span class="badge">following</span>"#).count(), 1);
        assert!(page.contains(r#"href="/post/11/edit/""#));
        assert!(!page.contains(r#"href="/post/10/edit/""#));
        assert!(page.contains(r#"action="/post/10/comment/""#));
        assert!(page.contains("hello &lt;world&gt;<br>second line"));
        assert!(page.contains(">Unlike<"));
    }

    #[test]
    fn empty_feed_says_so() {
        let page = feed_page(&viewer(), &[], 2, &HashSet::new()).unwrap();
        assert!(page.contains("No posts yet."));
    }

    #[test]
    fn register_page_keeps_values_but_never_passwords() {
        let form = RegisterRequest {
            username: "al\"ice".into(),
            password1: "secret-one".into(),
            password2: "secret-one".into(),
            ..Default::default()
        };
        let errors = FormErrors::single("email", "This field is required.");
        let page = register_page(&PageContext::default(), &form, &errors).unwrap();
        assert!(page.contains(r#"value="al&quot;ice""#));
        assert!(!page.contains("secret-one"));
        assert!(page.contains("This field is required."));
    }

    #[test]
    fn post_detail_posts_comments_back_to_itself() {
        let comment = CommentView {
            id: 1,
            post_id: 10,
            author_username: "carol".into(),
            author_pic: None,
            content: "nice".into(),
            created_at: at(),
        };
        let errors = FormErrors::single("content", "This field is required.");
        let page = post_detail_page(&viewer(), &post(10, 1, "alice"), &[comment], 2, "", &errors).unwrap();
        assert!(page.contains(r#"action="/post/10/""#));
        assert!(page.contains("nice"));
        assert!(page.contains("errorlist"));
    }

    #[test]
    fn edit_form_offers_clearing_the_current_image() {
        let page = post_form_page(
            &viewer(),
            PostFormTarget::Edit {
                id: 4,
                current_image: Some("post_images/cat.png"),
            },
            "text",
            &FormErrors::default(),
        )
        .unwrap();
        assert!(page.contains(r#"name="image-clear""#));
        assert!(page.contains(r#"action="/post/4/edit/""#));

        let create = post_form_page(&viewer(), PostFormTarget::Create, "", &FormErrors::default()).unwrap();
        assert!(!create.contains("image-clear"));
    }

    #[test]
    fn profile_page_shows_follow_button_to_others_only() {
        let detail = ProfileDetail {
            user: User {
                id: 1,
                username: "alice".into(),
                email: String::new(),
                first_name: "Alice".into(),
                last_name: String::new(),
                password: String::new(),
                is_active: true,
                is_staff: false,
                date_joined: at(),
                last_login: None,
            },
            profile: Profile {
                id: 1,
                user_id: 1,
                bio: String::new(),
                profile_pic: DEFAULT_PROFILE_PIC.into(),
                created_at: at(),
            },
            is_following: true,
            followers_count: 1,
            following_count: 0,
        };
        let other = profile_page(&viewer(), &detail, &[], 2).unwrap();
        assert!(other.contains(r#"action="/profile/alice/follow/""#));
        assert!(other.contains(">Unfollow<"));
        let own = profile_page(&viewer(), &detail, &[], 1).unwrap();
        assert!(own.contains(r#"href="/profile/edit/""#));
        assert!(!own.contains("/follow/"));
    }

    #[test]
    fn error_pages_always_render() {
        assert!(not_found_page().contains("Not Found"));
        assert!(bad_request_page("<bad>").contains("&lt;bad&gt;"));
        assert!(server_error_page().contains("Server Error"));
    }
}
