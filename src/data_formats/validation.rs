use std::collections::HashMap;

use email_address::EmailAddress;

use super::{AdminUserInput, CommentRequest, PostInput, ProfileInput, RegisterRequest, UploadedFile};

pub const NON_FIELD: &str = "__all__";
pub const REQUIRED: &str = "This field is required.";
pub const USERNAME_TAKEN: &str = "A user with that username already exists.";
pub const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";
const INVALID_USERNAME: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
const RESERVED_USERNAME: &str = "This username is reserved.";
const INVALID_EMAIL: &str = "Enter a valid email address.";
const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

const MAX_NAME_LEN: usize = 150;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_SIMILARITY: f64 = 0.7;
// Literal path segments under /profile/ that a username would shadow.
const RESERVED_USERNAMES: [&str; 2] = ["edit", "delete"];
const COMMON_PASSWORDS: [&str; 24] = [
    "password", "password1", "password123", "12345678", "123456789", "1234567890",
    "qwerty123", "qwertyuiop", "iloveyou", "sunshine", "princess", "football",
    "baseball", "welcome1", "abc12345", "trustno1", "letmein1", "passw0rd",
    "superman", "starwars", "whatever", "11111111", "00000000", "dragon123",
];

/// Ordered field errors. `NON_FIELD` collects errors that belong to no single input.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormErrors(Vec<(String, String)>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push((field.to_owned(), message.into()));
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(f, _)| f == field)
            .map(|(_, message)| message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(f, m)| (f.as_str(), m.as_str()))
    }

    fn finish<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// What to do with an optional image field on save.
#[derive(Debug, Clone)]
pub enum ImageChange {
    Keep,
    Clear,
    Replace(UploadedFile),
}

#[derive(Debug, Clone)]
pub struct ValidPost {
    pub content: String,
    pub image: ImageChange,
}

#[derive(Debug, Clone)]
pub struct ValidProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub bio: String,
    pub profile_pic: ImageChange,
}

#[derive(Debug, Clone)]
pub struct ValidAdminUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub bio: String,
    pub profile_pic: ImageChange,
}

// ----------------- Field Rules -----------------

fn check_username(errors: &mut FormErrors, username: &str) {
    if username.is_empty() {
        errors.add("username", REQUIRED);
    } else if username.chars().count() > MAX_NAME_LEN
        || !username
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        errors.add("username", INVALID_USERNAME);
    } else if RESERVED_USERNAMES.contains(&username.to_lowercase().as_str()) {
        errors.add("username", RESERVED_USERNAME);
    }
}

fn check_name(errors: &mut FormErrors, field: &str, value: &str) {
    if value.chars().count() > MAX_NAME_LEN {
        errors.add(
            field,
            format!("Ensure this value has at most {} characters.", MAX_NAME_LEN),
        );
    }
}

fn check_email(errors: &mut FormErrors, email: &str, required: bool) {
    if email.is_empty() {
        if required {
            errors.add("email", REQUIRED);
        }
    } else if !EmailAddress::is_valid(email) {
        errors.add("email", INVALID_EMAIL);
    }
}

/// Strength rules applied to a new password.
pub fn password_problems(password: &str, personal: &[(&str, &str)]) -> Vec<String> {
    let mut problems = Vec::new();
    let lowered = password.to_lowercase();
    for (label, value) in personal {
        if is_too_similar(&lowered, value) {
            problems.push(format!("The password is too similar to the {}.", label));
            break;
        }
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        problems.push(format!(
            "This password is too short. It must contain at least {} characters.",
            MIN_PASSWORD_LEN
        ));
    }
    if COMMON_PASSWORDS.contains(&lowered.as_str()) {
        problems.push("This password is too common.".to_owned());
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_owned());
    }
    problems
}

fn is_too_similar(password: &str, attribute: &str) -> bool {
    let attribute = attribute.to_lowercase();
    // Mail domains are shared by everyone; only the mailbox name is personal.
    let local = attribute.split('@').next().unwrap_or_default();
    let too_similar = [attribute.as_str(), local]
        .into_iter()
        .chain(local.split(|c: char| !c.is_alphanumeric()))
        .filter(|part| !part.is_empty())
        .filter(|part| !dwarfed_by(password, part))
        .any(|part| similarity(password, part) >= MAX_SIMILARITY);
    too_similar
}

/// Upper bound on the matching-block ratio of two strings: twice the size of
/// their character multiset intersection over their combined length.
fn similarity(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 0.0;
    }
    let mut available: HashMap<char, usize> = HashMap::new();
    for c in b.chars() {
        *available.entry(c).or_default() += 1;
    }
    let matches = a
        .chars()
        .filter(|c| match available.get_mut(c) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        })
        .count();
    2.0 * matches as f64 / total as f64
}

// A short attribute inside a much longer password can't make it guessable.
fn dwarfed_by(password: &str, part: &str) -> bool {
    let password_len = password.chars().count();
    let part_len = part.chars().count();
    password_len >= 10 * part_len && (part_len as f64) < MAX_SIMILARITY / 2.0 * password_len as f64
}

fn check_image(errors: &mut FormErrors, field: &str, file: &UploadedFile) {
    if !looks_like_image(file) {
        errors.add(field, INVALID_IMAGE);
    }
}

/// The name must map to an image type and the bytes must start with a
/// matching signature.
pub fn looks_like_image(file: &UploadedFile) -> bool {
    let by_name = mime_guess::from_path(&file.file_name)
        .first()
        .map(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .unwrap_or(false);
    let data = file.data.as_ref();
    let by_magic = data.starts_with(b"\x89PNG\r\n\x1a\n")
        || data.starts_with(&[0xFF, 0xD8, 0xFF])
        || data.starts_with(b"GIF87a")
        || data.starts_with(b"GIF89a")
        || data.starts_with(b"BM")
        || (data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP");
    by_name && by_magic
}

fn image_change(
    errors: &mut FormErrors,
    field: &str,
    upload: &Option<UploadedFile>,
    clear: bool,
) -> ImageChange {
    match upload {
        Some(file) => {
            check_image(errors, field, file);
            ImageChange::Replace(file.clone())
        }
        None if clear => ImageChange::Clear,
        None => ImageChange::Keep,
    }
}

// ----------------- Forms -----------------

pub fn validate_registration(request: &RegisterRequest) -> Result<ValidRegistration, FormErrors> {
    let mut errors = FormErrors::default();
    let username = request.username.trim();
    let email = request.email.trim();
    let first_name = request.first_name.trim();
    let last_name = request.last_name.trim();

    check_username(&mut errors, username);
    check_email(&mut errors, email, true);
    check_name(&mut errors, "first_name", first_name);
    check_name(&mut errors, "last_name", last_name);

    if request.password1.is_empty() {
        errors.add("password1", REQUIRED);
    }
    if request.password2.is_empty() {
        errors.add("password2", REQUIRED);
    } else if !request.password1.is_empty() && request.password1 != request.password2 {
        errors.add("password2", PASSWORD_MISMATCH);
    } else if !request.password1.is_empty() {
        let personal = [
            ("username", username),
            ("email address", email),
            ("first name", first_name),
            ("last name", last_name),
        ];
        for problem in password_problems(&request.password2, &personal) {
            errors.add("password2", problem);
        }
    }

    errors.finish(ValidRegistration {
        username: username.to_owned(),
        email: email.to_owned(),
        first_name: first_name.to_owned(),
        last_name: last_name.to_owned(),
        password: request.password1.clone(),
    })
}

/// Shape check only; the credential match happens against the store.
pub fn validate_login(username: &str, password: &str) -> Result<Credentials, FormErrors> {
    let mut errors = FormErrors::default();
    let username = username.trim();
    if username.is_empty() {
        errors.add("username", REQUIRED);
    }
    if password.is_empty() {
        errors.add("password", REQUIRED);
    }
    errors.finish(Credentials {
        username: username.to_owned(),
        password: password.to_owned(),
    })
}

pub fn validate_post(input: &PostInput) -> Result<ValidPost, FormErrors> {
    let mut errors = FormErrors::default();
    let content = input.content.trim();
    if content.is_empty() {
        errors.add("content", REQUIRED);
    }
    let image = image_change(&mut errors, "image", &input.image, input.clear_image);
    errors.finish(ValidPost {
        content: content.to_owned(),
        image,
    })
}

pub fn validate_comment(request: &CommentRequest) -> Result<String, FormErrors> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(FormErrors::single("content", REQUIRED));
    }
    Ok(content.to_owned())
}

/// Validates the user part and the profile part together; neither is saved
/// unless both pass.
pub fn validate_profile(input: &ProfileInput) -> Result<ValidProfile, FormErrors> {
    let mut errors = FormErrors::default();
    let first_name = input.first_name.trim();
    let last_name = input.last_name.trim();
    let email = input.email.trim();
    check_name(&mut errors, "first_name", first_name);
    check_name(&mut errors, "last_name", last_name);
    check_email(&mut errors, email, false);
    let profile_pic = image_change(
        &mut errors,
        "profile_pic",
        &input.profile_pic,
        input.clear_profile_pic,
    );
    errors.finish(ValidProfile {
        first_name: first_name.to_owned(),
        last_name: last_name.to_owned(),
        email: email.to_owned(),
        bio: input.bio.trim_end().to_owned(),
        profile_pic,
    })
}

pub fn validate_admin_user(input: &AdminUserInput) -> Result<ValidAdminUser, FormErrors> {
    let mut errors = FormErrors::default();
    let username = input.username.trim();
    let email = input.email.trim();
    let first_name = input.first_name.trim();
    let last_name = input.last_name.trim();
    check_username(&mut errors, username);
    check_email(&mut errors, email, false);
    check_name(&mut errors, "first_name", first_name);
    check_name(&mut errors, "last_name", last_name);
    let profile_pic = image_change(
        &mut errors,
        "profile_pic",
        &input.profile_pic,
        input.clear_profile_pic,
    );
    errors.finish(ValidAdminUser {
        username: username.to_owned(),
        email: email.to_owned(),
        first_name: first_name.to_owned(),
        last_name: last_name.to_owned(),
        is_active: input.is_active,
        is_staff: input.is_staff,
        bio: input.bio.trim_end().to_owned(),
        profile_pic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn registration(username: &str, email: &str, p1: &str, p2: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.into(),
            email: email.into(),
            password1: p1.into(),
            password2: p2.into(),
            ..Default::default()
        }
    }

    fn fields(errors: &FormErrors) -> Vec<&str> {
        errors.iter().map(|(f, _)| f).collect()
    }

    fn png(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.into(),
            content_type: Some("image/png".into()),
            data: Bytes::from_static(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"),
        }
    }

    #[test]
    fn valid_registration_is_trimmed() {
        let valid =
            validate_registration(&registration(" alice ", "alice@example.com", "s3cret-Pass", "s3cret-Pass"))
                .unwrap();
        assert_eq!(valid.username, "alice");
        assert_eq!(valid.password, "s3cret-Pass");
    }

    #[test]
    fn registration_reports_every_bad_field_in_order() {
        let errors = validate_registration(&registration("", "not-an-email", "", "")).unwrap_err();
        assert_eq!(fields(&errors), vec!["username", "email", "password1", "password2"]);
    }

    #[test]
    fn mismatched_passwords_are_rejected() {
        let errors =
            validate_registration(&registration("alice", "a@example.com", "s3cret-Pass", "other-Pass1"))
                .unwrap_err();
        assert_eq!(errors.for_field("password2").collect::<Vec<_>>(), vec![PASSWORD_MISMATCH]);
    }

    #[test]
    fn weak_passwords_are_rejected() {
        let numeric = validate_registration(&registration("alice", "a@example.com", "12345", "12345"))
            .unwrap_err();
        let messages: Vec<&str> = numeric.for_field("password2").collect();
        assert!(messages.iter().any(|m| m.contains("too short")));
        assert!(messages.iter().any(|m| m.contains("entirely numeric")));

        let common =
            validate_registration(&registration("alice", "a@example.com", "password123", "password123"))
                .unwrap_err();
        assert!(common.for_field("password2").any(|m| m.contains("too common")));

        let similar =
            validate_registration(&registration("wonderland", "w@example.com", "wonderland99", "wonderland99"))
                .unwrap_err();
        assert!(similar.for_field("password2").any(|m| m.contains("similar to the username")));

        let mailbox =
            validate_registration(&registration("wl", "alice.smith@example.com", "alicesmith1", "alicesmith1"))
                .unwrap_err();
        assert!(mailbox.for_field("password2").any(|m| m.contains("similar to the email address")));
    }

    #[test]
    fn passwords_sharing_a_mail_domain_fragment_are_accepted() {
        let ok = validate_registration(&registration(
            "alice",
            "alice@gmail.com",
            "Welcome-home-9x",
            "Welcome-home-9x",
        ))
        .unwrap();
        assert_eq!(ok.password, "Welcome-home-9x");

        for password in ["network-tea-41", "Organic.carrot7", "gmailer-pony-22"] {
            assert!(
                password_problems(password, &[("email address", "bob@gmail.com")]).is_empty(),
                "{password} was rejected"
            );
        }
    }

    #[test]
    fn usernames_follow_the_allowed_alphabet_and_avoid_reserved_words() {
        let bad = validate_registration(&registration("al ice!", "a@example.com", "s3cret-Pass", "s3cret-Pass"))
            .unwrap_err();
        assert_eq!(bad.for_field("username").collect::<Vec<_>>(), vec![INVALID_USERNAME]);
        let reserved =
            validate_registration(&registration("Edit", "a@example.com", "s3cret-Pass", "s3cret-Pass"))
                .unwrap_err();
        assert_eq!(reserved.for_field("username").collect::<Vec<_>>(), vec![RESERVED_USERNAME]);
        assert!(validate_registration(&registration(
            "a.b+c-d_e@f",
            "a@example.com",
            "s3cret-Pass",
            "s3cret-Pass"
        ))
        .is_ok());
    }

    #[test]
    fn login_requires_both_fields() {
        let errors = validate_login("  ", "").unwrap_err();
        assert_eq!(fields(&errors), vec!["username", "password"]);
        assert_eq!(validate_login(" bob ", "pw").unwrap().username, "bob");
    }

    #[test]
    fn post_content_is_required_and_image_optional() {
        let blank = PostInput {
            content: "   \n".into(),
            ..Default::default()
        };
        assert_eq!(fields(&validate_post(&blank).unwrap_err()), vec!["content"]);

        let text_only = validate_post(&PostInput {
            content: " hello world ".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(text_only.content, "hello world");
        assert!(matches!(text_only.image, ImageChange::Keep));

        let with_image = validate_post(&PostInput {
            content: "pic".into(),
            image: Some(png("cat.png")),
            clear_image: false,
        })
        .unwrap();
        assert!(matches!(with_image.image, ImageChange::Replace(_)));
    }

    #[test]
    fn non_images_are_rejected() {
        let mut fake = png("notes.txt");
        fake.content_type = Some("text/plain".into());
        let errors = validate_post(&PostInput {
            content: "x".into(),
            image: Some(fake),
            clear_image: false,
        })
        .unwrap_err();
        assert_eq!(errors.for_field("image").collect::<Vec<_>>(), vec![INVALID_IMAGE]);

        let mut disguised = png("cat.png");
        disguised.data = Bytes::from_static(b"#!/bin/sh\necho hi");
        assert!(!looks_like_image(&disguised));
    }

    #[test]
    fn comments_need_text() {
        assert!(validate_comment(&CommentRequest { content: " ".into() }).is_err());
        assert_eq!(
            validate_comment(&CommentRequest { content: " nice ".into() }).unwrap(),
            "nice"
        );
    }

    #[test]
    fn profile_email_is_optional_but_checked() {
        let ok = validate_profile(&ProfileInput {
            first_name: "Alice".into(),
            clear_profile_pic: true,
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(ok.profile_pic, ImageChange::Clear));

        let errors = validate_profile(&ProfileInput {
            email: "nope".into(),
            first_name: "x".repeat(151),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(fields(&errors), vec!["first_name", "email"]);
    }

    #[test]
    fn admin_user_form_reads_checkboxes() {
        let changes = validate_admin_user(&AdminUserInput {
            username: "bob".into(),
            is_staff: true,
            ..Default::default()
        })
        .unwrap();
        assert!(changes.is_staff);
        assert!(!changes.is_active);
        assert!(matches!(changes.profile_pic, ImageChange::Keep));
    }

    #[test]
    fn admin_user_form_checks_the_profile_picture() {
        let replaced = validate_admin_user(&AdminUserInput {
            username: "bob".into(),
            profile_pic: Some(png("bob.png")),
            ..Default::default()
        })
        .unwrap();
        assert!(matches!(replaced.profile_pic, ImageChange::Replace(ref f) if f.file_name == "bob.png"));

        let errors = validate_admin_user(&AdminUserInput {
            username: "bob".into(),
            profile_pic: Some(UploadedFile {
                file_name: "bob.png".into(),
                content_type: Some("image/png".into()),
                data: Bytes::from_static(b"not an image"),
            }),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(errors.for_field("profile_pic").collect::<Vec<_>>(), vec![INVALID_IMAGE]);
    }
}
