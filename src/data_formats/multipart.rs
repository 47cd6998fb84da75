use std::collections::HashMap;

use axum::{body::Bytes, extract::Multipart};

use crate::errors::RequestError;

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// A `multipart/form-data` body split into text fields and file fields.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    pub async fn read(mut multipart: Multipart) -> Result<Self, RequestError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| RequestError::BadRequest(e.to_string()))?
        {
            let name = match field.name() {
                Some(name) => name.to_owned(),
                None => continue,
            };
            match field.file_name().map(str::to_owned) {
                Some(file_name) => {
                    let content_type = field.content_type().map(str::to_owned);
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| RequestError::BadRequest(e.to_string()))?;
                    // browsers send an empty part for an untouched file input
                    if file_name.is_empty() && data.is_empty() {
                        continue;
                    }
                    form.files.insert(
                        name,
                        UploadedFile {
                            file_name,
                            content_type,
                            data,
                        },
                    );
                }
                None => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| RequestError::BadRequest(e.to_string()))?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    pub fn text(&self, name: &str) -> String {
        self.fields.get(name).cloned().unwrap_or_default()
    }

    /// Checkbox semantics: present and not explicitly off.
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Some(v) if !v.is_empty() && v != "off" && v != "false")
    }

    pub fn take_file(&mut self, name: &str) -> Option<UploadedFile> {
        self.files.remove(name)
    }
}

#[derive(Debug, Default, Clone)]
pub struct PostInput {
    pub content: String,
    pub image: Option<UploadedFile>,
    pub clear_image: bool,
}

impl From<MultipartForm> for PostInput {
    fn from(mut form: MultipartForm) -> Self {
        Self {
            content: form.text("content"),
            clear_image: form.flag("image-clear"),
            image: form.take_file("image"),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ProfileInput {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub bio: String,
    pub profile_pic: Option<UploadedFile>,
    pub clear_profile_pic: bool,
}

impl From<MultipartForm> for ProfileInput {
    fn from(mut form: MultipartForm) -> Self {
        Self {
            first_name: form.text("first_name"),
            last_name: form.text("last_name"),
            email: form.text("email"),
            bio: form.text("bio"),
            clear_profile_pic: form.flag("profile_pic-clear"),
            profile_pic: form.take_file("profile_pic"),
        }
    }
}

/// The admin change-user form with its inline profile. Checkboxes are only
/// sent when ticked.
#[derive(Debug, Default, Clone)]
pub struct AdminUserInput {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub bio: String,
    pub profile_pic: Option<UploadedFile>,
    pub clear_profile_pic: bool,
}

impl From<MultipartForm> for AdminUserInput {
    fn from(mut form: MultipartForm) -> Self {
        Self {
            username: form.text("username"),
            email: form.text("email"),
            first_name: form.text("first_name"),
            last_name: form.text("last_name"),
            is_active: form.flag("is_active"),
            is_staff: form.flag("is_staff"),
            bio: form.text("bio"),
            clear_profile_pic: form.flag("profile_pic-clear"),
            profile_pic: form.take_file("profile_pic"),
        }
    }
}
