use serde::Deserialize;

// ----------------- Auth Requests -----------------
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password1: String,
    pub password2: String,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct NextQuery {
    pub next: Option<String>,
}

// ----------------- Content Requests -----------------
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(default)]
pub struct CommentRequest {
    pub content: String,
}

// ----------------- Admin Requests -----------------
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct SearchQuery {
    pub q: Option<String>,
}
