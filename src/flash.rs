use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

const FLASH_COOKIE: &str = "messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Level::Success),
            "info" => Some(Level::Info),
            "warning" => Some(Level::Warning),
            "error" => Some(Level::Error),
            _ => None,
        }
    }
}

/// A one-shot notice shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashMessage {
    pub level: Level,
    pub text: String,
}

fn decode(raw: &str) -> Vec<FlashMessage> {
    raw.split('&')
        .filter_map(|entry| urlencoding::decode(entry).ok())
        .filter_map(|entry| {
            let (level, text) = entry.split_once(':')?;
            Some(FlashMessage {
                level: Level::parse(level)?,
                text: text.to_owned(),
            })
        })
        .collect()
}

fn encode(messages: &[FlashMessage]) -> String {
    messages
        .iter()
        .map(|m| urlencoding::encode(&format!("{}:{}", m.level.as_str(), m.text)).into_owned())
        .collect::<Vec<_>>()
        .join("&")
}

fn flash_cookie(value: String) -> Cookie<'static> {
    Cookie::build(FLASH_COOKIE, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish()
}

/// Queues a message behind any already pending ones.
pub fn push(jar: CookieJar, level: Level, text: impl Into<String>) -> CookieJar {
    let mut pending = jar
        .get(FLASH_COOKIE)
        .map(|c| decode(c.value()))
        .unwrap_or_default();
    pending.push(FlashMessage {
        level,
        text: text.into(),
    });
    jar.add(flash_cookie(encode(&pending)))
}

/// Drains pending messages. The returned jar must be sent back with the
/// response so the cookie is cleared.
pub fn take(jar: CookieJar) -> (CookieJar, Vec<FlashMessage>) {
    let messages = match jar.get(FLASH_COOKIE) {
        Some(cookie) => decode(cookie.value()),
        None => return (jar, Vec::new()),
    };
    (jar.remove(flash_cookie(String::new())), messages)
}
