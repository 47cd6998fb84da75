use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::{distributions::Alphanumeric, Rng};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::{data_formats::UploadedFile, models::DEFAULT_PROFILE_PIC};

const DEFAULT_AVATAR: &[u8] = include_bytes!("../static/default-avatar.png");
const MAX_STEM_LEN: usize = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadDir {
    ProfilePics,
    PostImages,
}

impl UploadDir {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadDir::ProfilePics => "profile_pics",
            UploadDir::PostImages => "post_images",
        }
    }
}

/// Uploaded media on disk, laid out as `{root}/{upload dir}/{file name}`.
/// The database stores the path relative to the root.
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub async fn new(root: PathBuf) -> Result<Self> {
        for dir in [UploadDir::ProfilePics, UploadDir::PostImages] {
            fs::create_dir_all(root.join(dir.as_str()))
                .await
                .with_context(|| format!("creating {}", root.join(dir.as_str()).display()))?;
        }
        let default_avatar = root.join(DEFAULT_PROFILE_PIC);
        if fs::metadata(&default_avatar).await.is_err() {
            fs::write(&default_avatar, DEFAULT_AVATAR)
                .await
                .context("writing default avatar")?;
        }
        info!("Media storage directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes the upload under its sanitized name, adding a random suffix
    /// when the name is already taken. Returns the relative path.
    pub async fn save(&self, dir: UploadDir, file: &UploadedFile) -> Result<String> {
        let (stem, extension) = split_file_name(&file.file_name);
        let mut candidate = join_name(&stem, "", &extension);
        loop {
            let relative = format!("{}/{}", dir.as_str(), candidate);
            let opened = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&relative))
                .await;
            match opened {
                Ok(mut handle) => {
                    handle
                        .write_all(&file.data)
                        .await
                        .with_context(|| format!("writing {}", relative))?;
                    handle.flush().await?;
                    return Ok(relative);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    candidate = join_name(&stem, &random_suffix(), &extension);
                }
                Err(e) => return Err(e).with_context(|| format!("creating {}", relative)),
            }
        }
    }

    /// Best-effort removal; the shared default avatar is never removed.
    pub async fn remove(&self, relative: &str) {
        if relative == DEFAULT_PROFILE_PIC || relative.contains("..") {
            return;
        }
        if let Err(e) = fs::remove_file(self.root.join(relative)).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove media file {}: {}", relative, e);
            }
        }
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect()
}

fn join_name(stem: &str, suffix: &str, extension: &str) -> String {
    let mut name = stem.to_owned();
    if !suffix.is_empty() {
        name.push('_');
        name.push_str(suffix);
    }
    if !extension.is_empty() {
        name.push('.');
        name.push_str(extension);
    }
    name
}

/// Keeps the last path component and only `[A-Za-z0-9._-]`.
fn split_file_name(raw: &str) -> (String, String) {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let (stem, extension) = match base.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => (stem, ext),
        _ => (base, ""),
    };
    let stem: String = stem
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(MAX_STEM_LEN)
        .collect();
    let stem = match stem.trim_start_matches('.') {
        "" => "upload".to_owned(),
        trimmed => trimmed.to_owned(),
    };
    let extension: String = extension
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    (stem, extension)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("socialapp-storage-{}", random_suffix()))
    }

    fn upload(name: &str) -> UploadedFile {
        UploadedFile {
            file_name: name.into(),
            content_type: Some("image/png".into()),
            data: Bytes::from_static(b"\x89PNG\r\n\x1a\n"),
        }
    }

    #[test]
    fn file_names_are_sanitized() {
        assert_eq!(split_file_name("../../etc/passwd"), ("passwd".into(), "".into()));
        assert_eq!(split_file_name("C:\\pics\\My Cat.PNG"), ("My_Cat".into(), "png".into()));
        assert_eq!(split_file_name(".png"), ("upload".into(), "png".into()));
        assert_eq!(split_file_name("€€€.jpg"), ("upload".into(), "jpg".into()));
    }

    #[tokio::test]
    async fn saving_twice_keeps_both_files() {
        let root = temp_root();
        let storage = MediaStorage::new(root.clone()).await.unwrap();
        assert!(root.join(DEFAULT_PROFILE_PIC).exists());

        let first = storage.save(UploadDir::PostImages, &upload("cat.png")).await.unwrap();
        let second = storage.save(UploadDir::PostImages, &upload("cat.png")).await.unwrap();
        assert_eq!(first, "post_images/cat.png");
        assert_ne!(first, second);
        assert!(second.starts_with("post_images/cat_") && second.ends_with(".png"));

        storage.remove(&first).await;
        assert!(!root.join(&first).exists());
        storage.remove(DEFAULT_PROFILE_PIC).await;
        assert!(root.join(DEFAULT_PROFILE_PIC).exists());

        let _ = std::fs::remove_dir_all(root);
    }
}
