use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD};
use tokio::fs;

use crate::error::{Result, StoryforgeError};

pub const MAX_IMAGES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Image,
    Video,
}

/// A user-supplied asset. Images carry their base64 body; videos only
/// record that they were supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub kind: AssetKind,
    pub name: String,
    pub mime_type: String,
    pub data: String,
}

impl Asset {
    pub fn image(name: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            kind: AssetKind::Image,
            name: name.into(),
            mime_type: mime_type.into(),
            data: STANDARD.encode(bytes),
        }
    }

    pub fn video(name: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Video,
            name: name.into(),
            mime_type: String::new(),
            data: String::new(),
        }
    }

    /// Read an image from disk and encode it for the request body
    pub async fn image_from_path(path: &Path) -> Result<Self> {
        let mime_type = image_mime_type(path).ok_or_else(|| {
            StoryforgeError::validation(format!("unsupported image type: {}", path.display()))
        })?;
        let bytes = fs::read(path)
            .await
            .map_err(|e| StoryforgeError::io(path, e))?;
        Ok(Self::image(file_name(path), mime_type, &bytes))
    }

    /// Videos are never uploaded, so only the file's existence is checked.
    pub async fn video_from_path(path: &Path) -> Result<Self> {
        fs::metadata(path)
            .await
            .map_err(|e| StoryforgeError::io(path, e))?;
        Ok(Self::video(file_name(path)))
    }
}

/// Ordered asset selection with the collector's limits applied.
#[derive(Debug, Clone, Default)]
pub struct AssetSet {
    images: Vec<Asset>,
    video: Option<Asset>,
}

impl AssetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, asset: Asset) -> Result<()> {
        match asset.kind {
            AssetKind::Image => {
                if self.images.len() >= MAX_IMAGES {
                    return Err(StoryforgeError::validation(format!(
                        "at most {MAX_IMAGES} images can be attached"
                    )));
                }
                self.images.push(asset);
            }
            AssetKind::Video => {
                if self.video.is_some() {
                    return Err(StoryforgeError::validation(
                        "only one video can be attached",
                    ));
                }
                self.video = Some(asset);
            }
        }
        Ok(())
    }

    /// Images in selection order, then the video.
    pub fn into_vec(self) -> Vec<Asset> {
        let mut all = self.images;
        all.extend(self.video);
        all
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn image_mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn image_payload_is_base64() {
        let asset = Asset::image("dot.png", "image/png", b"hello");
        assert_eq!(asset.data, "aGVsbG8=");
        assert_eq!(asset.kind, AssetKind::Image);
    }

    #[test]
    fn sixth_image_is_refused() {
        let mut set = AssetSet::new();
        for i in 0..MAX_IMAGES {
            set.push(Asset::image(format!("{i}.png"), "image/png", b"x"))
                .unwrap();
        }
        let err = set
            .push(Asset::image("6.png", "image/png", b"x"))
            .unwrap_err();
        assert_matches!(err, StoryforgeError::Validation { .. });
        assert_eq!(set.into_vec().len(), MAX_IMAGES);
    }

    #[test]
    fn video_goes_after_images() {
        let mut set = AssetSet::new();
        set.push(Asset::video("clip.mp4")).unwrap();
        set.push(Asset::image("a.jpg", "image/jpeg", b"x")).unwrap();
        assert_matches!(
            set.push(Asset::video("other.mp4")),
            Err(StoryforgeError::Validation { .. })
        );

        let kinds: Vec<_> = set.into_vec().into_iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AssetKind::Image, AssetKind::Video]);
    }

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(image_mime_type(Path::new("a.JPG")), Some("image/jpeg"));
        assert_eq!(image_mime_type(Path::new("a.webp")), Some("image/webp"));
        assert_eq!(image_mime_type(Path::new("a.txt")), None);
        assert_eq!(image_mime_type(Path::new("noext")), None);
    }

    #[tokio::test]
    async fn image_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        std::fs::write(&path, b"hello").unwrap();

        let asset = Asset::image_from_path(&path).await.unwrap();
        assert_eq!(asset.name, "shot.png");
        assert_eq!(asset.mime_type, "image/png");
        assert_eq!(asset.data, "aGVsbG8=");
    }

    #[tokio::test]
    async fn missing_video_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Asset::video_from_path(&dir.path().join("gone.mp4"))
            .await
            .unwrap_err();
        assert_matches!(err, StoryforgeError::Io { .. });
    }
}
