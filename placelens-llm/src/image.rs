use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

/// An image ready to embed in a completion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub mime: &'static str,
    pub base64: String,
}

impl EncodedImage {
    pub fn from_bytes(bytes: &[u8], mime: &'static str) -> Self {
        Self {
            mime,
            base64: STANDARD.encode(bytes),
        }
    }

    /// `data:{mime};base64,{payload}`
    ///
    /// ```
    /// use placelens_llm::image::EncodedImage;
    ///
    /// let img = EncodedImage::from_bytes(b"hi", "image/png");
    /// assert_eq!(img.data_url(), "data:image/png;base64,aGk=");
    /// ```
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.base64)
    }
}

pub fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/png",
    }
}

/// Read and base64-encode an image file.
pub async fn encode_image(path: &Path) -> std::io::Result<EncodedImage> {
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{} is empty", path.display()),
        ));
    }
    Ok(EncodedImage::from_bytes(&bytes, mime_for(path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for(Path::new("a/shot.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("shot.jpeg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("shot")), "image/png");
    }

    #[tokio::test]
    async fn encodes_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("0_example.com.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();
        let img = encode_image(&path).await.unwrap();
        assert_eq!(img.mime, "image/png");
        assert_eq!(img.base64, "iVBORw==");
    }

    #[tokio::test]
    async fn empty_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        std::fs::write(&path, []).unwrap();
        assert!(encode_image(&path).await.is_err());
    }
}
