//! Coarse content classification by file extension.

use std::fmt;
use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Image,
    Text,
}

impl ContentKind {
    /// Classify a name by its extension, case-insensitively. Anything that
    /// is not a known image extension is treated as text.
    pub fn classify(name: &str) -> Self {
        let is_image = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                IMAGE_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false);

        if is_image {
            ContentKind::Image
        } else {
            ContentKind::Text
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Image => "image",
            ContentKind::Text => "text",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MIME type guessed from the name's extension, if it has a known one.
pub fn mime_type(name: &str) -> Option<String> {
    mime_guess::from_path(name).first_raw().map(str::to_string)
}
