//! Content metadata derived from a storage key
//!
//! Uploads carry no trustworthy content type of their own, so both the
//! MIME type and the disposition served back to clients are inferred from
//! the file extension of the storage key.

use mime_guess::mime;

/// How a browser should present a downloaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Render in place (media and plain text)
    Inline,
    /// Offer as a download
    Attachment,
}

impl Disposition {
    /// Header value for `Content-Disposition`
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Inline => "inline",
            Disposition::Attachment => "attachment",
        }
    }

    fn for_mime(mime: &mime::Mime) -> Self {
        let top = mime.type_();
        let inline = top == mime::AUDIO
            || top == mime::IMAGE
            || top == mime::VIDEO
            || mime.essence_str() == mime::TEXT_PLAIN.essence_str();
        if inline {
            Disposition::Inline
        } else {
            Disposition::Attachment
        }
    }
}

/// MIME type and disposition for a stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMeta {
    pub content_type: String,
    pub disposition: Disposition,
}

impl ContentMeta {
    /// Infer metadata from the extension of `key`
    pub fn for_key(key: &str) -> Self {
        let mime = mime_guess::from_path(key).first_or_octet_stream();
        Self {
            disposition: Disposition::for_mime(&mime),
            content_type: mime.to_string(),
        }
    }
}
