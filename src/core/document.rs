//! Documents and their addressable locations.
//!
//! A document is either one long text (scraped website, extracted deck text)
//! or an ordered sequence of pages. Downstream stages address it through
//! [`Location`]s numbered from 1: chunks of a text document, or pages of a
//! paged document.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::chunking;

/// An image attached to a generation request (e.g. a rendered deck page).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// MIME type such as `image/png`.
    pub mime_type: String,
    /// Raw image bytes.
    pub data: Vec<u8>,
}

impl ImageAttachment {
    /// Creates an attachment from raw bytes.
    #[must_use]
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Encodes the image as a `data:` URL.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }
}

/// One page of a paged document.
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Text extracted from the page, if any.
    pub text: Option<String>,
    /// Rendered page image, if any.
    pub image: Option<ImageAttachment>,
}

/// Document content.
#[derive(Debug, Clone)]
pub enum DocumentBody {
    /// A single body of text.
    Text(String),
    /// Ordered pages.
    Pages(Vec<Page>),
}

/// An immutable input document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Identifier used for artifacts and logging.
    pub id: String,
    /// Document content.
    pub body: DocumentBody,
}

impl Document {
    /// Creates a text document.
    #[must_use]
    pub fn from_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: DocumentBody::Text(text.into()),
        }
    }

    /// Creates a paged document.
    #[must_use]
    pub fn from_pages(id: impl Into<String>, pages: Vec<Page>) -> Self {
        Self {
            id: id.into(),
            body: DocumentBody::Pages(pages),
        }
    }

    /// Length in characters for text documents, in pages otherwise.
    #[must_use]
    pub fn len(&self) -> usize {
        match &self.body {
            DocumentBody::Text(text) => text.chars().count(),
            DocumentBody::Pages(pages) => pages.len(),
        }
    }

    /// Returns `true` if the document has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.body {
            DocumentBody::Text(text) => text.trim().is_empty(),
            DocumentBody::Pages(pages) => pages.is_empty(),
        }
    }

    /// Splits the document into numbered locations.
    ///
    /// Text documents are cleaned and chunked into at most roughly
    /// `max_segments` chunks; paged documents yield one location per page.
    #[must_use]
    pub fn locations(&self, max_segments: usize) -> Vec<Location> {
        match &self.body {
            DocumentBody::Text(text) => {
                let cleaned = chunking::clean_text(text);
                chunking::chunk(&cleaned, max_segments)
                    .into_iter()
                    .map(|c| Location {
                        number: c.number(),
                        text: Some(c.text),
                        image: None,
                    })
                    .collect()
            }
            DocumentBody::Pages(pages) => pages
                .iter()
                .enumerate()
                .map(|(i, page)| Location {
                    number: i + 1,
                    text: page.text.clone(),
                    image: page.image.clone(),
                })
                .collect(),
        }
    }
}

/// One addressable unit of a document (chunk or page), numbered from 1.
#[derive(Debug, Clone)]
pub struct Location {
    /// 1-based location number.
    pub number: usize,
    /// Text content, if any.
    pub text: Option<String>,
    /// Image content, if any.
    pub image: Option<ImageAttachment>,
}

impl Location {
    /// Number of characters of text at this location.
    #[must_use]
    pub fn text_len(&self) -> usize {
        self.text.as_ref().map_or(0, |t| t.chars().count())
    }
}
