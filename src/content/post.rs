//! Post view models and the mappers that build them from raw documents

use serde::{Deserialize, Deserializer, Serialize};

use crate::client::Document;

/// Fields of the `posts` custom type as sent by the content API
///
/// Every field is optional on the wire: listing queries only fetch the
/// display strings, and unpublished drafts may lack anything else.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PostFields {
    #[serde(default, deserialize_with = "display_text")]
    pub title: String,
    #[serde(default, deserialize_with = "display_text")]
    pub subtitle: String,
    #[serde(default, deserialize_with = "display_text")]
    pub author: String,
    #[serde(default)]
    pub banner: Option<Image>,
    #[serde(default)]
    pub content: Option<Vec<RawContentBlock>>,
}

/// Raw posts document
pub type PostDocument = Document<PostFields>;

/// Image field; an empty image is sent as `{}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Image {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub alt: Option<String>,
}

/// Raw slice of the `content` group field
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawContentBlock {
    #[serde(default, deserialize_with = "display_text")]
    pub heading: String,
    #[serde(default)]
    pub body: Vec<RichTextSpan>,
}

/// One rich-text element of a body
///
/// `kind` is the element type (`paragraph`, `heading2`, `list-item`, ...);
/// `spans` carry inline formatting over ranges of `text`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RichTextSpan {
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub spans: Vec<InlineSpan>,
    /// Image elements only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

impl RichTextSpan {
    /// A plain paragraph
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            kind: default_kind(),
            text: text.into(),
            spans: Vec::new(),
            url: None,
            alt: None,
        }
    }
}

fn default_kind() -> String {
    "paragraph".to_string()
}

/// Inline formatting; `start`/`end` are UTF-16 offsets into the text
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct InlineSpan {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<SpanData>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SpanData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
}

/// Post summary shown on the listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostSummary {
    pub uid: Option<String>,
    pub first_publication_date: Option<String>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
}

impl From<&PostDocument> for PostSummary {
    fn from(doc: &PostDocument) -> Self {
        Self {
            uid: doc.uid.clone(),
            first_publication_date: doc.first_publication_date.clone(),
            title: doc.data.title.clone(),
            subtitle: doc.data.subtitle.clone(),
            author: doc.data.author.clone(),
        }
    }
}

/// A content block of an article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub heading: String,
    pub body: Vec<RichTextSpan>,
}

impl From<&RawContentBlock> for ContentBlock {
    fn from(raw: &RawContentBlock) -> Self {
        Self {
            heading: raw.heading.clone(),
            body: raw.body.clone(),
        }
    }
}

/// Full article
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub uid: Option<String>,
    pub first_publication_date: Option<String>,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub banner_url: Option<String>,
    pub content: Vec<ContentBlock>,
}

impl From<&PostDocument> for Post {
    fn from(doc: &PostDocument) -> Self {
        Self {
            uid: doc.uid.clone(),
            first_publication_date: doc.first_publication_date.clone(),
            title: doc.data.title.clone(),
            subtitle: doc.data.subtitle.clone(),
            author: doc.data.author.clone(),
            banner_url: doc.data.banner.as_ref().and_then(|b| b.url.clone()),
            content: doc
                .data
                .content
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(ContentBlock::from)
                .collect(),
        }
    }
}

impl Post {
    /// The identity fields as a summary
    pub fn summary(&self) -> PostSummary {
        PostSummary {
            uid: self.uid.clone(),
            first_publication_date: self.first_publication_date.clone(),
            title: self.title.clone(),
            subtitle: self.subtitle.clone(),
            author: self.author.clone(),
        }
    }
}

/// Accept a key-text string, a rich-text title array, or null
fn display_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Text {
        Plain(String),
        Rich(Vec<RichTextSpan>),
    }

    Ok(match Option::<Text>::deserialize(deserializer)? {
        Some(Text::Plain(s)) => s,
        Some(Text::Rich(blocks)) => blocks
            .into_iter()
            .next()
            .map(|b| b.text)
            .unwrap_or_default(),
        None => String::new(),
    })
}
