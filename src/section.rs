//! Outline sections.
//!
//! A [`Section`] is one entry of an outline: a heading detected in the
//! document or a bookmark a reader added. Sections are immutable values.
//! Every edit builds a new `Section` and swaps it into the owning node, so a
//! published snapshot never changes underneath its readers.

use crate::error::SectionId;
use crate::tree::RawOutlineItem;
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use uuid::Uuid;

/// Words left in lower case inside a title unless they open it or follow `/`.
const LOWERCASE_WORDS: [&str; 18] = [
    "a", "an", "the", "and", "but", "or", "nor", "as", "at", "by", "for", "in", "of", "on", "per",
    "to", "via", "its",
];

/// Kind of numbered heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Encode, Decode)]
#[serde(rename_all = "UPPERCASE")]
pub enum SectionType {
    Section,
    Article,
}

impl SectionType {
    /// Name used in display descriptors ("Section", "Article").
    pub fn cased(&self) -> &'static str {
        match self {
            SectionType::Section => "Section",
            SectionType::Article => "Article",
        }
    }
}

/// One outline entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    id: SectionId,
    title: String,
    title_cased: String,
    literal: Option<String>,
    page: u32,
    y: f64,
    qualified: String,
    section_type: Option<SectionType>,
    full_title: String,
    num_refs: u32,
    show_bookmark: bool,
    bookmark_title: Option<String>,
    uuid: Uuid,
    full_descriptor: String,
    lower_case_full_descriptor: String,
}

impl Section {
    /// Build a section from a persisted outline item.
    ///
    /// The title is entity-decoded before any derived string is computed.
    pub fn from_raw(item: &RawOutlineItem) -> Self {
        let decoded = decode_entities(&item.title);
        let title_cased = to_title_case(&decoded);
        let full_title = item
            .full_title
            .as_deref()
            .map(|t| decode_entities(t).into_owned())
            .unwrap_or_else(|| title_cased.clone());
        let qualified = item.qualified.clone().unwrap_or_default();
        let full_descriptor = compose_descriptor(item.section_type, &qualified, &full_title);
        let uuid = item
            .uuid
            .as_deref()
            .and_then(|u| Uuid::parse_str(u).ok())
            .unwrap_or_else(Uuid::new_v4);

        Self {
            id: item.id,
            title: item.title.clone(),
            title_cased,
            literal: item.literal.clone(),
            page: item.page,
            y: item.y,
            qualified,
            section_type: item.section_type,
            full_title,
            num_refs: item.num_refs,
            show_bookmark: item.show_bookmark,
            bookmark_title: item.bookmark_title.clone(),
            uuid,
            lower_case_full_descriptor: full_descriptor.to_lowercase(),
            full_descriptor,
        }
    }

    /// A bookmark added by the reader at `(page, y)`.
    pub fn new_bookmark(id: SectionId, title: impl Into<String>, page: u32, y: f64) -> Self {
        let title = title.into();
        let item = RawOutlineItem {
            bookmark_title: Some(title.clone()),
            ..RawOutlineItem::new(id, title, page, y)
        };
        Self::from_raw(&item)
    }

    /// Copy of this section with a different bookmark title.
    ///
    /// Derived fields are carried over verbatim, never recomputed.
    pub fn with_bookmark_title(&self, bookmark_title: Option<String>) -> Self {
        Self {
            bookmark_title,
            ..self.clone()
        }
    }

    /// Convert back into the persisted form (without children).
    pub fn to_raw(&self) -> RawOutlineItem {
        RawOutlineItem {
            id: self.id,
            title: self.title.clone(),
            literal: self.literal.clone(),
            page: self.page,
            y: self.y,
            qualified: (!self.qualified.is_empty()).then(|| self.qualified.clone()),
            section_type: self.section_type,
            full_title: Some(self.full_title.clone()),
            num_refs: self.num_refs,
            show_bookmark: self.show_bookmark,
            bookmark_title: self.bookmark_title.clone(),
            uuid: Some(self.uuid.to_string()),
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> SectionId {
        self.id
    }

    /// Raw title as it came from the outline source.
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn title_cased(&self) -> &str {
        &self.title_cased
    }

    /// Author-supplied numbering string, if any.
    pub fn literal(&self) -> Option<&str> {
        self.literal.as_deref()
    }

    /// 0-based page index.
    pub fn page(&self) -> u32 {
        self.page
    }

    /// Vertical offset on the page.
    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn qualified(&self) -> &str {
        &self.qualified
    }

    pub fn section_type(&self) -> Option<SectionType> {
        self.section_type
    }

    pub fn full_title(&self) -> &str {
        &self.full_title
    }

    /// Number of in-document references to this section.
    pub fn num_refs(&self) -> u32 {
        self.num_refs
    }

    pub fn show_bookmark(&self) -> bool {
        self.show_bookmark
    }

    pub fn bookmark_title(&self) -> Option<&str> {
        self.bookmark_title.as_deref()
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn full_descriptor(&self) -> &str {
        &self.full_descriptor
    }

    pub fn lower_case_full_descriptor(&self) -> &str {
        &self.lower_case_full_descriptor
    }

    /// Title shown in the outline: the bookmark override when set, the
    /// title-cased heading otherwise. An empty override stays empty.
    pub fn display_title(&self) -> &str {
        self.bookmark_title.as_deref().unwrap_or(&self.title_cased)
    }

    /// Whether the section is at or before `(page, y)` in reading order.
    pub fn is_at_or_before(&self, page: u32, y: f64) -> bool {
        self.page < page || (self.page == page && self.y <= y)
    }
}

/// Title-case a heading.
///
/// ALL-CAPS input carries no casing intent and is lowered first. Each word
/// (split on single spaces) gets its first character upper-cased, except the
/// small words in [`LOWERCASE_WORDS`] when they are neither the first word nor
/// directly after a `/` token.
pub fn to_title_case(s: &str) -> String {
    let source: Cow<'_, str> = if is_all_caps(s) {
        Cow::Owned(s.to_lowercase())
    } else {
        Cow::Borrowed(s)
    };

    let words: Vec<&str> = source.split(' ').collect();
    let mut cased = Vec::with_capacity(words.len());

    for (i, word) in words.iter().enumerate() {
        let after_slash = i > 0 && words[i - 1] == "/";
        if i > 0 && !after_slash && LOWERCASE_WORDS.contains(word) {
            cased.push(Cow::Borrowed(*word));
        } else {
            cased.push(capitalize(word));
        }
    }

    cased.join(" ")
}

/// No word has a lower-case letter after its first character.
///
/// Looking past the first character keeps casing stable when the text is
/// cased a second time.
fn is_all_caps(s: &str) -> bool {
    s.split(' ')
        .flat_map(|word| word.chars().skip(1))
        .all(|c| !c.is_lowercase())
}

fn capitalize(word: &str) -> Cow<'_, str> {
    let mut chars = word.chars();
    let Some(first) = chars.next() else {
        return Cow::Borrowed(word);
    };

    let mut upper = first.to_uppercase();
    match (upper.next(), upper.next()) {
        (Some(u), None) if u != first => {
            let mut out = String::with_capacity(word.len());
            out.push(u);
            out.push_str(chars.as_str());
            Cow::Owned(out)
        }
        _ => Cow::Borrowed(word),
    }
}

/// Undo XML/HTML character entities (`&amp;`, `&#39;`, ...). Text that does
/// not decode cleanly is kept as-is.
pub fn decode_entities(raw: &str) -> Cow<'_, str> {
    quick_xml::escape::unescape(raw).unwrap_or(Cow::Borrowed(raw))
}

fn compose_descriptor(kind: Option<SectionType>, qualified: &str, full_title: &str) -> String {
    if qualified.is_empty() {
        return full_title.to_string();
    }
    match kind {
        Some(kind) => format!("{} {}: {}", kind.cased(), qualified, full_title),
        None => format!("{}: {}", qualified, full_title),
    }
}
