use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::models::ImageRecord;

pub const NO_THUMBNAIL: &str = "No thumbnail available";

#[derive(Debug, Clone)]
pub struct PopupOptions {
    /// Display width of the inline thumbnail, in CSS pixels.
    pub image_width: u32,
}

impl Default for PopupOptions {
    fn default() -> Self {
        Self { image_width: 100 }
    }
}

/// HTML fragment for a marker popup: the record's label, then either the
/// thumbnail inlined as a data URI or a plain fallback line.
///
/// The thumbnail file is re-read here rather than trusted from the batch, so
/// a file removed in between degrades to the fallback.
pub fn render_popup(record: &ImageRecord, options: &PopupOptions) -> String {
    let label = render_label(record);

    match record.thumbnail_path.as_deref().and_then(inline_thumbnail) {
        Some(data_uri) => format!(
            "{}<br><img src=\"{}\" width=\"{}\">",
            label, data_uri, options.image_width
        ),
        None => format!("{}<br>{}", label, NO_THUMBNAIL),
    }
}

fn render_label(record: &ImageRecord) -> String {
    let name = escape_html(&record.id);
    match record.source_url.as_deref() {
        Some(url) => format!(
            "<a href=\"{}\" target=\"_blank\" rel=\"noopener\">{}</a>",
            escape_html(url),
            name
        ),
        // A link without a target would be dead, so show the bare name.
        None => format!("<span>{}</span>", name),
    }
}

fn inline_thumbnail(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(data) => Some(format!("data:image/jpeg;base64,{}", STANDARD.encode(data))),
        Err(e) => {
            log::debug!("Thumbnail {} unreadable at render time: {}", path.display(), e);
            None
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
