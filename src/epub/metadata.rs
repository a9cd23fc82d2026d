//! Package document `<metadata>` extraction.

use crate::archive::Archive;
use crate::book::{CoverImage, Metadata, Sequence};
use crate::dom::{ArenaNodeId, normalize_whitespace, parse_html};
use crate::error::{Error, Result};
use crate::normalize::{classify_language, normalize_genre, parse_date};
use crate::select::Selection;

use super::package::Package;

/// Custom metas FB2 converters write, tried in this order before `dc:date`.
const DATE_METAS: &[&str] = &["FB2.book-info.date", "FB2.publish-info.year"];

const SEQUENCE_META: &str = "FB2.book-info.sequence";

/// Extract metadata from the package document.
///
/// A package without a metadata block is corrupted. The cover is read from
/// the archive; a cover that cannot be found or read is logged and left
/// out.
pub fn extract_metadata(package: &Package, archive: &Archive, fallback_name: &str) -> Result<Metadata> {
    let dom = &package.dom;
    let block = Selection::document(dom)
        .select_tag("metadata")
        .first()
        .ok()
        .flatten()
        .ok_or_else(|| Error::CorruptedData(format!("{}: no metadata block", package.root.path)))?;

    let dc = |name: &str| {
        Selection::new(dom, block)
            .select_tag(&format!("dc:{name}"))
            .or_tag(name)
            .or_absent()
    };

    let name = dc("title").plain_text()?;
    let name = if name.is_empty() {
        fallback_name.to_string()
    } else {
        name
    };

    let creators = dc("creator");
    let authors: Vec<String> = (0..creators.nodes()?.len())
        .map(|i| creators.plain_text_at(i))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .filter(|a| !a.is_empty())
        .collect();

    let subjects = dc("subject");
    let genres: Vec<String> = (0..subjects.nodes()?.len())
        .map(|i| subjects.plain_text_at(i).map(|s| normalize_genre(&s)))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .filter(|g| !g.is_empty())
        .collect();

    let annotation = description(&dc("description").plain_text()?);

    let language = classify_language(&dc("language").plain_text()?);

    let release_date = {
        let mut candidates = Vec::new();
        for meta in DATE_METAS {
            candidates.extend(meta_content(package, block, meta)?);
        }
        candidates.push(dc("date").plain_text()?);
        candidates.iter().find_map(|raw| parse_date(raw))
    };

    Ok(Metadata {
        name,
        author: (!authors.is_empty()).then(|| authors.join(", ")),
        release_date,
        annotation,
        genres: (!genres.is_empty()).then_some(genres),
        keywords: None,
        language,
        cover: cover(package, block, archive)?,
        sequence: sequence(package, block)?,
    })
}

/// `content` of `<meta name="...">` inside the metadata block.
fn meta_content(package: &Package, block: ArenaNodeId, name: &str) -> Result<Option<String>> {
    Ok(Selection::new(&package.dom, block)
        .select(&format!(r#"meta[name="{name}"]"#))
        .or_absent()
        .attribute("content")?
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty()))
}

/// Descriptions are often escaped HTML; tags are dropped.
fn description(raw: &str) -> Option<Vec<String>> {
    let text = if raw.contains('<') {
        let dom = parse_html(raw.as_bytes());
        normalize_whitespace(&dom.deep_text(dom.document()))
    } else {
        raw.to_string()
    };
    (!text.is_empty()).then(|| vec![text])
}

fn cover(package: &Package, block: ArenaNodeId, archive: &Archive) -> Result<Option<CoverImage>> {
    let item = match meta_content(package, block, "cover")? {
        Some(id) => match package.manifest.get(&id) {
            Some(item) => Some(item),
            None => {
                log::warn!("cover meta points at unknown manifest id {id:?}");
                None
            }
        },
        None => None,
    };
    let Some(item) = item.or_else(|| package.item_with_property("cover-image")) else {
        return Ok(None);
    };

    match archive.read(&item.path) {
        Ok(bytes) => Ok(Some(CoverImage::from_bytes(&bytes, item.media_type.as_deref()))),
        Err(e) => {
            log::warn!("cover image unavailable: {e}");
            Ok(None)
        }
    }
}

/// `"name; number=N"`, else calibre's series metas.
fn sequence(package: &Package, block: ArenaNodeId) -> Result<Option<Sequence>> {
    if let Some(value) = meta_content(package, block, SEQUENCE_META)? {
        let mut parts = value.split(';').map(str::trim);
        let name = parts.next().unwrap_or_default().to_string();
        let number = parts
            .next()
            .and_then(|part| part.split_once('='))
            .and_then(|(_, n)| n.trim().parse::<i64>().ok());
        if !name.is_empty() {
            return Ok(Some(Sequence { name, number }));
        }
    }

    let Some(name) = meta_content(package, block, "calibre:series")? else {
        return Ok(None);
    };
    let number = meta_content(package, block, "calibre:series_index")?
        .and_then(|n| n.parse::<f64>().ok())
        .filter(|n| n.fract() == 0.0)
        .map(|n| n as i64);

    Ok(Some(Sequence { name, number }))
}
