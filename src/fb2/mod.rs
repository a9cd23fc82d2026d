//! FictionBook 2 (single-document) handler.
//!
//! One XML document carries both the metadata (`description/title-info`) and
//! the text (`body/section`). Encodings other than UTF-8 are declared in the
//! XML prolog and honored.

mod metadata;
mod sections;

pub use metadata::extract_metadata;
pub use sections::body_fragments;

use crate::book::Metadata;
use crate::chapter::Fragment;
use crate::dom::parse_xml;
use crate::error::{Error, Result};
use crate::normalize::NormalizerConfig;
use crate::util::decode_xml;

/// Parse an FB2 document into metadata and chapter fragments.
pub fn read_fb2(
    bytes: &[u8],
    fallback_name: &str,
    normalizer: &NormalizerConfig,
) -> Result<(Metadata, Vec<Fragment>)> {
    let text = decode_xml(bytes);
    let dom = parse_xml(&text).map_err(|e| Error::CorruptedData(format!("FB2 XML: {e}")))?;

    let metadata = extract_metadata(&dom, fallback_name, normalizer)?;
    let fragments = body_fragments(&dom)?;
    log::debug!("fb2: {} body fragment(s)", fragments.len());

    Ok((metadata, fragments))
}
