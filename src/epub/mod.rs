//! ZIP package handler (EPUB, and MOBI files shipped as EPUB packages).
//!
//! Container descriptor → package document → metadata, then reading order
//! from the NCX navigation map when there is one, else from the spine.

mod content;
mod metadata;
mod nav;
mod package;

pub use content::fetch_fragments;
pub use metadata::extract_metadata;
pub use nav::{ChapterOrderEntry, parse_ncx, read_navigation};
pub use package::{ManifestItem, Package};

use std::sync::Arc;

use crate::archive::{Archive, locate_package};
use crate::book::Metadata;
use crate::chapter::Fragment;
use crate::error::Result;
use crate::io::ByteSource;

/// Parse a package into metadata and chapter fragments.
///
/// `max_fetch_threads` bounds the pool content documents are parsed on;
/// `None` uses the global pool.
pub fn read_package(
    source: Arc<dyn ByteSource>,
    fallback_name: &str,
    max_fetch_threads: Option<usize>,
) -> Result<(Metadata, Vec<Fragment>)> {
    let archive = Archive::open(source)?;
    let root = locate_package(&archive)?;
    let package = Package::read(&archive, root)?;

    let metadata = extract_metadata(&package, &archive, fallback_name)?;
    let order = reading_order(&archive, &package)?;
    let fragments = fetch_fragments(&archive, &order, max_fetch_threads)?;

    Ok((metadata, fragments))
}

/// Navigation order when the package has a usable NCX, else spine order.
pub fn reading_order(archive: &Archive, package: &Package) -> Result<Vec<ChapterOrderEntry>> {
    if let Some(ncx) = package.navigation_path()
        && let Some(entries) = read_navigation(archive, ncx)?
    {
        log::debug!("reading order from {ncx}: {} entries", entries.len());
        return Ok(entries);
    }

    let spine = package.spine_paths()?;
    log::debug!("reading order from spine: {} entries", spine.len());
    Ok(spine
        .into_iter()
        .enumerate()
        .map(|(position, path)| ChapterOrderEntry::from_spine(position, path))
        .collect())
}
