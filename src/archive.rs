//! ZIP package access and container resolution.
//!
//! The central directory is scanned once; after that every entry is read by
//! offset straight from the [`ByteSource`], so entries can be decompressed
//! from several threads at once.

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;

use zip::ZipArchive;

use crate::dom::parse_xml;
use crate::error::{Error, Result};
use crate::io::{ByteSource, ByteSourceCursor};
use crate::select::Selection;
use crate::util::{decode_xml, resolve_path};

/// Fixed location of the container descriptor.
pub const CONTAINER_PATH: &str = "META-INF/container.xml";

/// File name conventionally used for the package document.
const DEFAULT_PACKAGE_NAME: &str = "content.opf";

#[derive(Debug, Clone, Copy)]
struct ZipEntryLoc {
    data_offset: u64,
    compressed_size: u64,
    compression: u16, // 0 = Store, 8 = Deflate
}

/// An opened ZIP package.
pub struct Archive {
    source: Arc<dyn ByteSource>,
    index: HashMap<String, ZipEntryLoc>,
}

impl Archive {
    /// Index the archive's central directory.
    ///
    /// Fails with [`Error::ArchiveOpen`] when the bytes are not a ZIP file.
    pub fn open(source: Arc<dyn ByteSource>) -> Result<Self> {
        let cursor = ByteSourceCursor::new(source.clone());
        let mut archive =
            ZipArchive::new(cursor).map_err(|e| Error::ArchiveOpen(e.to_string()))?;

        let mut index = HashMap::new();
        for i in 0..archive.len() {
            let file = archive
                .by_index_raw(i)
                .map_err(|e| Error::ArchiveOpen(e.to_string()))?;
            if file.is_dir() {
                continue;
            }

            index.insert(
                file.name().replace('\\', "/"),
                ZipEntryLoc {
                    data_offset: file.data_start(),
                    compressed_size: file.compressed_size(),
                    compression: compression_to_u16(file.compression()),
                },
            );
        }

        Ok(Self { source, index })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Entry names in sorted order.
    pub fn entry_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.index.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Read and decompress an entry.
    ///
    /// Fails with [`Error::ArchiveFileMissing`] when the entry does not exist
    /// or cannot be decompressed.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let loc = self
            .index
            .get(path)
            .ok_or_else(|| Error::ArchiveFileMissing(path.to_string()))?;

        let missing = |e: std::io::Error| Error::ArchiveFileMissing(format!("{path}: {e}"));

        let compressed = self
            .source
            .read_at(loc.data_offset, loc.compressed_size as usize)
            .map_err(missing)?;

        match loc.compression {
            0 => Ok(compressed),
            8 => {
                let mut decoder = flate2::read::DeflateDecoder::new(&compressed[..]);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out).map_err(missing)?;
                Ok(out)
            }
            method => Err(Error::ArchiveFileMissing(format!(
                "{path}: unsupported compression method {method}"
            ))),
        }
    }

    /// Read an entry as text, decoded by its XML declaration.
    pub fn read_text(&self, path: &str) -> Result<String> {
        Ok(decode_xml(&self.read(path)?).into_owned())
    }
}

fn compression_to_u16(method: zip::CompressionMethod) -> u16 {
    match method {
        zip::CompressionMethod::Stored => 0,
        zip::CompressionMethod::Deflated => 8,
        _ => 255,
    }
}

// ============================================================================
// Container
// ============================================================================

/// Where the package document lives inside the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRoot {
    /// Archive path of the package document.
    pub path: String,
}

impl PackageRoot {
    /// Resolve an href found in the package document.
    pub fn resolve(&self, href: &str) -> String {
        resolve_path(&self.path, href)
    }
}

/// Find the package document.
///
/// The container descriptor is authoritative. Without one, entry names are
/// scanned for a package document, preferring `content.opf`.
pub fn locate_package(archive: &Archive) -> Result<PackageRoot> {
    let path = if archive.contains(CONTAINER_PATH) {
        let text = archive.read_text(CONTAINER_PATH)?;
        root_file_from_container(&text)?
    } else {
        let path = scan_for_package(archive).ok_or_else(|| {
            Error::InvalidEbook(format!("{CONTAINER_PATH} not found and no package document"))
        })?;
        log::debug!("no {CONTAINER_PATH}, using package document found by scan: {path}");
        path
    };

    if !archive.contains(&path) {
        return Err(Error::ArchiveFileMissing(path));
    }

    Ok(PackageRoot { path })
}

fn root_file_from_container(text: &str) -> Result<String> {
    let dom = parse_xml(text)
        .map_err(|e| Error::InvalidEbook(format!("{CONTAINER_PATH}: {e}")))?;

    let full_path = Selection::document(&dom)
        .select("container rootfiles rootfile[full-path]")
        .or_tag("rootfile")
        .attribute("full-path")
        .map_err(|_| Error::InvalidEbook(format!("{CONTAINER_PATH}: no rootfile element")))?
        .map(|p| p.trim().replace('\\', "/"))
        .filter(|p| !p.is_empty())
        .ok_or_else(|| Error::InvalidEbook(format!("{CONTAINER_PATH}: rootfile has no full-path")))?;

    Ok(full_path.trim_start_matches('/').to_string())
}

fn scan_for_package(archive: &Archive) -> Option<String> {
    let names = archive.entry_names();

    names
        .iter()
        .find(|name| {
            name.rsplit('/')
                .next()
                .is_some_and(|file| file.eq_ignore_ascii_case(DEFAULT_PACKAGE_NAME))
        })
        .or_else(|| {
            names
                .iter()
                .find(|name| name.to_ascii_lowercase().ends_with(".opf"))
        })
        .map(|name| name.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;

    use super::*;
    use crate::io::MemorySource;

    fn build_zip(entries: &[(&str, &[u8])], method: zip::CompressionMethod) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(method);
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn open(entries: &[(&str, &[u8])]) -> Result<Archive> {
        let bytes = build_zip(entries, zip::CompressionMethod::Deflated);
        Archive::open(Arc::new(MemorySource::new(bytes)))
    }

    const CONTAINER: &[u8] = br#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    #[test]
    fn test_not_a_zip_is_archive_open() {
        let result = Archive::open(Arc::new(MemorySource::new(b"definitely not a zip".to_vec())));
        assert!(matches!(result, Err(Error::ArchiveOpen(_))));
    }

    #[test]
    fn test_read_stored_and_deflated() {
        for method in [zip::CompressionMethod::Stored, zip::CompressionMethod::Deflated] {
            let bytes = build_zip(&[("a/b.txt", b"hello hello hello")], method);
            let archive = Archive::open(Arc::new(MemorySource::new(bytes))).unwrap();
            assert_eq!(archive.read("a/b.txt").unwrap(), b"hello hello hello");
        }
    }

    #[test]
    fn test_missing_entry() {
        let archive = open(&[("a.txt", b"x")]).unwrap();
        assert!(matches!(archive.read("b.txt"), Err(Error::ArchiveFileMissing(_))));
    }

    #[test]
    fn test_locate_package_from_container() {
        let archive = open(&[
            (CONTAINER_PATH, CONTAINER),
            ("OEBPS/content.opf", b"<package/>"),
        ])
        .unwrap();

        let root = locate_package(&archive).unwrap();
        assert_eq!(root.path, "OEBPS/content.opf");
        assert_eq!(root.resolve("Text/ch1.xhtml"), "OEBPS/Text/ch1.xhtml");
    }

    #[test]
    fn test_container_pointing_nowhere() {
        let archive = open(&[(CONTAINER_PATH, CONTAINER)]).unwrap();
        assert_eq!(
            locate_package(&archive),
            Err(Error::ArchiveFileMissing("OEBPS/content.opf".to_string()))
        );
    }

    #[test]
    fn test_container_without_rootfile() {
        let archive = open(&[(CONTAINER_PATH, b"<container><rootfiles/></container>")]).unwrap();
        assert!(matches!(locate_package(&archive), Err(Error::InvalidEbook(_))));

        let archive = open(&[(CONTAINER_PATH, b"<container><rootfiles>")]).unwrap();
        assert!(matches!(locate_package(&archive), Err(Error::InvalidEbook(_))));
    }

    #[test]
    fn test_scan_fallback_without_container() {
        let archive = open(&[
            ("book/other.opf", b"<package/>"),
            ("book/content.opf", b"<package/>"),
        ])
        .unwrap();
        assert_eq!(locate_package(&archive).unwrap().path, "book/content.opf");

        let archive = open(&[("x/package.opf", b"<package/>")]).unwrap();
        assert_eq!(locate_package(&archive).unwrap().path, "x/package.opf");
    }

    #[test]
    fn test_no_container_no_package_is_invalid() {
        let archive = open(&[("mimetype", b"application/epub+zip")]).unwrap();
        assert!(matches!(locate_package(&archive), Err(Error::InvalidEbook(_))));
    }

    #[test]
    fn test_package_root_at_archive_root() {
        let root = PackageRoot {
            path: "content.opf".to_string(),
        };
        assert_eq!(root.resolve("ch1.xhtml"), "ch1.xhtml");
        assert_eq!(root.resolve("../ch1.xhtml"), "ch1.xhtml");
    }
}
