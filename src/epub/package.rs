//! Package document: manifest, spine and navigation lookup.

use std::collections::HashMap;

use crate::archive::{Archive, PackageRoot};
use crate::dom::{ArenaDom, parse_xml};
use crate::error::{Error, Result};
use crate::select::Selection;
use crate::util::{decode_href, split_fragment};

/// Media type of an NCX navigation document.
const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

/// Spine ids containing these are front/back matter, not chapters.
const SKIPPED_SPINE_IDS: &[&str] = &["cover", "notes"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    /// Archive path, resolved against the package document.
    pub path: String,
    pub media_type: Option<String>,
    pub properties: Option<String>,
}

/// A parsed package document.
#[derive(Debug)]
pub struct Package {
    pub root: PackageRoot,
    pub dom: ArenaDom,
    /// Manifest id -> item; the first item wins for duplicate ids.
    pub manifest: HashMap<String, ManifestItem>,
    /// Spine idrefs in reading order, cover and notes excluded.
    pub spine: Vec<String>,
    /// The spine's `toc` attribute.
    pub toc_id: Option<String>,
}

impl Package {
    /// Read and parse the package document at `root`.
    ///
    /// A document that is not well-formed XML fails with
    /// [`Error::InvalidEbook`].
    pub fn read(archive: &Archive, root: PackageRoot) -> Result<Self> {
        let text = archive.read_text(&root.path)?;
        let dom = parse_xml(&text)
            .map_err(|e| Error::InvalidEbook(format!("{}: {e}", root.path)))?;

        let manifest = parse_manifest(&dom, &root)?;

        let spine_node = Selection::document(&dom).select_tag("spine").or_absent();
        let toc_id = spine_node
            .attribute("toc")?
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());

        let spine = Selection::document(&dom)
            .select_tag("itemref")
            .or_absent()
            .nodes()?
            .into_iter()
            .filter_map(|itemref| dom.get_attr(itemref, "idref"))
            .map(|idref| idref.trim().to_string())
            .filter(|idref| {
                let lower = idref.to_lowercase();
                !SKIPPED_SPINE_IDS.iter().any(|skip| lower.contains(skip))
            })
            .collect();

        Ok(Self {
            root,
            dom,
            manifest,
            spine,
            toc_id,
        })
    }

    /// Archive paths of the spine, in order.
    ///
    /// An idref missing from the manifest fails with
    /// [`Error::ArchiveFileMissing`].
    pub fn spine_paths(&self) -> Result<Vec<String>> {
        self.spine
            .iter()
            .map(|idref| {
                self.manifest
                    .get(idref)
                    .map(|item| item.path.clone())
                    .ok_or_else(|| {
                        Error::ArchiveFileMissing(format!("spine item {idref:?} is not in the manifest"))
                    })
            })
            .collect()
    }

    /// Archive path of the NCX navigation document, if the package has one.
    ///
    /// The spine's `toc` reference wins, then the NCX media type, then an
    /// item with id `ncx`.
    pub fn navigation_path(&self) -> Option<&str> {
        let by_toc = self.toc_id.as_ref().and_then(|id| self.manifest.get(id));
        let by_media_type = || {
            let mut ncx: Vec<_> = self
                .manifest
                .values()
                .filter(|item| item.media_type.as_deref() == Some(NCX_MEDIA_TYPE))
                .collect();
            ncx.sort_by(|a, b| a.path.cmp(&b.path));
            ncx.into_iter().next()
        };

        by_toc
            .or_else(by_media_type)
            .or_else(|| self.manifest.get("ncx"))
            .map(|item| item.path.as_str())
    }

    /// The first manifest item whose `properties` include `property`,
    /// ordered by path for determinism.
    pub fn item_with_property(&self, property: &str) -> Option<&ManifestItem> {
        let mut items: Vec<_> = self
            .manifest
            .values()
            .filter(|item| {
                item.properties
                    .as_deref()
                    .is_some_and(|p| p.split_whitespace().any(|p| p == property))
            })
            .collect();
        items.sort_by(|a, b| a.path.cmp(&b.path));
        items.into_iter().next()
    }
}

fn parse_manifest(dom: &ArenaDom, root: &PackageRoot) -> Result<HashMap<String, ManifestItem>> {
    let mut manifest = HashMap::new();

    for item in Selection::document(dom).select_tag("item").or_absent().nodes()? {
        let (Some(id), Some(href)) = (dom.get_attr(item, "id"), dom.get_attr(item, "href")) else {
            continue;
        };
        let (href, _) = split_fragment(href);

        manifest
            .entry(id.trim().to_string())
            .or_insert_with(|| ManifestItem {
                path: root.resolve(&decode_href(href)),
                media_type: dom.get_attr(item, "media-type").map(|m| m.trim().to_string()),
                properties: dom.get_attr(item, "properties").map(str::to_string),
            });
    }

    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};
    use std::sync::Arc;

    use zip::write::SimpleFileOptions;

    use super::*;
    use crate::io::MemorySource;

    fn archive(files: &[(&str, &str)]) -> Archive {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in files {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        let bytes = zip.finish().unwrap().into_inner();
        Archive::open(Arc::new(MemorySource::new(bytes))).unwrap()
    }

    fn root() -> PackageRoot {
        PackageRoot {
            path: "OEBPS/content.opf".to_string(),
        }
    }

    const OPF: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata/>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="cover" href="Text/cover.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch1" href="Text/chapter%201.xhtml" media-type="application/xhtml+xml"/>
    <item id="ch2" href="Text/ch2.xhtml#start" media-type="application/xhtml+xml"/>
    <item id="ch1" href="Text/duplicate.xhtml" media-type="application/xhtml+xml"/>
    <item id="img" href="../Images/cover.jpg" media-type="image/jpeg" properties="cover-image"/>
    <item href="no-id.xhtml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="cover"/>
    <itemref idref="ch1"/>
    <itemref idref="Notes_1"/>
    <itemref idref="ch2"/>
  </spine>
</package>"#;

    #[test]
    fn test_manifest_and_spine() {
        let archive = archive(&[("OEBPS/content.opf", OPF)]);
        let package = Package::read(&archive, root()).unwrap();

        assert_eq!(package.manifest.len(), 5);
        assert_eq!(package.manifest["ch1"].path, "OEBPS/Text/chapter 1.xhtml");
        assert_eq!(package.manifest["ch2"].path, "OEBPS/Text/ch2.xhtml");
        assert_eq!(package.manifest["img"].path, "Images/cover.jpg");

        assert_eq!(package.spine, vec!["ch1", "ch2"]);
        assert_eq!(
            package.spine_paths().unwrap(),
            vec!["OEBPS/Text/chapter 1.xhtml", "OEBPS/Text/ch2.xhtml"]
        );
        assert_eq!(package.navigation_path(), Some("OEBPS/toc.ncx"));
        assert_eq!(
            package.item_with_property("cover-image").map(|i| i.path.as_str()),
            Some("Images/cover.jpg")
        );
    }

    #[test]
    fn test_unknown_spine_id_is_missing_file() {
        let opf = r#"<package><manifest/><spine><itemref idref="ghost"/></spine></package>"#;
        let archive = archive(&[("OEBPS/content.opf", opf)]);
        let package = Package::read(&archive, root()).unwrap();

        assert!(matches!(package.spine_paths(), Err(Error::ArchiveFileMissing(_))));
    }

    #[test]
    fn test_navigation_found_by_media_type() {
        let opf = r#"<package><manifest>
            <item id="toc" href="nav/toc.ncx" media-type="application/x-dtbncx+xml"/>
        </manifest><spine/></package>"#;
        let archive = archive(&[("OEBPS/content.opf", opf)]);
        let package = Package::read(&archive, root()).unwrap();

        assert_eq!(package.toc_id, None);
        assert_eq!(package.navigation_path(), Some("OEBPS/nav/toc.ncx"));
    }

    #[test]
    fn test_malformed_package_is_invalid() {
        let archive = archive(&[("OEBPS/content.opf", "<package><manifest></package>")]);
        assert!(matches!(
            Package::read(&archive, root()),
            Err(Error::InvalidEbook(_))
        ));
    }
}
