//! Format dispatch: validate the input and route it to its handler.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::book::Book;
use crate::chapter::build_chapters;
use crate::epub::read_package;
use crate::error::{Error, Result};
use crate::fb2::read_fb2;
use crate::io::{ByteSource, FileSource, MemorySource};
use crate::normalize::NormalizerConfig;

/// Input formats, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// FictionBook 2: a single XML document.
    Fb2,
    /// ZIP package with a container descriptor (`.epub`, `.mobi`).
    Package,
}

impl Format {
    /// Detect the format from a file extension, case-insensitively.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "fb2" => Some(Self::Fb2),
            "epub" | "mobi" => Some(Self::Package),
            _ => None,
        }
    }
}

/// A named book file, in memory or on disk.
#[derive(Clone)]
pub struct BookFile {
    name: String,
    source: Arc<dyn ByteSource>,
}

impl BookFile {
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::from_source(name, Arc::new(MemorySource::new(data)))
    }

    pub fn from_source(name: impl Into<String>, source: Arc<dyn ByteSource>) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// Open a file on disk. Failing to open it is [`Error::MissingFile`].
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .and_then(FileSource::new)
            .map_err(|e| Error::MissingFile(format!("{}: {e}", path.display())))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_source(name, Arc::new(file)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> u64 {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Text after the last dot, as written.
    pub fn extension(&self) -> Option<&str> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty())
    }

    /// File name without its extension, used when the book has no title.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }
}

impl fmt::Debug for BookFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BookFile")
            .field("name", &self.name)
            .field("len", &self.source.len())
            .finish()
    }
}

/// Parse configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Inputs shorter than this are treated as missing.
    pub min_file_size: u64,
    /// Chapters with fewer paragraphs than this are dropped; `0` keeps all.
    pub min_chapter_items: usize,
    pub normalizer: NormalizerConfig,
    /// Threads used to parse package content documents; `None` uses the
    /// global pool.
    pub max_fetch_threads: Option<usize>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            min_file_size: 10,
            min_chapter_items: 2,
            normalizer: NormalizerConfig::default(),
            max_fetch_threads: None,
        }
    }
}

impl ParseOptions {
    pub fn with_min_file_size(mut self, bytes: u64) -> Self {
        self.min_file_size = bytes;
        self
    }

    pub fn with_min_chapter_items(mut self, items: usize) -> Self {
        self.min_chapter_items = items;
        self
    }

    pub fn with_normalizer(mut self, normalizer: NormalizerConfig) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_max_fetch_threads(mut self, threads: usize) -> Self {
        self.max_fetch_threads = Some(threads);
        self
    }
}

/// Parses book files with a fixed set of options.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    options: ParseOptions,
}

impl Parser {
    pub fn new(options: ParseOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse one book file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use folio::{BookFile, ParseOptions, Parser};
    ///
    /// let file = BookFile::open("book.fb2")?;
    /// let book = Parser::new(ParseOptions::default().with_min_chapter_items(0))
    ///     .parse(Some(&file))?;
    /// println!("{}: {} chapters", book.metadata.name, book.chapters.len());
    /// # Ok::<(), folio::Error>(())
    /// ```
    pub fn parse(&self, file: Option<&BookFile>) -> Result<Book> {
        let file = file.ok_or_else(|| Error::MissingFile("no file selected".to_string()))?;

        let extension = file.extension().unwrap_or_default();
        let format = Format::from_extension(extension)
            .ok_or_else(|| Error::UnsupportedExtension(extension.to_ascii_lowercase()))?;

        if file.len() < self.options.min_file_size {
            return Err(Error::MissingFile(format!(
                "{} is {} bytes, expected at least {}",
                file.name(),
                file.len(),
                self.options.min_file_size
            )));
        }
        log::debug!("parsing {} as {format:?}", file.name());

        let (metadata, fragments) = match format {
            Format::Fb2 => {
                let bytes = file
                    .source
                    .read_all()
                    .map_err(|e| Error::MissingFile(format!("{}: {e}", file.name())))?;
                read_fb2(&bytes, file.stem(), &self.options.normalizer)?
            }
            Format::Package => read_package(
                file.source.clone(),
                file.stem(),
                self.options.max_fetch_threads,
            )?,
        };

        let chapters = build_chapters(
            fragments,
            metadata.language.as_deref(),
            self.options.min_chapter_items,
        )?;
        if chapters.is_empty() {
            return Err(Error::CorruptedData(format!(
                "{}: no chapter content could be assembled",
                file.name()
            )));
        }

        Ok(Book { metadata, chapters })
    }
}

/// Parse a book file with default options.
pub fn parse(file: Option<&BookFile>) -> Result<Book> {
    Parser::default().parse(file)
}

/// Open and parse a book file on disk with default options.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Book> {
    let file = BookFile::open(path)?;
    parse(Some(&file))
}
