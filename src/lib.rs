//! # folio
//!
//! Normalize FB2 and EPUB ebooks into one in-memory shape: metadata plus
//! titled, sanitized chapters.
//!
//! ## Features
//!
//! - FB2 single documents in any declared encoding
//! - EPUB packages (and MOBI files shipped as EPUB packages), ordered by the
//!   NCX navigation map or the spine
//! - Chapter recovery from inline delimiter markers when a book arrives as
//!   one document
//! - Cover images as base64 data URIs
//!
//! ## Quick Start
//!
//! ```no_run
//! let book = folio::parse_file("book.epub")?;
//!
//! println!("{} by {:?}", book.metadata.name, book.metadata.author);
//! for chapter in &book.chapters {
//!     println!("{}", chapter.title);
//! }
//! # Ok::<(), folio::Error>(())
//! ```
//!
//! ## In-memory input
//!
//! ```
//! use folio::{BookFile, Error};
//!
//! let file = BookFile::from_bytes("notes.pdf", vec![0; 64]);
//! assert_eq!(
//!     folio::parse(Some(&file)),
//!     Err(Error::UnsupportedExtension("pdf".to_string()))
//! );
//! ```

pub mod archive;
pub mod book;
pub mod chapter;
pub mod dom;
pub mod epub;
pub mod error;
pub mod fb2;
pub mod io;
pub mod normalize;
pub mod parser;
pub mod select;
pub(crate) mod util;

pub use book::{Book, Chapter, CoverImage, Metadata, Sequence};
pub use error::{Error, Result};
pub use normalize::NormalizerConfig;
pub use parser::{BookFile, Format, ParseOptions, Parser, parse, parse_file};
