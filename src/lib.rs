//! Epub packer
//!
//! A Rust library for assembling EPUB publication packages from caller supplied
//! content: chapters (HTML), images, fonts, stylesheets, metadata and structural
//! hints (books, cover, table of contents).
//!
//! The library stages every file in a private workspace directory, generates the
//! structural documents required by the OPF 2.0 specification (`container.xml`,
//! `content.opf` and `toc.ncx`) and packs the staged tree into a ZIP container.
//!
//! ## Features
//!
//! - Publication, book and chapter entity model with ordered books and chapters.
//! - Chapter ingestion from literal HTML or from files, with image reference discovery.
//! - Optional HTML entity decoding and header/footer wrapping of chapters.
//! - Pre-build hooks on publications, books and chapters.
//! - Cover page, synthesized content page, navigation map and package document generation.
//!
//! ## Quick Start
//!
//! ```rust, no_run
//! # fn main() -> Result<(), epub_packer::error::EpubError> {
//! use epub_packer::{builder::Publication, types::ContentPlacement};
//!
//! let mut publication = Publication::new("/tmp")?;
//! publication
//!     .set_title("Collected Stories")
//!     .set_language("en")
//!     .add_creator("aut", "Jane Doe", Some("Doe, Jane"))
//!     .place_content("Contents", ContentPlacement::End);
//! publication.set_cover("assets/cover.jpg", Some("Cover"))?;
//!
//! let book = publication.add_book("Stories");
//! book.add_chapter_html("<title>First</title></head><body><p>Once upon a time</p>", None)?
//!     .set_title("First");
//! book.add_chapter_file("chapters/second.html", None)?
//!     .set_title("Second");
//!
//! publication.build("stories.epub")?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod builder;
pub mod error;
pub mod types;
pub(crate) mod utils;
pub mod workspace;

pub use builder::{
    Publication,
    content::{Book, Chapter},
};
pub use error::EpubError;
pub use types::{ContentPlacement, Creator, Identifier};
pub use utils::generate_identifier;
