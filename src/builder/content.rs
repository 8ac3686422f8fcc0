//! Books and Chapters
//!
//! This module provides the [`Book`] and [`Chapter`] entities of a publication.
//! Chapters are only created through a book's ingestion methods, which stage the
//! chapter HTML into the workspace `OEBPS/Text` directory and immediately scan the
//! staged document for image and stylesheet references.
//!
//! ## Usage
//! ```rust, no_run
//! # fn main() -> Result<(), epub_packer::error::EpubError> {
//! use epub_packer::builder::Publication;
//!
//! let mut publication = Publication::new("/tmp")?;
//! let book = publication.add_book("Book1");
//! book.add_chapter_html("<p>Hi</p>", None)?
//!     .set_title("Opening")
//!     .set_wrap(true);
//! book.add_chapter_file("chapters/second.html", Some("second.html"))?;
//! # Ok(())
//! # }
//! ```

use std::{
    cell::RefCell,
    ffi::OsStr,
    fmt, fs,
    path::{Path, PathBuf},
};

use html5ever::{
    tendril::StrTendril,
    tokenizer::{
        BufferQueue, Tag, TagKind, Token, TokenSink, TokenSinkResult, Tokenizer, TokenizerOpts,
        states::RawKind,
    },
};
use indexmap::IndexMap;
use log::debug;

use crate::{error::EpubError, utils::ensure_readable_file};

/// Default chapter title
pub const DEFAULT_CHAPTER_TITLE: &str = "Chapter";

/// Hook invoked for a book before the package is built
pub type BookHook = Box<dyn FnMut(&mut Book) -> Result<(), EpubError>>;

/// Hook invoked for a chapter before the package is built
pub type ChapterHook = Box<dyn FnMut(&mut Chapter) -> Result<(), EpubError>>;

/// A book of the publication
///
/// Books are numbered in creation order starting at 1 and hold their chapters in
/// insertion order, keyed by staged file name.
pub struct Book {
    number: usize,
    title: String,

    /// Staging directory for chapter files, shared by every book of the publication
    text_dir: PathBuf,

    chapters: IndexMap<String, Chapter>,
    before_build: Option<BookHook>,
}

impl Book {
    pub(crate) fn new(number: usize, title: &str, text_dir: PathBuf) -> Self {
        Self {
            number,
            title: title.to_string(),
            text_dir,
            chapters: IndexMap::new(),
            before_build: None,
        }
    }

    /// Book sequence number, 1-based
    pub fn number(&self) -> usize {
        self.number
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    /// Chapters in insertion order
    pub fn chapters(&self) -> impl Iterator<Item = &Chapter> {
        self.chapters.values()
    }

    pub fn chapters_mut(&mut self) -> impl Iterator<Item = &mut Chapter> {
        self.chapters.values_mut()
    }

    pub fn chapter(&self, file_name: &str) -> Option<&Chapter> {
        self.chapters.get(file_name)
    }

    pub fn chapter_mut(&mut self, file_name: &str) -> Option<&mut Chapter> {
        self.chapters.get_mut(file_name)
    }

    pub fn chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Set the hook called for this book before the package is built
    pub fn set_before_build<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&mut Book) -> Result<(), EpubError> + 'static,
    {
        self.before_build = Some(Box::new(hook));
        self
    }

    /// Add a chapter from literal HTML text
    ///
    /// The text is written verbatim to `OEBPS/Text/<file name>`.
    ///
    /// # Parameters
    /// - `html`: Chapter markup
    /// - `name`: Staged file name; derived as `b<NN>c<NNN>.html` when `None`
    ///
    /// # Return
    /// - `Ok(&mut Chapter)`: The staged chapter, ready for further configuration
    /// - `Err(EpubError)`: The name is taken, the write failed or the staged file
    ///   could not be scanned
    pub fn add_chapter_html(
        &mut self,
        html: &str,
        name: Option<&str>,
    ) -> Result<&mut Chapter, EpubError> {
        let file_name = self.resolve_file_name(name)?;
        let target = self.text_dir.join(&file_name);

        fs::write(&target, html).map_err(|err| EpubError::io(&target, err))?;

        self.register_chapter(file_name, target)
    }

    /// Add a chapter by copying an existing HTML file
    ///
    /// # Parameters
    /// - `source`: Existing, readable regular file
    /// - `name`: Staged file name; derived as `b<NN>c<NNN>.html` when `None`
    pub fn add_chapter_file<P: AsRef<Path>>(
        &mut self,
        source: P,
        name: Option<&str>,
    ) -> Result<&mut Chapter, EpubError> {
        let source = source.as_ref();
        ensure_readable_file(source)?;

        let file_name = self.resolve_file_name(name)?;
        let target = self.text_dir.join(&file_name);

        fs::copy(source, &target).map_err(|err| EpubError::io(&target, err))?;

        self.register_chapter(file_name, target)
    }

    /// Runs the book hook, then the hook of every chapter in order
    pub(crate) fn run_before_build(&mut self) -> Result<(), EpubError> {
        if let Some(mut hook) = self.before_build.take() {
            let result = hook(&mut *self);
            self.before_build.get_or_insert(hook);
            result?;
        }

        for chapter in self.chapters.values_mut() {
            chapter.run_before_build()?;
        }

        Ok(())
    }

    /// Resolves the staged file name of a new chapter
    ///
    /// Names must be plain file names and unique within the Text directory,
    /// which is shared by all books.
    fn resolve_file_name(&self, name: Option<&str>) -> Result<String, EpubError> {
        let file_name = match name {
            Some(name) => {
                if name.is_empty() || Path::new(name).file_name() != Some(OsStr::new(name)) {
                    return Err(EpubError::input(name, "is not a plain file name"));
                }
                name.to_string()
            }
            None => format!("b{:02}c{:03}.html", self.number, self.chapters.len() + 1),
        };

        if self.chapters.contains_key(&file_name) || self.text_dir.join(&file_name).exists() {
            return Err(EpubError::DuplicateChapter {
                book: self.number,
                file_name,
            });
        }

        Ok(file_name)
    }

    fn register_chapter(
        &mut self,
        file_name: String,
        staged: PathBuf,
    ) -> Result<&mut Chapter, EpubError> {
        let chapter = match Chapter::load(&file_name, &staged) {
            Ok(chapter) => chapter,
            Err(err) => {
                // Leave no unreferenced file behind in the Text directory.
                let _ = fs::remove_file(&staged);
                return Err(err);
            }
        };

        debug!(
            "book {}: staged chapter {} ({} image references)",
            self.number,
            file_name,
            chapter.images.len()
        );

        let (index, _) = self.chapters.insert_full(file_name, chapter);
        Ok(&mut self.chapters[index])
    }
}

impl fmt::Debug for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Book")
            .field("number", &self.number)
            .field("title", &self.title)
            .field("chapters", &self.chapters)
            .field("before_build", &self.before_build.is_some())
            .finish()
    }
}

/// A chapter staged in the workspace
pub struct Chapter {
    file_name: String,
    title: String,
    wrap: bool,
    styles: Vec<String>,
    images: Vec<String>,
    before_build: Option<ChapterHook>,
}

impl Chapter {
    /// Creates a chapter for a staged file and records its references
    fn load(file_name: &str, staged: &Path) -> Result<Self, EpubError> {
        let (styles, images) = scan_references(staged)?;

        Ok(Self {
            file_name: file_name.to_string(),
            title: DEFAULT_CHAPTER_TITLE.to_string(),
            wrap: true,
            styles,
            images,
            before_build: None,
        })
    }

    /// Staged file name inside `OEBPS/Text`
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = title.to_string();
        self
    }

    /// Whether the chapter is wrapped with the publication header and footer
    pub fn wrap(&self) -> bool {
        self.wrap
    }

    pub fn set_wrap(&mut self, wrap: bool) -> &mut Self {
        self.wrap = wrap;
        self
    }

    /// Stylesheet references, discovered `<link rel="stylesheet">` first
    pub fn styles(&self) -> &[String] {
        &self.styles
    }

    /// Declare an additional stylesheet reference
    pub fn add_style(&mut self, style: &str) -> &mut Self {
        self.styles.push(style.to_string());
        self
    }

    /// Image references, discovered `<img src>` first in document order
    pub fn images(&self) -> &[String] {
        &self.images
    }

    /// Declare an additional image reference
    pub fn add_image(&mut self, image: &str) -> &mut Self {
        self.images.push(image.to_string());
        self
    }

    /// Set the hook called for this chapter before the package is built
    pub fn set_before_build<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&mut Chapter) -> Result<(), EpubError> + 'static,
    {
        self.before_build = Some(Box::new(hook));
        self
    }

    fn run_before_build(&mut self) -> Result<(), EpubError> {
        if let Some(mut hook) = self.before_build.take() {
            let result = hook(&mut *self);
            self.before_build.get_or_insert(hook);
            result?;
        }

        Ok(())
    }
}

impl fmt::Debug for Chapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chapter")
            .field("file_name", &self.file_name)
            .field("title", &self.title)
            .field("wrap", &self.wrap)
            .field("styles", &self.styles)
            .field("images", &self.images)
            .field("before_build", &self.before_build.is_some())
            .finish()
    }
}

/// Collects references from the token stream of one chapter
#[derive(Default)]
struct ReferenceSink {
    styles: RefCell<Vec<String>>,
    images: RefCell<Vec<String>>,
}

impl ReferenceSink {
    fn record(&self, tag: &Tag) {
        match &*tag.name {
            "img" => {
                if let Some(src) = tag_attribute(tag, "src") {
                    self.images.borrow_mut().push(src);
                }
            }
            "link" => {
                let is_stylesheet = tag_attribute(tag, "rel").is_some_and(|rel| {
                    rel.split_ascii_whitespace()
                        .any(|value| value.eq_ignore_ascii_case("stylesheet"))
                });
                if is_stylesheet {
                    if let Some(href) = tag_attribute(tag, "href") {
                        self.styles.borrow_mut().push(href);
                    }
                }
            }
            _ => {}
        }
    }
}

impl TokenSink for ReferenceSink {
    type Handle = ();

    fn process_token(&self, token: Token, _line_number: u64) -> TokenSinkResult<()> {
        let Token::TagToken(tag) = token else {
            return TokenSinkResult::Continue;
        };
        if tag.kind != TagKind::StartTag {
            return TokenSinkResult::Continue;
        }

        self.record(&tag);

        // Markup inside these elements is text, not tags.
        match &*tag.name {
            "script" => TokenSinkResult::RawData(RawKind::ScriptData),
            "style" | "xmp" | "iframe" | "noembed" | "noframes" => {
                TokenSinkResult::RawData(RawKind::Rawtext)
            }
            "title" | "textarea" => TokenSinkResult::RawData(RawKind::Rcdata),
            _ => TokenSinkResult::Continue,
        }
    }
}

/// Scans an HTML document for stylesheet and image references
///
/// The document is run through the HTML5 tokenizer, so unclosed void elements,
/// unquoted attribute values, stray `<` characters in text and mismatched tags
/// are all accepted. Tag and attribute names arrive lowercased and attribute
/// values arrive with their character references decoded.
///
/// ## Return
/// - `Ok((styles, images))`: `link[rel=stylesheet][href]` and `img[src]` values in document order
/// - `Err(EpubError)`: The file cannot be read or is not UTF-8 text
fn scan_references(path: &Path) -> Result<(Vec<String>, Vec<String>), EpubError> {
    let content = fs::read(path).map_err(|err| EpubError::parse(path, err))?;
    let text = String::from_utf8(content).map_err(|err| EpubError::parse(path, err))?;

    let input = BufferQueue::default();
    input.push_back(StrTendril::from(text));

    let tokenizer = Tokenizer::new(ReferenceSink::default(), TokenizerOpts::default());
    let _ = tokenizer.feed(&input);
    tokenizer.end();

    let sink = &tokenizer.sink;
    Ok((sink.styles.take(), sink.images.take()))
}

fn tag_attribute(tag: &Tag, name: &str) -> Option<String> {
    tag.attrs
        .iter()
        .find(|attr| &*attr.name.local == name)
        .map(|attr| attr.value.to_string())
}
