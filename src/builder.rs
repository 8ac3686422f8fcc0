//! Publication Builder
//!
//! This module provides the [`Publication`], the root aggregate of an EPUB package,
//! and the build pipeline that turns its books, chapters, assets and metadata into
//! an EPUB 2 container.
//!
//! ## Usage
//!
//! ```rust, no_run
//! # fn main() -> Result<(), epub_packer::error::EpubError> {
//! use epub_packer::builder::Publication;
//!
//! let mut publication = Publication::new("/tmp")?;
//! publication
//!     .set_title("Test Book")
//!     .set_language("en")
//!     .add_creator("aut", "Jane Doe", Some("Doe, Jane"))
//!     .add_style("assets/main.css")?;
//!
//! let book = publication.add_book("Book1");
//! book.add_chapter_html("<title>One</title></head><body><p>Hi</p>", None)?
//!     .set_title("One");
//!
//! publication.build("output.epub")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Build stages
//!
//! `build` runs the following stages in order and stops at the first failure:
//! entity decoding, chapter wrapping, pre-build hooks, content page synthesis,
//! cover page, navigation map (`toc.ncx`), package document (`content.opf`)
//! and archiving.
//!
//! ## Notes
//!
//! - Files are staged in a private workspace below the base directory passed to
//!   [`Publication::new`]; the workspace is removed when the publication is dropped,
//!   whether or not a build ran or succeeded.
//! - All asset files must exist on the local file system when they are added.

pub mod content;

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use chrono::Utc;
use log::{debug, info, warn};

use crate::{
    archive::pack,
    builder::content::Book,
    error::EpubError,
    types::{ContentPlacement, Creator, Identifier, ManifestItem, NavPoint, SpineItem},
    utils::{
        XmlEmitter, base_name, decode_entities, detect_mime_type, ensure_readable_file,
        generate_identifier, package_path, read_input_file, remove_leading_slash,
    },
    workspace::{FONTS, IMAGES, NCX_FILE, PACKAGE_FILE, STYLES, TEXTS, Workspace},
};

/// Fixed file name of the cover page inside `OEBPS/Text`
pub const COVER_FILE: &str = "cover.xhtml";

/// Fixed file name of the synthesized content page inside `OEBPS/Text`
pub const CONTENT_FILE: &str = "content.html";

pub const DEFAULT_COVER_TITLE: &str = "Cover";

pub const DEFAULT_CHAPTER_HEADER: &str = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops" xml:lang="en">
    <head>
"#;

pub const DEFAULT_CHAPTER_FOOTER: &str = r#"
    </body>
</html>
"#;

const COVER_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en">
<head>
    <meta http-equiv="Content-Type" content="text/html; charset=UTF-8"/>
    <title>{alt}</title>
    <style type="text/css">
        body { margin: 0; padding: 0; text-align: center; }
        img { max-width: 100%; max-height: 100%; }
    </style>
</head>
<body>
<div class="cover">
    <img src="{image}" alt="{alt}"/>
</div>
</body>
</html>
"#;

const NCX_GENERATOR: &str = concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"));

/// Hook invoked for the publication before the package is built
pub type PublicationHook = Box<dyn FnMut(&mut Publication) -> Result<(), EpubError>>;

/// Synthesized content page request
#[derive(Debug, Clone, PartialEq, Eq)]
struct ContentPage {
    title: String,
    placement: ContentPlacement,
}

/// EPUB Publication
///
/// The root aggregate of a package: metadata, books, registered assets and the
/// staging workspace. Entities are mutated through this structure until
/// [`Publication::build`] consumes it.
pub struct Publication {
    /// Generated once at construction
    identifier: Identifier,

    workspace: Workspace,

    title: Option<String>,
    language: Option<String>,
    publisher: Option<String>,
    description: Option<String>,
    subjects: Vec<String>,
    creators: Vec<Creator>,

    books: Vec<Book>,

    /// Registered assets as paths relative to `OEBPS`, e.g. `Styles/main.css`
    styles: Vec<String>,
    fonts: Vec<String>,
    images: Vec<String>,

    cover: Option<String>,
    cover_title: String,

    chapter_header: String,
    chapter_footer: String,
    decode_entities: bool,

    content_page: Option<ContentPage>,
    before_build: Option<PublicationHook>,
}

impl Publication {
    /// Create a new `Publication` staging its files below `base_dir`
    ///
    /// # Return
    /// - `Ok(Publication)`: Identifier generated and workspace skeleton created
    /// - `Err(EpubError)`: `base_dir` is unusable or the skeleton could not be written
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, EpubError> {
        let identifier = generate_identifier()?;
        let workspace = Workspace::create(base_dir)?;

        Ok(Publication {
            identifier,
            workspace,

            title: None,
            language: None,
            publisher: None,
            description: None,
            subjects: vec![],
            creators: vec![],

            books: vec![],

            styles: vec![],
            fonts: vec![],
            images: vec![],

            cover: None,
            cover_title: DEFAULT_COVER_TITLE.to_string(),

            chapter_header: DEFAULT_CHAPTER_HEADER.to_string(),
            chapter_footer: DEFAULT_CHAPTER_FOOTER.to_string(),
            decode_entities: true,

            content_page: None,
            before_build: None,
        })
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    /// Root of the staging tree
    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn set_title(&mut self, title: &str) -> &mut Self {
        self.title = Some(title.to_string());
        self
    }

    pub fn set_language(&mut self, language: &str) -> &mut Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn set_publisher(&mut self, publisher: &str) -> &mut Self {
        self.publisher = Some(publisher.to_string());
        self
    }

    pub fn set_description(&mut self, description: &str) -> &mut Self {
        self.description = Some(description.to_string());
        self
    }

    /// Add a subject (keyword)
    pub fn add_subject(&mut self, subject: &str) -> &mut Self {
        self.subjects.push(subject.to_string());
        self
    }

    /// Add a creator
    ///
    /// # Parameters
    /// - `role`: Role code such as `aut` or `ill`
    /// - `name`: Display name
    /// - `file_as`: Optional sort key in "Last, First" form
    pub fn add_creator(&mut self, role: &str, name: &str, file_as: Option<&str>) -> &mut Self {
        self.creators.push(Creator::new(role, name, file_as));
        self
    }

    pub fn creators(&self) -> &[Creator] {
        &self.creators
    }

    /// Add a book; its number is the current book count plus one
    pub fn add_book(&mut self, title: &str) -> &mut Book {
        let number = self.books.len() + 1;
        self.books
            .push(Book::new(number, title, self.workspace.text_dir()));

        let index = self.books.len() - 1;
        &mut self.books[index]
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn books_mut(&mut self) -> impl Iterator<Item = &mut Book> {
        self.books.iter_mut()
    }

    /// Get a book by its 1-based number
    pub fn book_mut(&mut self, number: usize) -> Option<&mut Book> {
        number
            .checked_sub(1)
            .and_then(|index| self.books.get_mut(index))
    }

    /// Register a stylesheet, copied to `OEBPS/Styles`
    pub fn add_style<P: AsRef<Path>>(&mut self, source: P) -> Result<&mut Self, EpubError> {
        let staged = self.add_file(source.as_ref(), STYLES)?;
        self.styles.push(staged);
        Ok(self)
    }

    /// Register a font, copied to `OEBPS/Fonts`
    pub fn add_font<P: AsRef<Path>>(&mut self, source: P) -> Result<&mut Self, EpubError> {
        let staged = self.add_file(source.as_ref(), FONTS)?;
        self.fonts.push(staged);
        Ok(self)
    }

    /// Register an image, copied to `OEBPS/Images`
    pub fn add_image<P: AsRef<Path>>(&mut self, source: P) -> Result<&mut Self, EpubError> {
        let staged = self.add_file(source.as_ref(), IMAGES)?;
        self.images.push(staged);
        Ok(self)
    }

    pub fn styles(&self) -> &[String] {
        &self.styles
    }

    pub fn fonts(&self) -> &[String] {
        &self.fonts
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    /// Set the cover image, copied to `OEBPS/Images`
    ///
    /// A previously set cover image is replaced; its staged copy is removed once the
    /// new image has been staged, so a failed call keeps the old cover.
    ///
    /// # Parameters
    /// - `source`: Image file
    /// - `title`: Cover display title; keeps the current one ("Cover" by default) when `None`
    pub fn set_cover<P: AsRef<Path>>(
        &mut self,
        source: P,
        title: Option<&str>,
    ) -> Result<&mut Self, EpubError> {
        let staged = self.stage_file(source.as_ref(), IMAGES, self.cover.as_deref())?;

        if let Some(previous) = self.cover.replace(staged.clone()) {
            if previous != staged {
                let path = self.workspace.oebps_file(&previous);
                if let Err(err) = fs::remove_file(&path) {
                    if err.kind() != std::io::ErrorKind::NotFound {
                        warn!("cannot remove replaced cover {}: {}", path.display(), err);
                    }
                }
            }
        }

        if let Some(title) = title {
            self.cover_title = title.to_string();
        }

        Ok(self)
    }

    /// Staged cover image path relative to `OEBPS`
    pub fn cover(&self) -> Option<&str> {
        self.cover.as_deref()
    }

    pub fn cover_title(&self) -> &str {
        &self.cover_title
    }

    /// Set the chapter wrapping header from HTML
    ///
    /// An empty header together with an empty footer disables wrapping.
    pub fn set_chapter_header(&mut self, html: &str) -> &mut Self {
        self.chapter_header = html.to_string();
        self
    }

    /// Set the chapter wrapping header from a file
    pub fn set_chapter_header_file<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<&mut Self, EpubError> {
        let html = read_input_file(path.as_ref())?;
        Ok(self.set_chapter_header(&html))
    }

    pub fn set_chapter_footer(&mut self, html: &str) -> &mut Self {
        self.chapter_footer = html.to_string();
        self
    }

    /// Set the chapter wrapping footer from a file
    pub fn set_chapter_footer_file<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> Result<&mut Self, EpubError> {
        let html = read_input_file(path.as_ref())?;
        Ok(self.set_chapter_footer(&html))
    }

    /// Enable or disable decoding of HTML entities in staged chapters
    pub fn set_decode_entities(&mut self, decode: bool) -> &mut Self {
        self.decode_entities = decode;
        self
    }

    /// Request a synthesized content page listing every chapter
    ///
    /// Only single-book publications with [`ContentPlacement::End`] are supported;
    /// other combinations make [`Publication::build`] fail.
    pub fn place_content(&mut self, title: &str, placement: ContentPlacement) -> &mut Self {
        self.content_page = Some(ContentPage {
            title: title.to_string(),
            placement,
        });
        self
    }

    /// Set the hook called for the publication before the package is built
    ///
    /// Hooks may change metadata, titles and asset registrations. Adding books or
    /// chapters from a hook makes the build fail.
    pub fn set_before_build<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&mut Publication) -> Result<(), EpubError> + 'static,
    {
        self.before_build = Some(Box::new(hook));
        self
    }

    /// Remove the staging workspace
    ///
    /// Dropping the publication has the same effect; this variant reports failures.
    pub fn dispose(self) -> Result<(), EpubError> {
        self.workspace.destroy()
    }

    /// Builds the EPUB file and saves it to the specified path
    ///
    /// The publication is consumed; its workspace is removed once the build
    /// finishes, successfully or not.
    ///
    /// # Parameters
    /// - `output_path`: Output file path, overwritten if it exists
    ///
    /// # Return
    /// - `Ok(())`: Build successful
    /// - `Err(EpubError)`: The first stage failure
    pub fn build<P: AsRef<Path>>(mut self, output_path: P) -> Result<(), EpubError> {
        let output_path = output_path.as_ref();
        info!("building publication {} into {}", self.identifier, output_path.display());

        if self.decode_entities {
            self.decode_chapter_entities()?;
        }

        if !self.chapter_header.is_empty() || !self.chapter_footer.is_empty() {
            self.wrap_chapters()?;
        }

        self.run_before_build()?;

        if self.content_page.is_some() {
            self.make_content_page()?;
        }

        self.make_cover_file()?;
        self.make_ncx_file()?;
        self.make_opf_file()?;

        debug!("stage: archive");
        let entries = pack(self.workspace.path(), output_path)?;
        info!("wrote {} entries to {}", entries, output_path.display());

        Ok(())
    }

    /// Copies a caller supplied asset into `OEBPS/<dir>`
    ///
    /// Returns the staged path relative to `OEBPS`.
    fn add_file(&self, source: &Path, dir: &str) -> Result<String, EpubError> {
        self.stage_file(source, dir, None)
    }

    /// Copies an asset, allowing it to take the staged path of `replacing`
    fn stage_file(
        &self,
        source: &Path,
        dir: &str,
        replacing: Option<&str>,
    ) -> Result<String, EpubError> {
        ensure_readable_file(source)?;

        let name = base_name(source).ok_or_else(|| EpubError::input(source, "has no file name"))?;
        let staged = package_path(dir, &name);

        let registered = self
            .styles
            .iter()
            .chain(&self.fonts)
            .chain(&self.images)
            .chain(&self.cover)
            .filter(|path| Some(path.as_str()) != replacing)
            .any(|path| *path == staged);
        if registered {
            return Err(EpubError::DuplicateResource { path: staged });
        }

        let target = self.workspace.oebps_file(&staged);
        fs::copy(source, &target).map_err(|err| EpubError::io(&target, err))?;

        Ok(staged)
    }

    fn chapter_path(&self, file_name: &str) -> PathBuf {
        self.workspace.text_dir().join(file_name)
    }

    /// Rewrites every staged chapter with its HTML entities decoded
    fn decode_chapter_entities(&self) -> Result<(), EpubError> {
        debug!("stage: decode entities");

        for book in &self.books {
            for chapter in book.chapters() {
                let path = self.chapter_path(chapter.file_name());
                let content = fs::read_to_string(&path).map_err(|err| EpubError::io(&path, err))?;

                let decoded = decode_entities(&content);
                fs::write(&path, decoded.as_bytes()).map_err(|err| EpubError::io(&path, err))?;
            }
        }

        Ok(())
    }

    /// Surrounds every chapter with wrapping enabled by the header and footer
    fn wrap_chapters(&self) -> Result<(), EpubError> {
        debug!("stage: wrap chapters");

        for book in &self.books {
            for chapter in book.chapters().filter(|chapter| chapter.wrap()) {
                let path = self.chapter_path(chapter.file_name());
                let content = fs::read(&path).map_err(|err| EpubError::io(&path, err))?;

                let mut wrapped = Vec::with_capacity(
                    self.chapter_header.len() + content.len() + self.chapter_footer.len(),
                );
                wrapped.extend_from_slice(self.chapter_header.as_bytes());
                wrapped.extend_from_slice(&content);
                wrapped.extend_from_slice(self.chapter_footer.as_bytes());

                fs::write(&path, wrapped).map_err(|err| EpubError::io(&path, err))?;
            }
        }

        Ok(())
    }

    /// Invokes the publication hook, then every book and chapter hook in order
    ///
    /// The set of books and chapters is fixed once hooks start running.
    fn run_before_build(&mut self) -> Result<(), EpubError> {
        debug!("stage: pre-build hooks");
        let working_set = self.working_set();

        if let Some(mut hook) = self.before_build.take() {
            let result = hook(&mut *self);
            self.before_build.get_or_insert(hook);
            result?;
        }

        for book in self.books.iter_mut() {
            book.run_before_build()?;
        }

        if self.working_set() != working_set {
            return Err(EpubError::UnsupportedConfiguration {
                reason: "books or chapters were added by a pre-build hook".to_string(),
            });
        }

        Ok(())
    }

    fn working_set(&self) -> Vec<usize> {
        self.books.iter().map(|book| book.chapter_count()).collect()
    }

    /// Synthesizes the content page and appends it to the only book
    fn make_content_page(&mut self) -> Result<(), EpubError> {
        debug!("stage: content page");

        let Some(page) = self.content_page.clone() else {
            return Ok(());
        };

        if page.placement == ContentPlacement::Beginning {
            return Err(EpubError::UnsupportedConfiguration {
                reason: "a content page can only be placed at the end of the publication"
                    .to_string(),
            });
        }
        if self.books.len() != 1 {
            return Err(EpubError::UnsupportedConfiguration {
                reason: format!(
                    "a content page requires exactly one book, found {}",
                    self.books.len()
                ),
            });
        }

        let book = &mut self.books[0];
        let title = html_escape::encode_text(&page.title);

        let mut html = format!("<h3>{}</h3>\n<ul>\n", title);
        for chapter in book.chapters() {
            html.push_str(&format!(
                "<li><a href=\"{}\">{}</a></li>\n",
                html_escape::encode_double_quoted_attribute(chapter.file_name()),
                html_escape::encode_text(chapter.title())
            ));
        }
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n</ul>\n",
            CONTENT_FILE, title
        ));

        book.add_chapter_html(&html, Some(CONTENT_FILE))?
            .set_title(&page.title);

        Ok(())
    }

    /// Renders the cover page unless one is already staged
    fn make_cover_file(&self) -> Result<(), EpubError> {
        let Some(cover) = &self.cover else {
            return Ok(());
        };
        debug!("stage: cover page");

        let path = self.chapter_path(COVER_FILE);
        if path.exists() {
            return Ok(());
        }

        // The cover page lives in Text/, next to Images/.
        let image = format!("../{}", cover);
        let page = COVER_TEMPLATE
            .replace("{image}", &html_escape::encode_double_quoted_attribute(&image))
            .replace("{alt}", &html_escape::encode_double_quoted_attribute(&self.cover_title));

        fs::write(&path, page).map_err(|err| EpubError::io(&path, err))
    }

    /// Whether the cover page is a separate manifest item
    ///
    /// A chapter staged as `cover.xhtml` takes the place of the generated page.
    fn has_cover_page(&self) -> bool {
        self.cover.is_some()
            && !self
                .books
                .iter()
                .any(|book| book.chapter(COVER_FILE).is_some())
    }

    /// Builds the navigation tree
    ///
    /// A single book yields a flat list of chapters. Several books yield one entry
    /// per book holding its chapters. Play order counts chapters only, from 1, in
    /// book-then-chapter order.
    pub(crate) fn navigation_map(&self) -> Vec<NavPoint> {
        let mut play_order = 0;
        let mut chapter_points = |book: &Book| {
            book.chapters()
                .map(|chapter| {
                    play_order += 1;
                    NavPoint {
                        id: chapter.file_name().to_string(),
                        class: "chapter",
                        label: chapter.title().to_string(),
                        content: Some(package_path(TEXTS, chapter.file_name())),
                        children: vec![],
                        play_order: Some(play_order),
                    }
                })
                .collect::<Vec<NavPoint>>()
        };

        if self.books.len() == 1 {
            return chapter_points(&self.books[0]);
        }

        self.books
            .iter()
            .map(|book| NavPoint {
                id: format!("book{}", book.number()),
                class: "book",
                label: book.title().to_string(),
                content: None,
                children: chapter_points(book),
                play_order: None,
            })
            .collect()
    }

    /// Creates the `toc.ncx` navigation map
    fn make_ncx_file(&self) -> Result<(), EpubError> {
        debug!("stage: navigation map");

        let navigation = self.navigation_map();
        let depth = if self.books.len() > 1 { "2" } else { "1" };

        let mut emitter = XmlEmitter::new(self.workspace.oebps_file(NCX_FILE))?;
        emitter
            .start(
                "ncx",
                &[
                    ("xmlns", "http://www.daisy.org/z3986/2005/ncx/"),
                    ("version", "2005-1"),
                    ("xml:lang", self.language.as_deref().unwrap_or("en")),
                ],
            )?
            .start("head", &[])?
            .empty(
                "meta",
                &[("name", "dtb:uid"), ("content", self.identifier.as_str())],
            )?
            .empty("meta", &[("name", "dtb:depth"), ("content", depth)])?
            .empty("meta", &[("name", "dtb:generator"), ("content", NCX_GENERATOR)])?
            .empty("meta", &[("name", "dtb:totalPageCount"), ("content", "0")])?
            .empty("meta", &[("name", "dtb:maxPageNumber"), ("content", "0")])?
            .end("head")?
            .start("docTitle", &[])?
            .text_element("text", &[], self.title.as_deref().unwrap_or(""))?
            .end("docTitle")?
            .start("navMap", &[])?;

        for point in &navigation {
            Self::make_nav_point(&mut emitter, point)?;
        }

        emitter.end("navMap")?.end("ncx")?;
        emitter.save()
    }

    fn make_nav_point(emitter: &mut XmlEmitter, point: &NavPoint) -> Result<(), EpubError> {
        let play_order = point.play_order.map(|order| order.to_string());

        let mut attributes = vec![("class", point.class), ("id", point.id.as_str())];
        if let Some(play_order) = &play_order {
            attributes.push(("playOrder", play_order.as_str()));
        }

        emitter
            .start("navPoint", &attributes)?
            .start("navLabel", &[])?
            .text_element("text", &[], &point.label)?
            .end("navLabel")?
            .empty("content", &[("src", point.content.as_deref().unwrap_or(""))])?;

        for child in &point.children {
            Self::make_nav_point(emitter, child)?;
        }

        emitter.end("navPoint")?;
        Ok(())
    }

    /// Collects the manifest items
    ///
    /// Binary assets get their media type sniffed from the staged content.
    pub(crate) fn manifest(&self) -> Result<Vec<ManifestItem>, EpubError> {
        let mut manifest = Vec::new();

        if let Some(cover) = &self.cover {
            let id = Self::cover_image_id(cover);
            let mime = detect_mime_type(&self.workspace.oebps_file(cover))?;
            manifest.push(ManifestItem::new(&id, cover, &mime));
        }
        if self.has_cover_page() {
            manifest.push(ManifestItem::new(
                COVER_FILE,
                &package_path(TEXTS, COVER_FILE),
                "application/xhtml+xml",
            ));
        }

        for book in &self.books {
            for chapter in book.chapters() {
                manifest.push(ManifestItem::new(
                    &format!("txt{}", chapter.file_name()),
                    &package_path(TEXTS, chapter.file_name()),
                    "application/xhtml+xml",
                ));
            }
        }

        for style in &self.styles {
            manifest.push(ManifestItem::new(
                &Self::asset_id("css", style),
                style,
                "text/css",
            ));
        }
        for (prefix, assets) in [("fnt", &self.fonts), ("img", &self.images)] {
            for asset in assets {
                let mime = detect_mime_type(&self.workspace.oebps_file(asset))?;
                manifest.push(ManifestItem::new(
                    &Self::asset_id(prefix, asset),
                    asset,
                    &mime,
                ));
            }
        }

        manifest.push(ManifestItem::new(
            "ncx",
            NCX_FILE,
            "application/x-dtbncx+xml",
        ));

        Ok(manifest)
    }

    /// Collects the spine in book-then-chapter order
    ///
    /// The cover page is referenced once, ahead of the first book. Earlier
    /// releases repeated the cover reference in front of every book.
    pub(crate) fn spine(&self) -> Vec<SpineItem> {
        let mut spine = Vec::new();

        if self.has_cover_page() {
            spine.push(SpineItem::new(COVER_FILE));
        }

        for book in &self.books {
            for chapter in book.chapters() {
                spine.push(SpineItem::new(&format!("txt{}", chapter.file_name())));
            }
        }

        spine
    }

    /// Manifest id of the cover image, prefixed like every other asset id
    fn cover_image_id(cover: &str) -> String {
        Self::asset_id("cvr", cover)
    }

    fn asset_id(prefix: &str, asset: &str) -> String {
        format!(
            "{}{}",
            prefix,
            base_name(Path::new(asset)).unwrap_or_else(|| asset.to_string())
        )
    }

    /// Creates the `content.opf` package document
    fn make_opf_file(&self) -> Result<(), EpubError> {
        debug!("stage: package document");

        self.check_chapter_references();
        let manifest = self.manifest()?;
        let spine = self.spine();

        let mut emitter = XmlEmitter::new(self.workspace.oebps_file(PACKAGE_FILE))?;
        emitter.start(
            "package",
            &[
                ("xmlns", "http://www.idpf.org/2007/opf"),
                ("unique-identifier", "uuid_id"),
                ("version", "2.0"),
            ],
        )?;

        self.make_opf_metadata(&mut emitter)?;

        emitter.start("manifest", &[])?;
        for item in &manifest {
            emitter.empty("item", &item.attributes())?;
        }
        emitter.end("manifest")?;

        emitter.start("spine", &[("toc", "ncx")])?;
        for item in &spine {
            emitter.empty("itemref", &item.attributes())?;
        }
        emitter.end("spine")?;

        if self.cover.is_some() {
            let href = package_path(TEXTS, COVER_FILE);
            emitter
                .start("guide", &[])?
                .empty(
                    "reference",
                    &[
                        ("type", "cover"),
                        ("title", self.cover_title.as_str()),
                        ("href", href.as_str()),
                    ],
                )?
                .end("guide")?;
        }

        emitter.end("package")?;
        emitter.save()
    }

    fn make_opf_metadata(&self, emitter: &mut XmlEmitter) -> Result<(), EpubError> {
        emitter.start(
            "metadata",
            &[
                ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
                ("xmlns:dcterms", "http://purl.org/dc/terms/"),
                ("xmlns:opf", "http://www.idpf.org/2007/opf"),
                ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            ],
        )?;

        for creator in &self.creators {
            emitter.text_element("dc:creator", &creator.attributes(), &creator.name)?;
        }
        if let Some(title) = &self.title {
            emitter.text_element("dc:title", &[], title)?;
        }
        if let Some(description) = &self.description {
            emitter.text_element("dc:description", &[], description)?;
        }
        if let Some(language) = &self.language {
            emitter.text_element("dc:language", &[], language)?;
        }
        if let Some(publisher) = &self.publisher {
            emitter.text_element("dc:publisher", &[], publisher)?;
        }
        if let Some(cover) = &self.cover {
            let id = Self::cover_image_id(cover);
            emitter.empty("meta", &[("name", "cover"), ("content", id.as_str())])?;
        }
        emitter.text_element(
            "dc:identifier",
            &[("id", "uuid_id"), ("opf:scheme", "uuid")],
            self.identifier.as_str(),
        )?;
        emitter.text_element(
            "dc:date",
            &[("opf:event", "modification")],
            &Utc::now().format("%Y-%m-%d").to_string(),
        )?;
        for subject in &self.subjects {
            emitter.text_element("dc:subject", &[], subject)?;
        }

        emitter.end("metadata")?;
        Ok(())
    }

    /// Logs chapter image and stylesheet references missing from the staging tree
    fn check_chapter_references(&self) {
        for (file_name, reference) in self.unresolved_references() {
            warn!(
                "{}: reference \"{}\" does not resolve to a staged file",
                file_name, reference
            );
        }
    }

    /// Chapter references, as `(chapter file name, reference)`, with no staged target
    ///
    /// Relative references resolve against `OEBPS/Text`, root-absolute ones against
    /// the package root. External URLs are skipped.
    pub(crate) fn unresolved_references(&self) -> Vec<(String, String)> {
        let text_dir = self.workspace.text_dir();
        let mut unresolved = Vec::new();

        for book in &self.books {
            for chapter in book.chapters() {
                for reference in chapter.images().iter().chain(chapter.styles()) {
                    if is_external(reference) {
                        continue;
                    }

                    let local = reference.split(['#', '?']).next().unwrap_or_default();
                    let target = if local.starts_with('/') {
                        self.workspace.path().join(remove_leading_slash(local))
                    } else {
                        text_dir.join(local)
                    };

                    if !target.is_file() {
                        unresolved.push((chapter.file_name().to_string(), reference.clone()));
                    }
                }
            }
        }

        unresolved
    }
}

fn is_external(reference: &str) -> bool {
    reference.contains("://") || reference.starts_with("data:") || reference.starts_with("//")
}

impl fmt::Debug for Publication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publication")
            .field("identifier", &self.identifier)
            .field("workspace", &self.workspace)
            .field("title", &self.title)
            .field("books", &self.books)
            .field("cover", &self.cover)
            .field("content_page", &self.content_page)
            .field("before_build", &self.before_build.is_some())
            .finish_non_exhaustive()
    }
}
