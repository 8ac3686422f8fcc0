use std::{
    borrow::Cow,
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use chrono::Local;
use infer::Infer;
use quick_xml::{
    Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::{error::EpubError, types::Identifier};

/// Returns the current time with custom format
pub fn local_time() -> String {
    Local::now().format("%Y-%m-%dT%H-%M-%S.%fU%z").to_string()
}

/// Fills `buf` from the operating system random source
pub(crate) fn random_bytes(buf: &mut [u8]) -> Result<(), EpubError> {
    getrandom::fill(buf)?;
    Ok(())
}

/// Generates a random RFC 4122 shaped identifier
///
/// 16 random bytes are rendered as 32 uppercase hex digits and cut into groups of
/// 8, 4, 3, 3 and 12 digits. The third group is prefixed with the version nibble `4`,
/// the fourth with a variant nibble drawn uniformly from `8`, `9`, `A` and `B`, which
/// gives the familiar `XXXXXXXX-XXXX-4XXX-[89AB]XXX-XXXXXXXXXXXX` layout.
pub fn generate_identifier() -> Result<Identifier, EpubError> {
    let mut bytes = [0u8; 17];
    random_bytes(&mut bytes)?;

    let hex = bytes[..16]
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<String>();
    let variant = ['8', '9', 'A', 'B'][(bytes[16] & 0b11) as usize];

    Ok(Identifier::from(format!(
        "{}-{}-4{}-{}{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..15],
        variant,
        &hex[15..18],
        &hex[18..30],
    )))
}

/// Decodes HTML character entities into literal characters
///
/// Named entities from the HTML set as well as decimal and hexadecimal
/// numeric references are recognized; unknown entities are left untouched.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(text)
}

/// Checks that `path` names an existing, readable regular file
pub(crate) fn ensure_readable_file(path: &Path) -> Result<(), EpubError> {
    if !path.is_file() {
        return Err(EpubError::input(path, "is not a file"));
    }
    if let Err(err) = fs::File::open(path) {
        return Err(EpubError::input(path, &format!("is not readable ({})", err)));
    }

    Ok(())
}

/// Reads a caller supplied text file, reporting problems as input errors
pub(crate) fn read_input_file(path: &Path) -> Result<String, EpubError> {
    ensure_readable_file(path)?;
    fs::read_to_string(path)
        .map_err(|err| EpubError::input(path, &format!("is not readable ({})", err)))
}

/// Joins path segments with `/`, the separator used inside the package
pub(crate) fn package_path(dir: &str, file_name: &str) -> String {
    format!("{}/{}", dir, file_name)
}

/// Returns the final component of `path` as an owned string
pub(crate) fn base_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
}

/// Removes leading slash from a path
pub fn remove_leading_slash<P: AsRef<Path>>(path: P) -> PathBuf {
    if let Ok(path) = path.as_ref().strip_prefix("/") {
        path.to_path_buf()
    } else {
        path.as_ref().to_path_buf()
    }
}

/// Detects the media type of a staged file
///
/// The type is inferred from the file content first and refined with the file
/// extension; text formats that carry no magic bytes fall back to the extension.
pub fn detect_mime_type(path: &Path) -> Result<String, EpubError> {
    let buf = fs::read(path).map_err(|err| EpubError::io(path, err))?;

    let extension = match path.extension() {
        Some(ext) => ext.to_string_lossy().to_lowercase(),
        None => String::new(),
    };

    if let Some(infer_mime) = Infer::new().get(&buf) {
        return Ok(refine_mime_type(infer_mime.mime_type(), &extension));
    }

    match mime_from_extension(&extension) {
        Some(mime) => Ok(mime.to_string()),
        None => Err(EpubError::UnknownFileFormat {
            file_path: path.display().to_string(),
        }),
    }
}

/// Refine the mime type
///
/// Optimize mime types inferred from file content based on file extensions
pub(crate) fn refine_mime_type(infer_mime: &str, extension: &str) -> String {
    match (infer_mime, extension) {
        ("text/xml", "xhtml")
        | ("application/xml", "xhtml")
        | ("text/xml", "xht")
        | ("application/xml", "xht") => "application/xhtml+xml".to_string(),

        ("text/xml", "ncx") | ("application/xml", "ncx") => "application/x-dtbncx+xml".to_string(),

        ("text/xml", "svg") | ("application/xml", "svg") => "image/svg+xml".to_string(),

        ("text/plain", "css") => "text/css".to_string(),

        (mime, ext) if mime.starts_with("application/font-") => mime_from_extension(ext)
            .unwrap_or(mime)
            .to_string(),

        _ => infer_mime.to_string(),
    }
}

fn mime_from_extension(extension: &str) -> Option<&'static str> {
    match extension {
        "css" => Some("text/css"),
        "svg" => Some("image/svg+xml"),
        "xhtml" | "xht" | "html" | "htm" => Some("application/xhtml+xml"),
        "ncx" => Some("application/x-dtbncx+xml"),
        "ttf" => Some("font/ttf"),
        "otf" => Some("font/otf"),
        "woff" => Some("font/woff"),
        "woff2" => Some("font/woff2"),
        _ => None,
    }
}

/// Element-level XML writer
///
/// Opens elements with attributes, writes text and closes elements in document
/// order into an in-memory buffer. Failures are reported against `target`, the
/// staging file the buffer is destined for.
pub(crate) struct XmlEmitter {
    writer: Writer<Cursor<Vec<u8>>>,
    target: PathBuf,
}

impl XmlEmitter {
    /// Creates an emitter writing the XML declaration and indenting by two spaces
    pub(crate) fn new<P: AsRef<Path>>(target: P) -> Result<Self, EpubError> {
        let mut emitter = XmlEmitter {
            writer: Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2),
            target: target.as_ref().to_path_buf(),
        };
        emitter.write(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

        Ok(emitter)
    }

    pub(crate) fn start(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
    ) -> Result<&mut Self, EpubError> {
        self.write(Event::Start(
            BytesStart::new(name).with_attributes(attributes.iter().copied()),
        ))?;
        Ok(self)
    }

    pub(crate) fn empty(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
    ) -> Result<&mut Self, EpubError> {
        self.write(Event::Empty(
            BytesStart::new(name).with_attributes(attributes.iter().copied()),
        ))?;
        Ok(self)
    }

    /// Writes `<name attributes>text</name>`
    pub(crate) fn text_element(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> Result<&mut Self, EpubError> {
        self.start(name, attributes)?;
        self.write(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    pub(crate) fn end(&mut self, name: &str) -> Result<&mut Self, EpubError> {
        self.write(Event::End(BytesEnd::new(name)))?;
        Ok(self)
    }

    /// Writes the buffered document to its target file
    pub(crate) fn save(self) -> Result<(), EpubError> {
        let data = self.writer.into_inner().into_inner();
        fs::write(&self.target, data).map_err(|err| EpubError::io(&self.target, err))
    }

    fn write(&mut self, event: Event<'_>) -> Result<(), EpubError> {
        let target = &self.target;
        self.writer
            .write_event(event)
            .map_err(|err| EpubError::emission(target, err))
    }
}
