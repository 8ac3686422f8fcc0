use std::fmt;

/// Unique identifier of a publication
///
/// Generated once when a [`Publication`](crate::builder::Publication) is created and
/// written to both the package descriptor and the navigation map. The value has the
/// shape `XXXXXXXX-XXXX-4XXX-[89AB]XXX-XXXXXXXXXXXX` with uppercase hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier(value)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents a creator of the publication
///
/// A creator is an immutable value made of a role code (MARC relator codes such as
/// `aut` or `ill`), the display name and an optional sort key in "Last, First" form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creator {
    /// Role code, e.g. `aut` for author or `ill` for illustrator
    pub role: String,

    /// Display name, e.g. "Karel Čapek"
    pub name: String,

    /// Sort key name, e.g. "Čapek, Karel"
    pub file_as: Option<String>,
}

impl Creator {
    pub fn new(role: &str, name: &str, file_as: Option<&str>) -> Self {
        Self {
            role: role.to_string(),
            name: name.to_string(),
            file_as: file_as.map(str::to_string),
        }
    }

    /// Get attributes of the `dc:creator` element
    pub(crate) fn attributes(&self) -> Vec<(&str, &str)> {
        let mut attributes = Vec::new();

        if let Some(file_as) = &self.file_as {
            attributes.push(("opf:file-as", file_as.as_str()));
        }
        attributes.push(("opf:role", self.role.as_str()));

        attributes
    }
}

/// Placement of the synthesized content page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentPlacement {
    /// Before the first chapter; not supported by the build pipeline
    Beginning,

    /// After the last chapter
    #[default]
    End,
}

/// Represents a resource item declared in the package manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestItem {
    /// Unique id of the item inside the manifest
    pub id: String,

    /// Location of the resource relative to the package document
    pub href: String,

    /// The media type of the resource
    pub mime: String,
}

impl ManifestItem {
    pub fn new(id: &str, href: &str, mime: &str) -> Self {
        Self {
            id: id.to_string(),
            href: href.to_string(),
            mime: mime.to_string(),
        }
    }

    /// Get attributes of the `item` element
    pub(crate) fn attributes(&self) -> Vec<(&str, &str)> {
        vec![
            ("href", self.href.as_str()),
            ("id", self.id.as_str()),
            ("media-type", self.mime.as_str()),
        ]
    }
}

/// Represents an item in the spine, defining the reading order of the publication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpineItem {
    /// The ID reference to a manifest item
    pub idref: String,
}

impl SpineItem {
    pub fn new(idref: &str) -> Self {
        Self {
            idref: idref.to_string(),
        }
    }

    pub(crate) fn attributes(&self) -> Vec<(&str, &str)> {
        vec![("idref", self.idref.as_str())]
    }
}

/// Represents a navigation point in the navigation map
///
/// Chapter entries carry a play order and a content reference; book entries of a
/// multi-book publication are pure containers with neither.
#[derive(Debug, Eq, Clone)]
pub struct NavPoint {
    /// Unique id of the navigation point
    pub id: String,

    /// Class of the entry, `chapter` or `book`
    pub class: &'static str,

    /// The display label/title of this navigation point
    pub label: String,

    /// The content document path this navigation point references
    pub content: Option<String>,

    /// Child navigation points
    pub children: Vec<NavPoint>,

    /// The reading order position of this navigation point
    pub play_order: Option<usize>,
}

impl Ord for NavPoint {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.play_order.cmp(&other.play_order)
    }
}

impl PartialOrd for NavPoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for NavPoint {
    fn eq(&self, other: &Self) -> bool {
        self.play_order == other.play_order && self.id == other.id
    }
}
