//! Error Type Definition Module
//!
//! This module defines the error types that may be encountered while staging
//! content and building an EPUB package. All errors are uniformly wrapped in the
//! `EpubError` enumeration for convenient error handling by the caller.
//!
//! Every variant carries the path, file name or reason that triggered it, so the
//! message alone is enough to locate the offending input.

use thiserror::Error;

/// Types of errors that can occur while assembling an EPUB package
#[derive(Debug, Error)]
pub enum EpubError {
    /// Caller supplied input error
    ///
    /// A caller supplied path is missing, is not a regular file (or directory,
    /// where one is expected) or cannot be read or written.
    #[error("Input error: \"{path}\" {reason}.")]
    InputError { path: String, reason: String },

    /// Staging area I/O error
    ///
    /// Directory creation, file write or copy failure inside the workspace.
    #[error("IO error: \"{path}\": {source}")]
    IOError {
        path: String,
        source: std::io::Error,
    },

    /// Chapter parsing error
    ///
    /// A staged chapter could not be read or scanned for references.
    #[error("Parse error: \"{path}\": {reason}")]
    ParseError { path: String, reason: String },

    /// Archive error
    ///
    /// The output container could not be opened, written to or finalized.
    #[error("Packaging error: \"{path}\": {reason}")]
    PackagingError { path: String, reason: String },

    /// Duplicate chapter error
    ///
    /// A chapter with the same staged file name already exists in the Text directory.
    #[error("Duplicate chapter: \"{file_name}\" already exists (book {book}).")]
    DuplicateChapter { book: usize, file_name: String },

    /// Duplicate resource error
    ///
    /// Two registered assets would be staged at the same path and share a manifest id.
    #[error("Duplicate resource: \"{path}\" is already registered.")]
    DuplicateResource { path: String },

    /// Unknown file format error
    ///
    /// The media type of a staged binary asset could not be determined.
    #[error("Unknown file format: Unable to analyze the file '{file_path}' type.")]
    UnknownFileFormat { file_path: String },

    /// Unsupported configuration error
    ///
    /// The requested combination of options is not implemented, or a pre-build
    /// hook changed the set of staged chapters.
    #[error("Unsupported configuration: {reason}")]
    UnsupportedConfiguration { reason: String },

    /// Random source error
    ///
    /// The operating system random source could not provide identifier bytes.
    #[error("Random source unavailable: {reason}")]
    RandomSourceUnavailable { reason: String },

    /// Hook error
    ///
    /// A pre-build hook reported a failure of its own.
    #[error("Hook error: {reason}")]
    HookError { reason: String },
}

impl EpubError {
    /// Wraps an I/O error raised while touching the staging tree
    pub(crate) fn io<P: AsRef<std::path::Path>>(path: P, source: std::io::Error) -> Self {
        EpubError::IOError {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Wraps a failure of the XML writer targeting `path`
    pub(crate) fn emission<P: AsRef<std::path::Path>>(path: P, reason: impl ToString) -> Self {
        EpubError::io(path, std::io::Error::other(reason.to_string()))
    }

    pub(crate) fn input<P: AsRef<std::path::Path>>(path: P, reason: &str) -> Self {
        EpubError::InputError {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn packaging<P: AsRef<std::path::Path>>(path: P, reason: impl ToString) -> Self {
        EpubError::PackagingError {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn parse<P: AsRef<std::path::Path>>(path: P, reason: impl ToString) -> Self {
        EpubError::ParseError {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<getrandom::Error> for EpubError {
    fn from(value: getrandom::Error) -> Self {
        EpubError::RandomSourceUnavailable {
            reason: value.to_string(),
        }
    }
}

#[cfg(test)]
impl PartialEq for EpubError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::InputError {
                    path: l_path,
                    reason: l_reason,
                },
                Self::InputError {
                    path: r_path,
                    reason: r_reason,
                },
            ) => l_path == r_path && l_reason == r_reason,
            (
                Self::DuplicateChapter {
                    book: l_book,
                    file_name: l_file_name,
                },
                Self::DuplicateChapter {
                    book: r_book,
                    file_name: r_file_name,
                },
            ) => l_book == r_book && l_file_name == r_file_name,
            (
                Self::DuplicateResource { path: l_path },
                Self::DuplicateResource { path: r_path },
            ) => l_path == r_path,
            (
                Self::UnknownFileFormat { file_path: l_path },
                Self::UnknownFileFormat { file_path: r_path },
            ) => l_path == r_path,

            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}
