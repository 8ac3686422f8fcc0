//! Staging Workspace
//!
//! A [`Workspace`] is the private on-disk directory that mirrors the final package
//! layout before it is archived:
//!
//! ```text
//! mimetype
//! META-INF/container.xml
//! OEBPS/Fonts/
//! OEBPS/Images/
//! OEBPS/Styles/
//! OEBPS/Text/
//! ```
//!
//! The tree is removed when the workspace is dropped.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use log::{debug, warn};

use crate::{
    error::EpubError,
    utils::{XmlEmitter, local_time, random_bytes},
};

pub const META_INF: &str = "META-INF";
pub const OEBPS: &str = "OEBPS";
pub const FONTS: &str = "Fonts";
pub const IMAGES: &str = "Images";
pub const STYLES: &str = "Styles";
pub const TEXTS: &str = "Text";

pub const MIMETYPE: &str = "mimetype";
pub const EPUB_MIMETYPE: &str = "application/epub+zip";
pub const CONTAINER_FILE: &str = "container.xml";
pub const PACKAGE_FILE: &str = "content.opf";
pub const NCX_FILE: &str = "toc.ncx";

/// Private staging directory owned by one publication
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Creates a uniquely named staging tree under `base_dir`
    ///
    /// # Parameters
    /// - `base_dir`: Existing, writable directory that will host the workspace
    ///
    /// # Return
    /// - `Ok(Workspace)`: The skeleton, `mimetype` and `container.xml` are in place
    /// - `Err(EpubError)`: `InputError` for an unusable `base_dir`,
    ///   `IOError` when the skeleton cannot be written
    pub fn create<P: AsRef<Path>>(base_dir: P) -> Result<Self, EpubError> {
        let base_dir = base_dir.as_ref();
        if !base_dir.is_dir() {
            return Err(EpubError::input(base_dir, "is not a directory"));
        }

        let mut suffix = [0u8; 4];
        random_bytes(&mut suffix)?;
        let name = format!(
            "epub-{}-{}",
            local_time(),
            suffix.iter().map(|b| format!("{:02x}", b)).collect::<String>()
        );

        let root = base_dir.join(name);
        fs::create_dir(&root).map_err(|err| root_creation_error(base_dir, &root, err))?;
        let workspace = Workspace { root };

        for dir in [
            workspace.root.join(META_INF),
            workspace.root.join(OEBPS),
            workspace.oebps_dir(FONTS),
            workspace.oebps_dir(IMAGES),
            workspace.oebps_dir(STYLES),
            workspace.oebps_dir(TEXTS),
        ] {
            fs::create_dir(&dir).map_err(|err| EpubError::io(&dir, err))?;
        }

        let mime_file = workspace.root.join(MIMETYPE);
        fs::write(&mime_file, EPUB_MIMETYPE).map_err(|err| EpubError::io(&mime_file, err))?;

        workspace.make_container_xml()?;

        debug!("created workspace {}", workspace.root.display());
        Ok(workspace)
    }

    /// Root of the staging tree
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// `OEBPS/<name>` inside the staging tree
    pub fn oebps_dir(&self, name: &str) -> PathBuf {
        self.root.join(OEBPS).join(name)
    }

    /// `OEBPS/<relative>` inside the staging tree
    pub fn oebps_file(&self, relative: &str) -> PathBuf {
        self.root.join(OEBPS).join(relative)
    }

    /// Directory holding the staged chapter files
    pub fn text_dir(&self) -> PathBuf {
        self.oebps_dir(TEXTS)
    }

    /// Recursively removes the staging tree
    ///
    /// Removing a tree that no longer exists is not an error.
    pub fn destroy(&self) -> Result<(), EpubError> {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(EpubError::io(&self.root, err)),
        }
    }

    /// Creates the `container.xml` file pointing at the package document
    fn make_container_xml(&self) -> Result<(), EpubError> {
        let rootfile = format!("{}/{}", OEBPS, PACKAGE_FILE);

        let mut emitter = XmlEmitter::new(self.root.join(META_INF).join(CONTAINER_FILE))?;
        emitter
            .start(
                "container",
                &[
                    ("version", "1.0"),
                    ("xmlns", "urn:oasis:names:tc:opendocument:xmlns:container"),
                ],
            )?
            .start("rootfiles", &[])?
            .empty(
                "rootfile",
                &[
                    ("full-path", rootfile.as_str()),
                    ("media-type", "application/oebps-package+xml"),
                ],
            )?
            .end("rootfiles")?
            .end("container")?;
        emitter.save()
    }
}

/// Permission failures on the base directory are the caller's input problem
fn root_creation_error(base_dir: &Path, root: &Path, err: io::Error) -> EpubError {
    match err.kind() {
        io::ErrorKind::PermissionDenied | io::ErrorKind::ReadOnlyFilesystem => {
            EpubError::input(base_dir, &format!("is not writable ({})", err))
        }
        _ => EpubError::io(root, err),
    }
}

impl Drop for Workspace {
    /// Remove staging directory when dropped
    fn drop(&mut self) {
        if let Err(err) = self.destroy() {
            warn!("{}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, io, path::Path};

    use crate::{
        error::EpubError,
        workspace::{EPUB_MIMETYPE, Workspace, root_creation_error},
    };

    #[test]
    fn test_create_skeleton() {
        let base = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(base.path()).unwrap();
        let root = workspace.path();

        assert!(root.starts_with(base.path()));
        for dir in ["META-INF", "OEBPS/Fonts", "OEBPS/Images", "OEBPS/Styles", "OEBPS/Text"] {
            assert!(root.join(dir).is_dir(), "{} is missing", dir);
        }
        assert_eq!(fs::read_to_string(root.join("mimetype")).unwrap(), EPUB_MIMETYPE);

        let container = fs::read_to_string(root.join("META-INF/container.xml")).unwrap();
        assert!(container.contains("full-path=\"OEBPS/content.opf\""));
        assert!(container.contains("media-type=\"application/oebps-package+xml\""));
    }

    #[test]
    fn test_create_unique_directories() {
        let base = tempfile::tempdir().unwrap();
        let first = Workspace::create(base.path()).unwrap();
        let second = Workspace::create(base.path()).unwrap();

        assert_ne!(first.path(), second.path());
    }

    #[test]
    fn test_create_missing_base_dir() {
        let base = tempfile::tempdir().unwrap();
        let missing = base.path().join("missing");

        let result = Workspace::create(&missing);
        assert!(matches!(result, Err(EpubError::InputError { .. })));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let base = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(base.path()).unwrap();
        let root = workspace.path().to_path_buf();

        workspace.destroy().unwrap();
        assert!(!root.exists());
        workspace.destroy().unwrap();
    }

    #[test]
    fn test_drop_removes_tree() {
        let base = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(base.path()).unwrap();
        let root = workspace.path().to_path_buf();

        drop(workspace);
        assert!(!root.exists());
    }

    #[test]
    fn test_permission_failures_are_input_errors() {
        let base = Path::new("/srv/books");
        let root = base.join("epub-x");

        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        let err = root_creation_error(base, &root, denied);
        assert!(matches!(err, EpubError::InputError { ref path, .. } if path == "/srv/books"));

        let exists = io::Error::from(io::ErrorKind::AlreadyExists);
        let err = root_creation_error(base, &root, exists);
        assert!(matches!(err, EpubError::IOError { ref path, .. } if path == "/srv/books/epub-x"));
    }

    #[cfg(unix)]
    #[test]
    fn test_create_in_unwritable_base_dir() {
        use std::os::unix::fs::PermissionsExt;

        let base = tempfile::tempdir().unwrap();
        let locked = base.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users may still write; anyone else must get an input error.
        if let Err(err) = Workspace::create(&locked) {
            assert!(matches!(err, EpubError::InputError { .. }), "{}", err);
        }

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    }
}
