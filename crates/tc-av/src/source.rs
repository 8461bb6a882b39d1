//! Source resolution: virtual browser paths to local files.
//!
//! A virtual path either names a plain file under the media root or reaches
//! *through* an archive (`shows/pack.zip/episode1.mkv`). Archives are not
//! opened in-process; extraction shells out to `7z`, which also handles
//! password-protected archives. Resolver failures carry the tool's message
//! verbatim — a wrong-password report must reach the user unchanged.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::command::ToolCommand;

/// Archive container extensions the resolver will descend into.
const ARCHIVE_EXTS: &[&str] = &["zip", "7z", "rar", "tar"];

/// What a virtual path resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    /// A plain file on disk.
    Direct { path: PathBuf },
    /// An entry nested inside an archive; reading it requires extraction.
    Archive { archive: PathBuf, entry: String },
}

impl Resolved {
    /// The on-disk file whose metadata forms the content fingerprint: the
    /// archive itself for nested entries, the file otherwise.
    pub fn fingerprint_path(&self) -> &Path {
        match self {
            Resolved::Direct { path } => path,
            Resolved::Archive { archive, .. } => archive,
        }
    }
}

/// Turns virtual paths into local files, extracting archive entries on
/// demand.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    /// Resolve a virtual path to a plain file or an (archive, entry) pair.
    async fn resolve(&self, virtual_path: &str) -> tc_core::Result<Resolved>;

    /// Extract `entry` from `archive` into `dest_dir`, returning the path of
    /// the extracted file.
    async fn extract(
        &self,
        archive: &Path,
        entry: &str,
        dest_dir: &Path,
        password: Option<&str>,
    ) -> tc_core::Result<PathBuf>;
}

/// Filesystem resolver rooted at the configured media tree.
#[derive(Debug, Clone)]
pub struct FsResolver {
    media_root: PathBuf,
    sevenzip: Option<PathBuf>,
}

impl FsResolver {
    pub fn new(media_root: PathBuf, sevenzip: Option<PathBuf>) -> Self {
        Self {
            media_root,
            sevenzip,
        }
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| ARCHIVE_EXTS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl SourceResolver for FsResolver {
    async fn resolve(&self, virtual_path: &str) -> tc_core::Result<Resolved> {
        let relative = virtual_path.trim_matches('/');
        if relative.is_empty() {
            return Err(tc_core::Error::Validation("empty path".into()));
        }
        if relative
            .split('/')
            .any(|c| c.is_empty() || c == "." || c == "..")
        {
            return Err(tc_core::Error::Validation(format!(
                "invalid path: {virtual_path}"
            )));
        }

        // Walk components so an archive in the middle of the path is found
        // before the full path is declared missing.
        let mut current = self.media_root.clone();
        let mut components = relative.split('/').peekable();
        while let Some(component) = components.next() {
            current.push(component);

            if components.peek().is_none() {
                break;
            }

            if current.is_file() {
                if is_archive(&current) {
                    let entry: Vec<&str> = components.collect();
                    return Ok(Resolved::Archive {
                        archive: current,
                        entry: entry.join("/"),
                    });
                }
                return Err(tc_core::Error::Resolver(format!(
                    "{component} is a file, not a directory or archive"
                )));
            }
        }

        if current.is_file() {
            Ok(Resolved::Direct { path: current })
        } else {
            Err(tc_core::Error::not_found("source", virtual_path))
        }
    }

    async fn extract(
        &self,
        archive: &Path,
        entry: &str,
        dest_dir: &Path,
        password: Option<&str>,
    ) -> tc_core::Result<PathBuf> {
        let sevenzip = self.sevenzip.clone().ok_or_else(|| {
            tc_core::Error::Resolver("7z not found; archive browsing is unavailable".into())
        })?;

        tokio::fs::create_dir_all(dest_dir).await?;

        let mut cmd = ToolCommand::new(sevenzip);
        cmd.arg("x").arg("-y");
        cmd.arg(format!("-o{}", dest_dir.display()));
        // 7z prompts interactively without -p; an empty password keeps it
        // non-interactive for unprotected archives too.
        cmd.arg(format!("-p{}", password.unwrap_or("")));
        cmd.arg(archive.to_string_lossy().as_ref());
        cmd.arg(entry);

        tracing::debug!(
            archive = %archive.display(),
            entry,
            "Extracting archive entry"
        );

        cmd.execute().await.map_err(|e| match e {
            tc_core::Error::Tool { message, .. } => tc_core::Error::Resolver(message),
            other => other,
        })?;

        let extracted = dest_dir.join(entry);
        if !extracted.is_file() {
            return Err(tc_core::Error::Resolver(format!(
                "entry {entry} not found in {}",
                archive.display()
            )));
        }
        Ok(extracted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(root: &Path) -> FsResolver {
        FsResolver::new(root.to_path_buf(), None)
    }

    #[tokio::test]
    async fn resolves_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("movie.mkv");
        std::fs::write(&file, b"x").unwrap();

        let resolved = resolver(dir.path()).resolve("movie.mkv").await.unwrap();
        assert_eq!(resolved, Resolved::Direct { path: file });
    }

    #[tokio::test]
    async fn resolves_nested_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("shows/s1")).unwrap();
        let file = dir.path().join("shows/s1/e1.mkv");
        std::fs::write(&file, b"x").unwrap();

        let resolved = resolver(dir.path())
            .resolve("shows/s1/e1.mkv")
            .await
            .unwrap();
        assert_eq!(resolved, Resolved::Direct { path: file });
    }

    #[tokio::test]
    async fn detects_archive_component() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("pack.zip");
        std::fs::write(&archive, b"PK").unwrap();

        let resolved = resolver(dir.path())
            .resolve("pack.zip/inner/episode.mkv")
            .await
            .unwrap();
        assert_eq!(
            resolved,
            Resolved::Archive {
                archive,
                entry: "inner/episode.mkv".into()
            }
        );
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolver(dir.path()).resolve("nope.mkv").await.unwrap_err();
        assert!(matches!(err, tc_core::Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolver(dir.path())
            .resolve("../etc/passwd")
            .await
            .unwrap_err();
        assert!(matches!(err, tc_core::Error::Validation(_)));
    }

    #[tokio::test]
    async fn extract_without_sevenzip_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolver(dir.path())
            .extract(Path::new("/a.zip"), "e.mkv", dir.path(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, tc_core::Error::Resolver(_)));
    }

    #[test]
    fn fingerprint_path_uses_archive() {
        let resolved = Resolved::Archive {
            archive: PathBuf::from("/m/pack.zip"),
            entry: "e.mkv".into(),
        };
        assert_eq!(resolved.fingerprint_path(), Path::new("/m/pack.zip"));
    }
}
