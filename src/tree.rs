//! Recursive tree replication.
//!
//! Two symmetric depth-first walks: [`upload_tree`] mirrors a local
//! directory into remote folders and files, [`clone_tree`] mirrors a remote
//! subtree into a destination container. Both commit objects as they go, so
//! a failure midway leaves the partially built tree in place. Children are
//! processed strictly one at a time in listing order. The remote calls sit
//! behind [`RemoteStore`] so the recursion is testable against an in-memory
//! fake.

use std::path::Path;

use async_trait::async_trait;
use futures::future::BoxFuture;
use log::{debug, error, info};

use crate::client::DriveClient;
use crate::types::{DriveError, DriveFile, DriveResult, RemoteObject};
use crate::{files, folders, uploads};

/// Remote operations the replication walks are built from.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Object metadata by id.
    async fn fetch(&self, id: &str) -> DriveResult<DriveFile>;
    /// Copy a file into a container.
    async fn copy(&self, id: &str, dest_parent: &str) -> DriveResult<DriveFile>;
    /// Create a folder in a container.
    async fn mkdir(&self, name: &str, parent: &str) -> DriveResult<DriveFile>;
    /// All direct children of a folder.
    async fn children(&self, folder_id: &str) -> DriveResult<Vec<DriveFile>>;
    /// Upload one local file into a container.
    async fn upload(&self, path: &Path, parent: &str) -> DriveResult<DriveFile>;
}

#[async_trait]
impl RemoteStore for DriveClient {
    async fn fetch(&self, id: &str) -> DriveResult<DriveFile> {
        files::get_file(self, id).await
    }

    async fn copy(&self, id: &str, dest_parent: &str) -> DriveResult<DriveFile> {
        files::copy_file(self, id, dest_parent).await
    }

    async fn mkdir(&self, name: &str, parent: &str) -> DriveResult<DriveFile> {
        folders::create_folder(self, name, parent).await
    }

    async fn children(&self, folder_id: &str) -> DriveResult<Vec<DriveFile>> {
        folders::list_children(self, folder_id).await
    }

    async fn upload(&self, path: &Path, parent: &str) -> DriveResult<DriveFile> {
        uploads::upload_file(self, path, parent).await
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Clone
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Result of a subtree clone.
#[derive(Debug, Clone)]
pub struct CloneOutcome {
    /// The object created at the destination root. For folders, `size`
    /// carries the aggregated transferred bytes.
    pub object: RemoteObject,
    /// Sum of the declared sizes of the files actually copied; missing
    /// declared sizes contribute zero.
    pub transferred_bytes: u64,
    /// Per-child copy failures tolerated in best-effort mode.
    pub skipped: Vec<DriveError>,
}

/// Replicate the object `source_id` (file or folder subtree) into the
/// container `dest_parent`.
///
/// With `best_effort`, a child file whose copy fails is logged, recorded in
/// the outcome and skipped; its siblings still replicate. Failures while
/// listing children or creating a folder abort the clone in either mode.
pub async fn clone_tree<S: RemoteStore>(
    store: &S,
    source_id: &str,
    dest_parent: &str,
    best_effort: bool,
) -> DriveResult<CloneOutcome> {
    if source_id == dest_parent {
        return Err(DriveError::invalid_operation(
            "source and destination are the same container",
        ));
    }
    let source = store.fetch(source_id).await?;
    if source.is_folder() {
        info!("cloning folder '{}' into '{}'", source.name, dest_parent);
        let root = store.mkdir(&source.name, dest_parent).await?;
        let (bytes, skipped) =
            replicate_children(store, &source.id, &root.id, best_effort).await?;
        info!(
            "cloned '{}': {} bytes, {} skipped",
            source.name,
            bytes,
            skipped.len()
        );
        let mut object = RemoteObject::from(root);
        object.size = Some(bytes);
        Ok(CloneOutcome {
            object,
            transferred_bytes: bytes,
            skipped,
        })
    } else {
        info!("cloning file '{}' into '{}'", source.name, dest_parent);
        let copied = store.copy(&source.id, dest_parent).await?;
        let declared = source.size_bytes();
        let mut object = RemoteObject::from(copied);
        object.size = declared;
        Ok(CloneOutcome {
            object,
            transferred_bytes: declared.unwrap_or(0),
            skipped: Vec::new(),
        })
    }
}

fn replicate_children<'a, S: RemoteStore>(
    store: &'a S,
    source_id: &'a str,
    dest_id: &'a str,
    best_effort: bool,
) -> BoxFuture<'a, DriveResult<(u64, Vec<DriveError>)>> {
    Box::pin(async move {
        let mut bytes = 0u64;
        let mut skipped = Vec::new();
        for child in store.children(source_id).await? {
            if child.is_folder() {
                let sub = store.mkdir(&child.name, dest_id).await?;
                let (b, s) = replicate_children(store, &child.id, &sub.id, best_effort).await?;
                bytes += b;
                skipped.extend(s);
            } else {
                match store.copy(&child.id, dest_id).await {
                    Ok(_) => bytes += child.size_bytes().unwrap_or(0),
                    Err(err) if best_effort => {
                        error!("skipping '{}': {}", child.name, err);
                        skipped.push(err);
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok((bytes, skipped))
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Upload
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Upload a local file or directory tree into the container `dest_parent`.
///
/// A directory becomes a folder named after its base name, with every entry
/// recursing beneath it. Entry order follows the filesystem listing.
pub async fn upload_tree<S: RemoteStore>(
    store: &S,
    path: &Path,
    dest_parent: &str,
) -> DriveResult<DriveFile> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        DriveError::path_not_found(format!("cannot stat '{}': {}", path.display(), e))
    })?;
    if metadata.is_file() {
        return store.upload(path, dest_parent).await;
    }
    if metadata.is_dir() {
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => {
                return Err(DriveError::path_not_found(format!(
                    "'{}' has no directory name",
                    path.display()
                )))
            }
        };
        let root = store.mkdir(&name, dest_parent).await?;
        upload_children(store, path, &root.id).await?;
        info!("uploaded directory '{}' as '{}'", name, root.id);
        return Ok(root);
    }
    Err(DriveError::path_not_found(format!(
        "'{}' is neither a file nor a directory",
        path.display()
    )))
}

fn upload_children<'a, S: RemoteStore>(
    store: &'a S,
    dir: &'a Path,
    dest_id: &'a str,
) -> BoxFuture<'a, DriveResult<()>> {
    Box::pin(async move {
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| {
            DriveError::path_not_found(format!("cannot list '{}': {}", dir.display(), e))
        })?;
        loop {
            let entry = match entries.next_entry().await.map_err(|e| {
                DriveError::path_not_found(format!("cannot list '{}': {}", dir.display(), e))
            })? {
                Some(entry) => entry,
                None => return Ok(()),
            };
            let path = entry.path();
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    debug!("skipping unreadable entry '{}': {}", path.display(), e);
                    continue;
                }
            };
            if metadata.is_dir() {
                let name = entry.file_name().to_string_lossy().into_owned();
                let sub = store.mkdir(&name, dest_id).await?;
                upload_children(store, &path, &sub.id).await?;
            } else if metadata.is_file() {
                store.upload(&path, dest_id).await?;
            } else {
                debug!("skipping special entry '{}'", path.display());
            }
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{mime_types, DriveErrorKind, ObjectKind};
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Clone)]
    struct Node {
        id: String,
        name: String,
        folder: bool,
        size: Option<u64>,
        parent: Option<String>,
    }

    #[derive(Default)]
    struct FakeStore {
        nodes: Mutex<HashMap<String, Node>>,
        fail_copies: Mutex<HashSet<String>>,
        next_id: AtomicU32,
        fetches: AtomicU32,
        mutations: AtomicU32,
    }

    impl FakeStore {
        fn insert(&self, id: &str, name: &str, folder: bool, size: Option<u64>, parent: Option<&str>) {
            let node = Node {
                id: id.to_string(),
                name: name.to_string(),
                folder,
                size,
                parent: parent.map(str::to_string),
            };
            self.nodes.lock().unwrap().insert(id.to_string(), node);
        }

        fn fail_copy_of(&self, id: &str) {
            self.fail_copies.lock().unwrap().insert(id.to_string());
        }

        fn fresh_id(&self, prefix: &str) -> String {
            format!("{}{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst))
        }

        fn wire(node: &Node) -> DriveFile {
            DriveFile {
                id: node.id.clone(),
                name: node.name.clone(),
                mime_type: if node.folder {
                    mime_types::FOLDER.to_string()
                } else {
                    "text/plain".to_string()
                },
                size: node.size.map(|s| s.to_string()),
                parents: node.parent.clone().into_iter().collect(),
                kind: None,
                drive_id: None,
                modified_time: None,
                trashed: None,
            }
        }

        fn names_under(&self, parent: &str) -> Vec<String> {
            let mut names: Vec<String> = self
                .nodes
                .lock()
                .unwrap()
                .values()
                .filter(|n| n.parent.as_deref() == Some(parent))
                .map(|n| n.name.clone())
                .collect();
            names.sort();
            names
        }

        fn child_id(&self, parent: &str, name: &str) -> String {
            self.nodes
                .lock()
                .unwrap()
                .values()
                .find(|n| n.parent.as_deref() == Some(parent) && n.name == name)
                .map(|n| n.id.clone())
                .unwrap()
        }

        fn mutation_count(&self) -> u32 {
            self.mutations.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteStore for FakeStore {
        async fn fetch(&self, id: &str) -> DriveResult<DriveFile> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            self.nodes
                .lock()
                .unwrap()
                .get(id)
                .map(Self::wire)
                .ok_or_else(|| DriveError::not_found(format!("no object '{}'", id)))
        }

        async fn copy(&self, id: &str, dest_parent: &str) -> DriveResult<DriveFile> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            if self.fail_copies.lock().unwrap().contains(id) {
                return Err(DriveError::remote(format!("copy of '{}' rejected", id)));
            }
            let source = self
                .nodes
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| DriveError::not_found(format!("no object '{}'", id)))?;
            let copy = Node {
                id: self.fresh_id("copy"),
                name: source.name,
                folder: false,
                size: source.size,
                parent: Some(dest_parent.to_string()),
            };
            let wire = Self::wire(&copy);
            self.nodes.lock().unwrap().insert(copy.id.clone(), copy);
            Ok(wire)
        }

        async fn mkdir(&self, name: &str, parent: &str) -> DriveResult<DriveFile> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            let node = Node {
                id: self.fresh_id("dir"),
                name: name.to_string(),
                folder: true,
                size: None,
                parent: Some(parent.to_string()),
            };
            let wire = Self::wire(&node);
            self.nodes.lock().unwrap().insert(node.id.clone(), node);
            Ok(wire)
        }

        async fn children(&self, folder_id: &str) -> DriveResult<Vec<DriveFile>> {
            let mut children: Vec<Node> = self
                .nodes
                .lock()
                .unwrap()
                .values()
                .filter(|n| n.parent.as_deref() == Some(folder_id))
                .cloned()
                .collect();
            children.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(children.iter().map(Self::wire).collect())
        }

        async fn upload(&self, path: &Path, parent: &str) -> DriveResult<DriveFile> {
            self.mutations.fetch_add(1, Ordering::SeqCst);
            let size = std::fs::metadata(path)
                .map_err(|e| DriveError::path_not_found(e.to_string()))?
                .len();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let node = Node {
                id: self.fresh_id("file"),
                name,
                folder: false,
                size: Some(size),
                parent: Some(parent.to_string()),
            };
            let wire = Self::wire(&node);
            self.nodes.lock().unwrap().insert(node.id.clone(), node);
            Ok(wire)
        }
    }

    /// photos/{a.jpg 10, b.jpg 5, raw/{c.raw 20}} plus an empty backup folder.
    fn seeded() -> FakeStore {
        let store = FakeStore::default();
        store.insert("src", "photos", true, None, None);
        store.insert("f1", "a.jpg", false, Some(10), Some("src"));
        store.insert("f2", "b.jpg", false, Some(5), Some("src"));
        store.insert("sub", "raw", true, None, Some("src"));
        store.insert("f3", "c.raw", false, Some(20), Some("sub"));
        store.insert("dest", "backup", true, None, None);
        store
    }

    // ── clone ────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn cloning_into_itself_is_rejected_before_any_call() {
        let store = seeded();
        let err = clone_tree(&store, "src", "src", true).await.unwrap_err();
        assert_eq!(err.kind, DriveErrorKind::InvalidOperation);
        assert_eq!(store.mutation_count(), 0);
        assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cloning_a_file_reports_its_declared_size() {
        let store = seeded();
        let outcome = clone_tree(&store, "f1", "dest", false).await.unwrap();
        assert_eq!(outcome.transferred_bytes, 10);
        assert_eq!(outcome.object.kind, ObjectKind::File);
        assert_eq!(outcome.object.size, Some(10));
        assert!(outcome.skipped.is_empty());
        assert_eq!(store.names_under("dest"), vec!["a.jpg"]);
    }

    #[tokio::test]
    async fn cloning_a_folder_replicates_the_subtree() {
        let store = seeded();
        let outcome = clone_tree(&store, "src", "dest", false).await.unwrap();
        assert_eq!(outcome.transferred_bytes, 35);
        assert_eq!(outcome.object.size, Some(35));
        assert_eq!(outcome.object.kind, ObjectKind::Folder);
        assert_eq!(store.names_under("dest"), vec!["photos"]);
        assert_eq!(
            store.names_under(&outcome.object.id),
            vec!["a.jpg", "b.jpg", "raw"]
        );
        let raw_copy = store.child_id(&outcome.object.id, "raw");
        assert_eq!(store.names_under(&raw_copy), vec!["c.raw"]);
    }

    #[tokio::test]
    async fn missing_sizes_contribute_zero_to_the_aggregate() {
        let store = seeded();
        store.insert("f4", "nosize.bin", false, None, Some("src"));
        let outcome = clone_tree(&store, "src", "dest", false).await.unwrap();
        assert_eq!(outcome.transferred_bytes, 35);
    }

    #[tokio::test]
    async fn best_effort_keeps_siblings_of_a_failed_copy() {
        let store = seeded();
        store.fail_copy_of("f1");
        let outcome = clone_tree(&store, "src", "dest", true).await.unwrap();
        assert_eq!(outcome.transferred_bytes, 25);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(
            store.names_under(&outcome.object.id),
            vec!["b.jpg", "raw"]
        );
    }

    #[tokio::test]
    async fn strict_clone_stops_at_the_first_failure() {
        let store = seeded();
        store.fail_copy_of("f1");
        let err = clone_tree(&store, "src", "dest", false).await.unwrap_err();
        assert_eq!(err.kind, DriveErrorKind::RemoteOperation);
        // Root folder created, first copy attempted, nothing after.
        assert_eq!(store.mutation_count(), 2);
    }

    // ── upload ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn uploads_a_directory_recursively() {
        let store = FakeStore::default();
        store.insert("dest", "backup", true, None, None);
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("album");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(root.join("one.txt"), b"11111").unwrap();
        std::fs::create_dir(root.join("nested")).unwrap();
        std::fs::write(root.join("nested").join("two.txt"), b"22").unwrap();

        let created = upload_tree(&store, &root, "dest").await.unwrap();
        assert!(created.is_folder());
        assert_eq!(store.names_under("dest"), vec!["album"]);
        assert_eq!(
            store.names_under(&created.id),
            vec!["nested", "one.txt"]
        );
        let nested_id = store.child_id(&created.id, "nested");
        assert_eq!(store.names_under(&nested_id), vec!["two.txt"]);
    }

    #[tokio::test]
    async fn uploads_a_single_file() {
        let store = FakeStore::default();
        store.insert("dest", "backup", true, None, None);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solo.txt");
        std::fs::write(&path, b"abc").unwrap();

        let created = upload_tree(&store, &path, "dest").await.unwrap();
        assert_eq!(created.name, "solo.txt");
        assert_eq!(created.size_bytes(), Some(3));
        assert_eq!(store.names_under("dest"), vec!["solo.txt"]);
    }

    #[tokio::test]
    async fn missing_local_path_is_path_not_found() {
        let store = FakeStore::default();
        let err = upload_tree(&store, Path::new("/definitely/not/here"), "dest")
            .await
            .unwrap_err();
        assert_eq!(err.kind, DriveErrorKind::PathNotFound);
    }
}
