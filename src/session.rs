//! Session façade.
//!
//! One `Session` per authenticated actor: it owns the client, resolves the
//! working container once at construction, and exposes the high-level verbs
//! as thin pass-throughs over the operation modules. Verbs take `&mut self`
//! because the identity pool is advanced in place; a session must not be
//! driven by more than one caller at a time.

use std::path::Path;

use crate::auth::Credential;
use crate::client::DriveClient;
use crate::links;
use crate::tree;
use crate::types::{
    DriveConfig, DriveResult, Permission, RemoteObject, UploadStatus,
};
use crate::{files, folders, search, sharing};

/// Alias accepted wherever a container id is expected.
const ROOT: &str = "root";

/// An authenticated connection plus working context.
pub struct Session {
    /// Client carrying the credential and retry/rotation layers.
    client: DriveClient,
    /// Resolved working container; destination for verbs that are not given
    /// an explicit per-call container.
    container: String,
}

impl Session {
    /// Authenticate with `credential`, working in the provider root.
    pub fn new(credential: Credential) -> DriveResult<Self> {
        Self::with_config(credential, DriveConfig::default(), None)
    }

    /// Load the credential from a key file, an authorized-user blob, or an
    /// identity-pool directory.
    pub fn from_credential_path(path: impl AsRef<Path>) -> DriveResult<Self> {
        Self::new(Credential::from_path(path)?)
    }

    /// Full-control constructor. `container` is a raw id or shareable link;
    /// `None` means the provider root. It is resolved here, once: per-call
    /// destinations are passed to the verbs instead of mutating the session.
    pub fn with_config(
        credential: Credential,
        config: DriveConfig,
        container: Option<&str>,
    ) -> DriveResult<Self> {
        let container = match container {
            Some(c) => resolve_container(c)?,
            None => ROOT.to_string(),
        };
        Ok(Self {
            client: DriveClient::with_config(credential, config)?,
            container,
        })
    }

    /// The resolved working container id.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Borrow the underlying client, e.g. for [`crate::tree::clone_tree`]
    /// with a non-default failure policy.
    pub fn client(&self) -> &DriveClient {
        &self.client
    }

    // ── Verbs ────────────────────────────────────────────────────────────

    /// Upload a local file or directory tree.
    pub async fn upload(
        &mut self,
        path: impl AsRef<Path>,
        container: Option<&str>,
    ) -> DriveResult<RemoteObject> {
        let dest = self.destination(container)?;
        let file = tree::upload_tree(&self.client, path.as_ref(), &dest).await?;
        Ok(file.into())
    }

    /// Replicate a remote file or folder subtree into a container.
    ///
    /// Folder clones are best-effort: a child whose copy fails is logged and
    /// skipped. The returned folder object carries the aggregated size of
    /// the files actually copied.
    pub async fn clone_object(
        &mut self,
        source: &str,
        container: Option<&str>,
    ) -> DriveResult<RemoteObject> {
        let source_id = resolve_target(source)?;
        let dest = self.destination(container)?;
        let outcome = tree::clone_tree(&self.client, &source_id, &dest, true).await?;
        Ok(outcome.object)
    }

    /// Re-parent an object: every current parent is replaced by the
    /// destination container.
    pub async fn move_object(
        &mut self,
        target: &str,
        container: Option<&str>,
    ) -> DriveResult<RemoteObject> {
        let id = resolve_target(target)?;
        let dest = self.destination(container)?;
        Ok(files::move_file(&self.client, &id, &dest).await?.into())
    }

    /// Create a folder.
    pub async fn create_folder(
        &mut self,
        name: &str,
        container: Option<&str>,
    ) -> DriveResult<RemoteObject> {
        let dest = self.destination(container)?;
        Ok(folders::create_folder(&self.client, name, &dest)
            .await?
            .into())
    }

    /// Delete an object: to the trash by default, permanently when asked.
    pub async fn delete(&mut self, target: &str, permanent: bool) -> DriveResult<()> {
        let id = resolve_target(target)?;
        if permanent {
            files::delete_file(&self.client, &id).await
        } else {
            files::trash_file(&self.client, &id).await.map(|_| ())
        }
    }

    /// Permanently delete everything in the trash.
    pub async fn empty_trash(&mut self) -> DriveResult<()> {
        files::empty_trash(&self.client).await
    }

    /// Grant anyone-with-the-link read access. The share URL is already on
    /// every returned [`RemoteObject`] (`url`), so no extra call is needed
    /// to hand out the link.
    pub async fn make_public(&mut self, target: &str) -> DriveResult<Permission> {
        let id = resolve_target(target)?;
        sharing::make_public(&self.client, &id).await
    }

    /// Search objects by name, most recently modified first. `container`
    /// scopes the search to one folder's children; `None` searches
    /// everywhere.
    pub async fn search(
        &mut self,
        name: &str,
        container: Option<&str>,
        limit: Option<u32>,
        page_token: Option<&str>,
    ) -> DriveResult<(Vec<RemoteObject>, Option<String>)> {
        let folder = match container {
            Some(c) => Some(resolve_target(c)?),
            None => None,
        };
        let (found, next) =
            search::search_files(&self.client, name, folder.as_deref(), limit, page_token)
                .await?;
        Ok((found.into_iter().map(Into::into).collect(), next))
    }

    // ── Transfer state ───────────────────────────────────────────────────

    /// Cumulative bytes of successfully uploaded files.
    pub fn uploaded_bytes(&self) -> u64 {
        self.client.uploaded_bytes()
    }

    /// Progress of the most recent chunked upload, if any has started.
    pub fn last_upload_status(&self) -> Option<UploadStatus> {
        self.client.upload_status()
    }

    fn destination(&self, container: Option<&str>) -> DriveResult<String> {
        match container {
            Some(c) => resolve_target(c),
            None => Ok(self.container.clone()),
        }
    }
}

/// Resolve the working container at construction: the `root` alias passes
/// through, anything else must parse as a link or recognized bare id.
fn resolve_container(input: &str) -> DriveResult<String> {
    if input == ROOT {
        return Ok(ROOT.to_string());
    }
    links::extract_id(input)
}

/// Resolve a verb's per-call id input. The `root` alias and strings made
/// only of id characters pass through raw; the service, not this client,
/// is the authority on id shape. Link-shaped inputs go through the parser.
fn resolve_target(input: &str) -> DriveResult<String> {
    if input == ROOT {
        return Ok(ROOT.to_string());
    }
    if !input.is_empty() && input.chars().all(links::is_id_char) {
        return Ok(input.to_string());
    }
    links::extract_id(input)
}
