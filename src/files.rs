//! Single-object file operations: fetch, copy, move, trash, delete.

use log::{debug, info};

use crate::client::{api_url, with_identity_rotation, DriveClient};
use crate::types::{CopyFileRequest, DriveError, DriveFile, DriveResult, UpdateFileRequest};

/// Metadata fields requested on every single-object call.
pub(crate) const DEFAULT_FILE_FIELDS: &str = "id, name, mimeType, size, parents";

/// Fetch metadata without the rotation wrapper; building block for
/// operations that manage rotation themselves.
pub(crate) async fn fetch_file(client: &DriveClient, id: &str) -> DriveResult<DriveFile> {
    let url = api_url(&format!("files/{}", id));
    client
        .request_json(client.attempts_for(false), |http| {
            http.get(&url).query(&[
                ("fields", DEFAULT_FILE_FIELDS),
                ("supportsAllDrives", "true"),
            ])
        })
        .await
}

/// Fetch object metadata by id.
pub async fn get_file(client: &DriveClient, id: &str) -> DriveResult<DriveFile> {
    debug!("fetching metadata for '{}'", id);
    with_identity_rotation(client, || Box::pin(fetch_file(client, id))).await
}

/// Copy a file into `dest_parent`. Folders cannot be copied directly; the
/// tree engine replicates them.
pub async fn copy_file(client: &DriveClient, id: &str, dest_parent: &str) -> DriveResult<DriveFile> {
    info!("copying '{}' into '{}'", id, dest_parent);
    let url = api_url(&format!("files/{}/copy", id));
    let body = CopyFileRequest {
        parents: vec![dest_parent.to_string()],
    };
    let url = &url;
    let body = &body;
    with_identity_rotation(client, || {
        Box::pin(async move {
            client
                .request_json(client.attempts_for(false), |http| {
                    http.post(url)
                        .query(&[
                            ("fields", DEFAULT_FILE_FIELDS),
                            ("supportsAllDrives", "true"),
                        ])
                        .json(body)
                })
                .await
        })
    })
    .await
}

/// Re-parent an object: every current parent is replaced by `dest_parent`.
pub async fn move_file(client: &DriveClient, id: &str, dest_parent: &str) -> DriveResult<DriveFile> {
    let current = get_file(client, id).await?;
    let remove = removal_list(&current.parents).ok_or_else(|| {
        DriveError::not_found(format!("'{}' has no parent references to replace", id))
    })?;
    info!("moving '{}' into '{}'", current.name, dest_parent);

    let url = api_url(&format!("files/{}", id));
    let body = UpdateFileRequest::default();
    let url = &url;
    let remove = &remove;
    let body = &body;
    with_identity_rotation(client, || {
        Box::pin(async move {
            client
                .request_json(client.attempts_for(true), |http| {
                    http.patch(url)
                        .query(&[
                            ("addParents", dest_parent),
                            ("removeParents", remove.as_str()),
                            ("fields", DEFAULT_FILE_FIELDS),
                            ("supportsAllDrives", "true"),
                        ])
                        .json(body)
                })
                .await
        })
    })
    .await
}

/// Move an object to the trash (recoverable delete).
pub async fn trash_file(client: &DriveClient, id: &str) -> DriveResult<DriveFile> {
    info!("trashing '{}'", id);
    let url = api_url(&format!("files/{}", id));
    let body = UpdateFileRequest {
        trashed: Some(true),
    };
    let url = &url;
    let body = &body;
    with_identity_rotation(client, || {
        Box::pin(async move {
            client
                .request_json(client.attempts_for(true), |http| {
                    http.patch(url)
                        .query(&[
                            ("fields", DEFAULT_FILE_FIELDS),
                            ("supportsAllDrives", "true"),
                        ])
                        .json(body)
                })
                .await
        })
    })
    .await
}

/// Permanently delete an object, bypassing the trash.
pub async fn delete_file(client: &DriveClient, id: &str) -> DriveResult<()> {
    info!("deleting '{}'", id);
    let url = api_url(&format!("files/{}", id));
    let url = &url;
    with_identity_rotation(client, || {
        Box::pin(async move {
            client
                .request_empty(client.attempts_for(true), |http| {
                    http.delete(url).query(&[("supportsAllDrives", "true")])
                })
                .await
        })
    })
    .await
}

/// Permanently delete everything in the trash.
pub async fn empty_trash(client: &DriveClient) -> DriveResult<()> {
    info!("emptying trash");
    let url = api_url("files/trash");
    let url = &url;
    with_identity_rotation(client, || {
        Box::pin(async move {
            client
                .request_empty(client.attempts_for(true), |http| http.delete(url))
                .await
        })
    })
    .await
}

/// Comma-joined parent list for `removeParents`; `None` when there is
/// nothing to remove.
fn removal_list(parents: &[String]) -> Option<String> {
    if parents.is_empty() {
        None
    } else {
        Some(parents.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_list_joins_all_parents() {
        let parents = vec!["a".to_string(), "b".to_string()];
        assert_eq!(removal_list(&parents).unwrap(), "a,b");
    }

    #[test]
    fn removal_list_empty_means_nothing_to_replace() {
        assert!(removal_list(&[]).is_none());
    }
}
