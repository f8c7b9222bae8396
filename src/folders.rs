//! Folder creation and child listing.

use log::{debug, info};

use crate::client::{api_url, with_identity_rotation, DriveClient};
use crate::files::DEFAULT_FILE_FIELDS;
use crate::search::escape;
use crate::types::{mime_types, CreateFileRequest, DriveFile, DriveResult, FileList};

/// Fields requested per child on listing calls.
const CHILD_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size)";

/// The id is escaped: link parsing can hand over ids containing quote
/// characters, and they must not terminate the query string early.
pub(crate) fn children_query(folder_id: &str) -> String {
    format!("'{}' in parents", escape(folder_id))
}

/// Create a folder named `name` under `parent`.
pub async fn create_folder(client: &DriveClient, name: &str, parent: &str) -> DriveResult<DriveFile> {
    info!("creating folder '{}' under '{}'", name, parent);
    let url = api_url("files");
    let body = CreateFileRequest {
        name: name.to_string(),
        mime_type: Some(mime_types::FOLDER.to_string()),
        parents: Some(vec![parent.to_string()]),
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

/// Fetch one page of a folder's direct children.
pub async fn list_children_page(
    client: &DriveClient,
    folder_id: &str,
    page_token: Option<&str>,
) -> DriveResult<FileList> {
    debug!("listing children of '{}'", folder_id);
    let url = api_url("files");
    let mut params = vec![
        ("q".to_string(), children_query(folder_id)),
        ("spaces".to_string(), "drive".to_string()),
        ("fields".to_string(), CHILD_FIELDS.to_string()),
        ("pageSize".to_string(), client.config().page_size.to_string()),
        ("supportsAllDrives".to_string(), "true".to_string()),
        ("includeItemsFromAllDrives".to_string(), "true".to_string()),
    ];
    if let Some(token) = page_token {
        params.push(("pageToken".to_string(), token.to_string()));
    }
    let url = &url;
    let params = &params;
    with_identity_rotation(client, || {
        Box::pin(async move {
            client
                .request_json(client.attempts_for(false), |http| {
                    http.get(url).query(params)
                })
                .await
        })
    })
    .await
}

/// All direct children of a folder, following page tokens until exhausted.
pub async fn list_children(client: &DriveClient, folder_id: &str) -> DriveResult<Vec<DriveFile>> {
    let mut files = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = list_children_page(client, folder_id, token.as_deref()).await?;
        files.extend(page.files);
        match page.next_page_token {
            Some(next) => token = Some(next),
            None => return Ok(files),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_query_targets_the_parent() {
        assert_eq!(children_query("abc123"), "'abc123' in parents");
    }

    #[test]
    fn children_query_escapes_quotes_in_the_id() {
        assert_eq!(children_query("a'b"), r"'a\'b' in parents");
    }
}
