//! Permission changes.

use log::info;

use crate::client::{api_url, with_identity_rotation, DriveClient};
use crate::types::{CreatePermissionRequest, DriveResult, Permission};

/// Grant anyone-with-the-link read access to an object. The matching share
/// URL is a pure function of the object (see [`crate::links::share_link`]).
pub async fn make_public(client: &DriveClient, id: &str) -> DriveResult<Permission> {
    info!("granting public read access on '{}'", id);
    let url = api_url(&format!("files/{}/permissions", id));
    let body = CreatePermissionRequest::public_reader();
    let url = &url;
    let body = &body;
    with_identity_rotation(client, || {
        Box::pin(async move {
            client
                .request_json(client.attempts_for(false), |http| {
                    http.post(url)
                        .query(&[("supportsAllDrives", "true")])
                        .json(body)
                })
                .await
        })
    })
    .await
}
