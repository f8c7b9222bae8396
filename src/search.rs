//! Name search over the remote object graph.

use log::debug;

use crate::client::{api_url, with_identity_rotation, DriveClient};
use crate::types::{DriveFile, DriveResult, FileList};

const SEARCH_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size)";

/// Escape the query language's special characters. The backslash goes
/// first so escapes introduced here are not themselves re-escaped.
pub(crate) fn escape(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('"', "\\\"")
}

/// Build the listing query: a name-contains clause, optionally scoped to a
/// parent folder. The folder id is escaped like the term; ids that arrived
/// through link parsing are not guaranteed quote-free.
pub(crate) fn build_query(term: &str, folder: Option<&str>) -> String {
    let mut query = format!("(name contains '{}')", escape(term));
    if let Some(folder) = folder {
        query.push_str(&format!(" and '{}' in parents", escape(folder)));
    }
    query
}

/// Search objects by name, most recently modified first. Returns one page
/// of results plus the token for the next page, if any.
pub async fn search_files(
    client: &DriveClient,
    term: &str,
    folder: Option<&str>,
    limit: Option<u32>,
    page_token: Option<&str>,
) -> DriveResult<(Vec<DriveFile>, Option<String>)> {
    let limit = limit.unwrap_or(client.config().search_limit);
    debug!("searching for '{}' (limit {})", term, limit);
    let url = api_url("files");
    let mut params = vec![
        ("q".to_string(), build_query(term, folder)),
        ("spaces".to_string(), "drive".to_string()),
        ("fields".to_string(), SEARCH_FIELDS.to_string()),
        ("orderBy".to_string(), "modifiedTime desc".to_string()),
        ("pageSize".to_string(), limit.to_string()),
        ("supportsAllDrives".to_string(), "true".to_string()),
        ("includeItemsFromAllDrives".to_string(), "true".to_string()),
    ];
    if let Some(token) = page_token {
        params.push(("pageToken".to_string(), token.to_string()));
    }
    let url = &url;
    let params = &params;
    let list: FileList = with_identity_rotation(client, || {
        Box::pin(async move {
            client
                .request_json(client.attempts_for(false), |http| {
                    http.get(url).query(params)
                })
                .await
        })
    })
    .await?;
    Ok((list.files, list.next_page_token))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── escaping ─────────────────────────────────────────────────────────

    #[test]
    fn escapes_quotes() {
        assert_eq!(escape("it's \"here\""), "it\\'s \\\"here\\\"");
    }

    #[test]
    fn escapes_backslash_before_quotes() {
        // A literal backslash-quote must not end up triple-escaped.
        assert_eq!(escape(r#"a\'b"#), r#"a\\\'b"#);
    }

    #[test]
    fn plain_terms_pass_through() {
        assert_eq!(escape("report 2024"), "report 2024");
    }

    // ── query building ───────────────────────────────────────────────────

    #[test]
    fn query_without_folder_is_a_single_clause() {
        assert_eq!(build_query("notes", None), "(name contains 'notes')");
    }

    #[test]
    fn folder_clause_joins_with_a_spaced_and() {
        assert_eq!(
            build_query("notes", Some("folder1")),
            "(name contains 'notes') and 'folder1' in parents"
        );
    }

    #[test]
    fn folder_ids_are_escaped_like_terms() {
        assert_eq!(
            build_query("notes", Some("f'1")),
            r"(name contains 'notes') and 'f\'1' in parents"
        );
    }
}
