//! Full-drain pagination over listing endpoints.

use serde_json::Value;

use crate::error::{MigrateError, Result};

use super::client::RestClient;

const PAGE_SIZE: usize = 100;

/// Drain every page of a REST listing endpoint before returning.
///
/// Downstream existence checks assume a complete source-side listing, so the
/// sequence is never consumed lazily across driver steps. `items_key` names
/// the array field for endpoints that wrap their results in an object
/// (`{"variables": [...], "total_count": n}`); `None` expects a bare array.
///
/// Restartable per invocation; not resumable across process restarts.
pub async fn paginate(
    client: &RestClient,
    path: &str,
    items_key: Option<&str>,
) -> Result<Vec<Value>> {
    let mut items = Vec::new();
    let mut page = 1usize;

    loop {
        let separator = if path.contains('?') { '&' } else { '?' };
        let url = format!("{path}{separator}per_page={PAGE_SIZE}&page={page}");
        let response = client.get(&url).await?;

        let page_items = match items_key {
            Some(key) => response
                .body
                .get(key)
                .and_then(Value::as_array)
                .cloned()
                .ok_or_else(|| {
                    MigrateError::api(
                        response.status,
                        format!("expected `{key}` array in listing response"),
                    )
                })?,
            None => response
                .body
                .as_array()
                .cloned()
                .ok_or_else(|| {
                    MigrateError::api(response.status, "expected array listing response")
                })?,
        };

        let got = page_items.len();
        items.extend(page_items);

        // REST listings signal the end with a short page.
        if got < PAGE_SIZE {
            break;
        }
        page += 1;
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstanceConfig;
    use serde_json::json;
    use wiremock::matchers::{method, path as url_path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> RestClient {
        let mut instance = InstanceConfig::new("acme", "t");
        instance.api_url = server.uri();
        RestClient::new(&instance).unwrap()
    }

    #[tokio::test]
    async fn test_drains_all_pages() {
        let server = MockServer::start().await;
        let full_page: Vec<Value> = (0..PAGE_SIZE).map(|i| json!({"id": i})).collect();
        Mock::given(method("GET"))
            .and(url_path("/orgs/acme/repos"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(full_page)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/orgs/acme/repos"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 100}, {"id": 101}])))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let items = paginate(&client, "/orgs/acme/repos", None).await.unwrap();
        assert_eq!(items.len(), PAGE_SIZE + 2);
        assert_eq!(items[PAGE_SIZE + 1]["id"], 101);
    }

    #[tokio::test]
    async fn test_wrapped_listing_uses_items_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/orgs/acme/actions/variables"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_count": 1,
                "variables": [{"name": "REGION", "value": "eu-west-1"}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let items = paginate(&client, "/orgs/acme/actions/variables", Some("variables"))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["name"], "REGION");
    }

    #[tokio::test]
    async fn test_existing_query_string_preserved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/orgs/acme/packages"))
            .and(query_param("package_type", "maven"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "com.acme.widget"}])))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let items = paginate(&client, "/orgs/acme/packages?package_type=maven", None)
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
    }
}
