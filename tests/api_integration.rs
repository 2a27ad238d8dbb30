use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sql_migration_wizard::config::AppConfig;
use sql_migration_wizard::store::{CatalogResourceProvider, ResourceCatalog};
use sql_migration_wizard::{serve, WizardService};
use tokio::net::TcpListener;

// Test client wrapper for making API calls
struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn post(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(&format!("{}{}", self.base_url, path))
            .json(&json)
            .send()
            .await
    }

    async fn put(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .put(&format!("{}{}", self.base_url, path))
            .json(&json)
            .send()
            .await
    }

    async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(&format!("{}{}", self.base_url, path))
            .send()
            .await
    }

    async fn delete(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .delete(&format!("{}{}", self.base_url, path))
            .send()
            .await
    }
}

fn catalog() -> ResourceCatalog {
    serde_json::from_value(json!({
        "accounts": [
            {
                "id": "acct-1",
                "display_name": "dba@contoso.com",
                "tenants": [{
                    "id": "tenant-1",
                    "display_name": "Contoso",
                    "subscriptions": [{
                        "id": "sub-1",
                        "display_name": "Production",
                        "locations": [{ "id": "westeurope", "display_name": "West Europe" }],
                        "instances": [{
                            "id": "/subscriptions/sub-1/resourceGroups/rg-app/providers/Microsoft.Sql/managedInstances/mi1",
                            "name": "mi1",
                            "location": "westeurope",
                            "details": { "kind": "ManagedInstance", "state": "Ready" }
                        }]
                    }]
                }]
            },
            {
                "id": "acct-2",
                "display_name": "ops@contoso.com",
                "tenants": [{
                    "id": "tenant-2",
                    "display_name": "Fabrikam",
                    "subscriptions": [{
                        "id": "sub-2",
                        "display_name": "Staging",
                        "instances": [{
                            "id": "/subscriptions/sub-2/resourceGroups/rg-db/providers/Microsoft.Sql/managedInstances/mi-a",
                            "name": "mi-a",
                            "location": "eastus",
                            "details": { "kind": "ManagedInstance", "state": "Stopped" }
                        }]
                    }]
                }]
            }
        ]
    }))
    .unwrap()
}

/// Boot the router on an ephemeral port, importing from `root` and
/// saving reports under `root/saved`
async fn start_server(root: &std::path::Path) -> TestClient {
    let mut config = AppConfig::default();
    config.storage.reports_dir = root.join("saved").display().to_string();
    config.storage.imports_dir = root.display().to_string();
    let service = WizardService::new(config, Arc::new(CatalogResourceProvider::new(catalog())));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(serve(listener, service));

    TestClient::new(format!("http://{}", address))
}

fn last_selected_name(session: &Value) -> Option<&str> {
    session["selection_path"]
        .as_array()?
        .last()?
        .get("name")?
        .as_str()
}

#[tokio::test]
async fn test_health() {
    let dir = tempfile::tempdir().unwrap();
    let client = start_server(dir.path()).await;

    let resp = client.get("/health").await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["sessions"], 0);
}

#[tokio::test]
async fn test_wizard_session_workflow() {
    let dir = tempfile::tempdir().unwrap();
    let client = start_server(dir.path()).await;

    // 1. Opening a session walks the cascade to the first target
    let resp = client.post("/sessions", json!({})).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let session: Value = resp.json().await.unwrap();
    let id = session["id"].as_str().unwrap().to_string();
    assert_eq!(session["selection_path"].as_array().unwrap().len(), 6);
    assert_eq!(last_selected_name(&session), Some("mi1"));
    assert_eq!(session["target_kind"], "AzureSqlManagedInstance");

    let validation: Value = client
        .get(&format!("/sessions/{}/validation", id))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(validation["valid"], true);

    // 2. Switching account refreshes everything below it
    let resp = client
        .post(
            &format!("/sessions/{}/stages/account/select", id),
            json!({ "candidate_id": "acct-2" }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let session: Value = resp.json().await.unwrap();
    assert_eq!(last_selected_name(&session), Some("mi-a"));
    assert_eq!(session["stages"][5]["candidates"][0]["resource"]["name"], "mi-a");

    // The only target is stopped, so leaving the page is refused
    let resp = client
        .post(&format!("/sessions/{}/commit", id), json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("To continue, select a valid managed instance."));

    // 3. Bad selections
    let resp = client
        .post(
            &format!("/sessions/{}/stages/tenant/select", id),
            json!({ "candidate_id": "tenant-9" }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .post(
            &format!("/sessions/{}/stages/region/select", id),
            json!({ "candidate_id": "westeurope" }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    client
        .post(
            &format!("/sessions/{}/stages/account/select", id),
            json!({ "candidate_id": "acct-1" }),
        )
        .await
        .unwrap();

    // 4. Import an assessment report
    let report_path = dir.path().join("sql01.json");
    std::fs::write(
        &report_path,
        serde_json::to_vec(&json!({
            "AssessmentToolVersion": "1.0",
            "Servers": [{
                "ServerAssessments": [],
                "Databases": [
                    { "Properties": { "Name": "sales" }, "DatabaseAssessments": [] },
                    { "Properties": { "Name": "hr" }, "DatabaseAssessments": [] }
                ]
            }]
        }))
        .unwrap(),
    )
    .unwrap();

    let resp = client
        .post(
            &format!("/sessions/{}/assessment/import", id),
            json!({ "path": "sql01.json" }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let assessment: Value = resp.json().await.unwrap();
    assert_eq!(assessment["saved_info"]["database_list"], json!(["hr", "sales"]));
    assert_eq!(assessment["readiness"].as_array().unwrap().len(), 3);

    let bad_path = dir.path().join("notes.json");
    std::fs::write(&bad_path, b"{\"Hello\": 1}").unwrap();
    let resp = client
        .post(
            &format!("/sessions/{}/assessment/import", id),
            json!({ "path": bad_path }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Selected invalid format import file"));

    // Files outside the import directory are off limits
    let elsewhere = tempfile::tempdir().unwrap();
    let outside_path = elsewhere.path().join("sql01.json");
    std::fs::copy(&report_path, &outside_path).unwrap();
    for path in [json!(outside_path), json!("../sql01.json")] {
        let resp = client
            .post(
                &format!("/sessions/{}/assessment/import", id),
                json!({ "path": path }),
            )
            .await
            .unwrap();
        assert!(
            resp.status() == StatusCode::FORBIDDEN || resp.status() == StatusCode::BAD_REQUEST,
            "unexpected status {}",
            resp.status()
        );
    }
    let resp = client
        .post(
            &format!("/sessions/{}/assessment/import", id),
            json!({ "path": outside_path }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    // The failed imports leave the previous assessment in place
    let resp = client
        .get(&format!("/sessions/{}/assessment", id))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // 5. Pick databases and commit targets
    let resp = client
        .put(
            &format!("/sessions/{}/databases", id),
            json!({ "databases": ["payroll"] }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .put(
            &format!("/sessions/{}/databases", id),
            json!({ "databases": ["sales"] }),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(&format!("/sessions/{}/commit", id), json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let info: Value = resp.json().await.unwrap();
    assert_eq!(info["migration_target_type"], "AzureSqlManagedInstance");
    assert_eq!(info["target_server_instance"]["name"], "mi1");
    assert_eq!(info["databases_for_migration"], json!(["sales"]));

    // 6. Save, close and resume
    let resp = client
        .post(&format!("/sessions/{}/assessment/save", id), json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let saved: Value = resp.json().await.unwrap();
    let hash = saved["hash"].as_str().unwrap().to_string();

    let resp = client.delete(&format!("/sessions/{}", id)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = client.get(&format!("/sessions/{}", id)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = client
        .post(&format!("/saved-reports/{}/resume", hash), json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let resumed: Value = resp.json().await.unwrap();
    assert_ne!(resumed["id"], json!(id));
    assert_eq!(resumed["has_assessment"], true);
    assert_eq!(resumed["selected_databases"], json!(["sales"]));
    assert_eq!(last_selected_name(&resumed), Some("mi1"));
}

#[tokio::test]
async fn test_unknown_session_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let client = start_server(dir.path()).await;

    let resp = client.get("/sessions/does-not-exist").await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Session not found");

    let resp = client
        .post("/saved-reports/deadbeef/resume", json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_save_requires_imported_report() {
    let dir = tempfile::tempdir().unwrap();
    let client = start_server(dir.path()).await;

    let session: Value = client
        .post("/sessions", json!({ "target_kind": "AzureSqlVirtualMachine" }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = session["id"].as_str().unwrap();

    // No virtual machines in the catalog
    assert_eq!(
        session["stages"][3]["candidates"][0]["not_found"]["message"],
        "No locations found."
    );

    let resp = client
        .post(&format!("/sessions/{}/assessment/save", id), json!({}))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client
        .get(&format!("/sessions/{}/assessment", id))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
