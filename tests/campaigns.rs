use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::web::Data;
use async_trait::async_trait;
use campaign_publisher::database::{Database, MemoryDatabase};
use campaign_publisher::gateway::{AdsGateway, CampaignSpec, GatewayError, ResourceName};
use campaign_publisher::{
    app, CampaignBody, CreatedCampaignBody, Publisher, PublishedCampaignBody,
};
use chrono::Duration;
use serde_json::{json, Value};

#[derive(Default)]
struct StubGateway {
    fail_campaigns: bool,
    budget_calls: AtomicUsize,
    campaign_calls: AtomicUsize,
}

#[async_trait]
impl AdsGateway for StubGateway {
    async fn ensure_budget(
        &self,
        _name: &str,
        _amount_micros: i64,
    ) -> Result<ResourceName, GatewayError> {
        self.budget_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ResourceName::new("customers/1234567890/campaignBudgets/555"))
    }

    async fn create_campaign(&self, _spec: &CampaignSpec) -> Result<ResourceName, GatewayError> {
        self.campaign_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_campaigns {
            return Err(GatewayError::Api {
                status: 403,
                body: "USER_PERMISSION_DENIED for customer 1234567890".into(),
            });
        }
        Ok(ResourceName::new("customers/1234567890/campaigns/98765"))
    }
}

fn collaborators(gateway: Arc<StubGateway>) -> (Data<dyn Database>, Data<Publisher>) {
    let db: Arc<dyn Database> = Arc::new(MemoryDatabase::new());
    let publisher = Publisher::new(db.clone(), gateway, Duration::seconds(300));
    (Data::from(db), Data::new(publisher))
}

fn spring_sale() -> Value {
    json!({
        "name": "Spring Sale",
        "objective": "SALES",
        "campaign_type": "SEARCH",
        "daily_budget": 50,
        "start_date": "2025-03-01",
        "end_date": "2025-03-31",
        "ad_group_name": "Spring Shoppers",
        "ad_headline": "Spring Sale Now On",
        "ad_description": "Everything 20% off until the end of March",
    })
}

#[actix_web::test]
async fn create_campaign() {
    let (db, publisher) = collaborators(Arc::new(StubGateway::default()));
    let app = test::init_service(app(db, publisher)).await;

    let req = TestRequest::post()
        .uri("/api/campaigns")
        .set_json(spring_sale())
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "DRAFT");
    assert_eq!(body["message"], "Campaign created");

    let id = body["id"].as_str().unwrap().to_string();
    let req = TestRequest::get()
        .uri(&format!("/api/campaigns/{}", id))
        .to_request();
    let campaign: CampaignBody = test::call_and_read_body_json(&app, req).await;

    assert_eq!(campaign.name, "Spring Sale");
    assert_eq!(campaign.daily_budget, 50);
    assert_eq!(campaign.remote_campaign_id, None);
}

#[actix_web::test]
async fn create_campaign_reports_invalid_fields() {
    let (db, publisher) = collaborators(Arc::new(StubGateway::default()));
    let app = test::init_service(app(db, publisher)).await;

    let mut body = spring_sale();
    body["daily_budget"] = json!(0);
    body["end_date"] = json!("2025-02-01");
    body.as_object_mut().unwrap().remove("ad_headline");

    let req = TestRequest::post()
        .uri("/api/campaigns")
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error_code"], "E4001002");
    assert_eq!(
        body["error_meta"]["violations"],
        json!([
            { "type": "BUDGET-NOT-POSITIVE", "daily_budget": 0 },
            { "type": "MISSING-FIELD", "field": "ad_headline" },
            {
                "type": "START-NOT-BEFORE-END",
                "start_date": "2025-03-01",
                "end_date": "2025-02-01",
            },
        ])
    );

    let req = TestRequest::get().uri("/api/campaigns").to_request();
    let campaigns: Vec<CampaignBody> = test::call_and_read_body_json(&app, req).await;
    assert!(campaigns.is_empty());
}

#[actix_web::test]
async fn create_campaign_reports_mistyped_fields() {
    let (db, publisher) = collaborators(Arc::new(StubGateway::default()));
    let app = test::init_service(app(db, publisher)).await;

    let mut body = spring_sale();
    body["name"] = json!(123);
    body["daily_budget"] = json!(50.5);

    let req = TestRequest::post()
        .uri("/api/campaigns")
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error_code"], "E4001002");
    assert_eq!(
        body["error_meta"]["violations"],
        json!([
            { "type": "INVALID-TYPE", "field": "name", "expected": "string" },
            { "type": "INVALID-TYPE", "field": "daily_budget", "expected": "integer" },
        ])
    );
}

#[actix_web::test]
async fn create_campaign_rejects_malformed_json() {
    let (db, publisher) = collaborators(Arc::new(StubGateway::default()));
    let app = test::init_service(app(db, publisher)).await;

    let req = TestRequest::post()
        .uri("/api/campaigns")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"name\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error_code"], "E4001000");
}

#[actix_web::test]
async fn list_campaigns_newest_first() {
    let (db, publisher) = collaborators(Arc::new(StubGateway::default()));
    let app = test::init_service(app(db, publisher)).await;

    for name in ["Winter Clearance", "Spring Sale"] {
        let mut body = spring_sale();
        body["name"] = json!(name);
        let req = TestRequest::post()
            .uri("/api/campaigns")
            .set_json(body)
            .to_request();
        let _: CreatedCampaignBody = test::call_and_read_body_json(&app, req).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    // the trailing slash form used by the web client resolves to the same route
    let req = TestRequest::get().uri("/api/campaigns/").to_request();
    let campaigns: Vec<CampaignBody> = test::call_and_read_body_json(&app, req).await;

    let names: Vec<_> = campaigns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Spring Sale", "Winter Clearance"]);
}

#[actix_web::test]
async fn publish_campaign() {
    let gateway = Arc::new(StubGateway::default());
    let (db, publisher) = collaborators(gateway.clone());
    let app = test::init_service(app(db, publisher)).await;

    let req = TestRequest::post()
        .uri("/api/campaigns")
        .set_json(spring_sale())
        .to_request();
    let created: CreatedCampaignBody = test::call_and_read_body_json(&app, req).await;

    let req = TestRequest::post()
        .uri(&format!("/api/campaigns/{}/publish", created.id))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let published: PublishedCampaignBody = test::read_body_json(resp).await;
    assert_eq!(published.remote_campaign_id, "98765");

    let req = TestRequest::get().uri("/api/campaigns").to_request();
    let campaigns: Vec<CampaignBody> = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        serde_json::to_value(&campaigns[0].status).unwrap(),
        json!("PUBLISHED")
    );
    assert_eq!(campaigns[0].remote_campaign_id.as_deref(), Some("98765"));

    // a second publish is refused without touching the platform
    let req = TestRequest::post()
        .uri(&format!("/api/campaigns/{}/publish", created.id))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error_code"], "E4001003");
    assert_eq!(gateway.budget_calls.load(Ordering::SeqCst), 1);
    assert_eq!(gateway.campaign_calls.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn publish_unknown_campaign_is_not_found() {
    let (db, publisher) = collaborators(Arc::new(StubGateway::default()));
    let app = test::init_service(app(db, publisher)).await;

    let req = TestRequest::post()
        .uri("/api/campaigns/CMP-6F9619FF8B86D011B42D00C04FC964FF/publish")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error_code"], "E4041001");
}

#[actix_web::test]
async fn publish_failure_is_generic_and_resumable() {
    let failing = Arc::new(StubGateway {
        fail_campaigns: true,
        ..StubGateway::default()
    });
    let (db, publisher) = collaborators(failing.clone());
    let service = test::init_service(app(db.clone(), publisher)).await;

    let req = TestRequest::post()
        .uri("/api/campaigns")
        .set_json(spring_sale())
        .to_request();
    let created: CreatedCampaignBody = test::call_and_read_body_json(&service, req).await;

    let req = TestRequest::post()
        .uri(&format!("/api/campaigns/{}/publish", created.id))
        .to_request();
    let resp = test::call_service(&service, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({
            "error_code": "E5001001",
            "error_message": "The ads platform could not complete the request",
        })
    );

    // retry against a healthy platform over the same store
    let healthy = Arc::new(StubGateway::default());
    let publisher = Publisher::new(
        db.clone().into_inner(),
        healthy.clone(),
        Duration::seconds(300),
    );
    let retried = test::init_service(app(db, Data::new(publisher))).await;

    let req = TestRequest::post()
        .uri(&format!("/api/campaigns/{}/publish", created.id))
        .to_request();
    let published: PublishedCampaignBody = test::call_and_read_body_json(&retried, req).await;

    assert_eq!(published.remote_campaign_id, "98765");
    assert_eq!(failing.budget_calls.load(Ordering::SeqCst), 1);
    assert_eq!(healthy.budget_calls.load(Ordering::SeqCst), 0);
    assert_eq!(healthy.campaign_calls.load(Ordering::SeqCst), 1);
}

#[actix_web::test]
async fn unknown_path_uses_error_format() {
    let (db, publisher) = collaborators(Arc::new(StubGateway::default()));
    let app = test::init_service(app(db, publisher)).await;

    let req = TestRequest::get().uri("/api/budgets").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error_code"], "E4041000");
}

#[actix_web::test]
async fn health_check() {
    let (db, publisher) = collaborators(Arc::new(StubGateway::default()));
    let app = test::init_service(app(db, publisher)).await;

    let req = TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["message"], "Campaigns service running");
}
