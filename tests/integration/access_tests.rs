//! Access control: identity header and operation policy

use crate::common::{TestApp, WFS_PATH, get_feature_uri, test_config};
use axum::http::StatusCode;

#[tokio::test]
async fn test_missing_identity_rejected() {
    let app = TestApp::new();

    let response = app
        .get_as(&get_feature_uri(&[("typeName", "A")]), None)
        .await;
    response
        .assert_status(StatusCode::UNAUTHORIZED)
        .assert_exception("AccessDenied");
}

#[tokio::test]
async fn test_blank_identity_rejected() {
    let app = TestApp::new();

    let response = app
        .get_as(&get_feature_uri(&[("typeName", "A")]), Some("   "))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_identity_is_taken_from_header() {
    let app = TestApp::new();

    let response = app
        .get_as(
            &get_feature_uri(&[("typeName", "A")]),
            Some("040522c4-e3d6-0ec7-0124-dc64602b9346"),
        )
        .await;
    response.assert_success();
    assert!(response.text().contains(
        "<fes:Literal>040522c4-e3d6-0ec7-0124-dc64602b9346</fes:Literal>"
    ));
    assert!(!response.text().contains("<fes:Literal>Joe</fes:Literal>"));
}

#[tokio::test]
async fn test_identity_header_is_configurable() {
    let mut config = test_config();
    config.identity_header = "X-Remote-User".to_string();
    let app = TestApp::with_config(config);

    let response = app
        .get_as(&get_feature_uri(&[("typeName", "A")]), Some("Ann"))
        .await;
    response.assert_success();
    assert!(response.text().contains("<fes:Literal>Ann</fes:Literal>"));
}

#[tokio::test]
async fn test_health_needs_no_identity() {
    let app = TestApp::new();

    let response = app.get_as("/health", None).await;
    response.assert_status(StatusCode::OK);
    assert!(response.text().contains("\"status\":\"ok\""));
}

#[tokio::test]
async fn test_get_capabilities_passed_through() {
    let app = TestApp::new();

    let response = app
        .get(&format!("{}?service=WFS&request=GetCapabilities", WFS_PATH))
        .await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.text(), "service=WFS;request=GetCapabilities");
}

#[tokio::test]
async fn test_describe_feature_type_passed_through() {
    let app = TestApp::new();

    let response = app
        .get(&format!(
            "{}?service=WFS&request=DescribeFeatureType&typeName=A",
            WFS_PATH
        ))
        .await;
    response.assert_status(StatusCode::OK);
    assert_eq!(
        response.text(),
        "service=WFS;request=DescribeFeatureType;typeName=A"
    );
}

#[tokio::test]
async fn test_transaction_denied() {
    let app = TestApp::new();

    let response = app
        .post_xml(concat!(
            "<wfs:Transaction service=\"WFS\" version=\"1.1.0\" ",
            "xmlns:wfs=\"http://www.opengis.net/wfs\">",
            "<wfs:Delete typeName=\"A\"/></wfs:Transaction>"
        ))
        .await;
    response
        .assert_status(StatusCode::FORBIDDEN)
        .assert_exception("AccessDenied");
}

#[tokio::test]
async fn test_lock_feature_denied() {
    let app = TestApp::new();

    let response = app
        .get(&format!("{}?service=WFS&request=LockFeature&typeName=A", WFS_PATH))
        .await;
    response
        .assert_status(StatusCode::FORBIDDEN)
        .assert_exception("AccessDenied");
}

#[tokio::test]
async fn test_stored_query_denied() {
    let app = TestApp::new();

    let response = app
        .post_xml(concat!(
            "<wfs:GetFeature service=\"WFS\" version=\"2.0.0\" ",
            "xmlns:wfs=\"http://www.opengis.net/wfs/2.0\">",
            "<wfs:StoredQuery id=\"urn:ogc:def:query:OGC-WFS::GetFeatureById\"/>",
            "</wfs:GetFeature>"
        ))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_kvp_stored_query_denied() {
    let app = TestApp::new();

    let response = app
        .get(&format!(
            "{}?service=WFS&version=2.0.0&request=GetFeature&typeNames=A\
             &STOREDQUERY_ID=urn:ogc:def:query:OGC-WFS::GetFeatureById&ID=x",
            WFS_PATH
        ))
        .await;
    response
        .assert_status(StatusCode::FORBIDDEN)
        .assert_exception("AccessDenied");
}

#[tokio::test]
async fn test_kvp_resource_id_rejected() {
    let app = TestApp::new();

    let response = app
        .get(&format!(
            "{}?service=WFS&version=2.0.0&request=GetFeature&typeNames=A&RESOURCEID=A.1",
            WFS_PATH
        ))
        .await;
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_exception("InvalidParameterValue");
    assert!(!response.text().contains("RESOURCEID=A.1"));
}

#[tokio::test]
async fn test_repeated_request_parameter_rejected() {
    let app = TestApp::new();

    let response = app
        .get(&format!(
            "{}?request=GetCapabilities&request=GetFeature&typeName=A",
            WFS_PATH
        ))
        .await;
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_exception("InvalidParameterValue");
}

#[tokio::test]
async fn test_type_name_and_type_names_together_rejected() {
    let app = TestApp::new();

    let response = app
        .get(&get_feature_uri(&[("typeName", "A"), ("typeNames", "A,B")]))
        .await;
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_exception("InvalidParameterValue");
}

#[tokio::test]
async fn test_repeated_filter_parameters_rejected() {
    let app = TestApp::new();

    for params in [
        [("typeName", "A"), ("typeName", "B")],
        [("filter", "<Filter><F1/></Filter>"), ("FILTER", "<Filter><F2/></Filter>")],
        [("bbox", "0,1,2,3"), ("BBOX", "0,1,4,5")],
        [("featureid", "id_4711"), ("featureId", "id_4712")],
    ] {
        let mut params = params.to_vec();
        if params[0].0 != "typeName" {
            params.insert(0, ("typeName", "A"));
        }

        let response = app.get(&get_feature_uri(&params)).await;
        response
            .assert_status(StatusCode::BAD_REQUEST)
            .assert_exception("InvalidParameterValue");
    }
}

#[tokio::test]
async fn test_non_utf8_body_gets_exception_report() {
    let app = TestApp::new();

    let mut body = b"<wfs:GetFeature xmlns:wfs=\"http://www.opengis.net/wfs\">".to_vec();
    body.extend_from_slice(&[0xff, 0xfe]);
    body.extend_from_slice(b"</wfs:GetFeature>");

    let response = app.post_bytes(body, "text/xml").await;
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_exception("InvalidParameterValue");
}

#[tokio::test]
async fn test_missing_request_parameter() {
    let app = TestApp::new();

    let response = app.get(&format!("{}?service=WFS&typeName=A", WFS_PATH)).await;
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_exception("MissingParameterValue");
}

#[tokio::test]
async fn test_unknown_operation() {
    let app = TestApp::new();

    let response = app
        .get(&format!("{}?service=WFS&request=Frobnicate", WFS_PATH))
        .await;
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_exception("OperationNotSupported");
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let mut config = test_config();
    config.max_body_bytes = 64;
    let app = TestApp::with_config(config);

    let body = format!(
        "<wfs:GetFeature xmlns:wfs=\"http://www.opengis.net/wfs\">{}</wfs:GetFeature>",
        "<wfs:Query typeName=\"A\"/>".repeat(10)
    );
    let response = app.post_xml(&body).await;
    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
}
