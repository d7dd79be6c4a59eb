//! KVP GetFeature rewriting
//!
//! The response bodies are the rewritten requests as the echo upstream
//! renders them: `key=value` pairs joined by `;`.

use crate::common::{TestApp, get_feature_uri, identity_filter, identity_predicate};
use axum::http::StatusCode;

const PREFIX: &str = "request=GetFeature;service=WFS;version=1.1.0";

fn bbox_filter() -> String {
    format!(
        "<fes:Filter xmlns:fes=\"http://www.opengis.net/ogc\">\
         <fes:And xmlns:fes=\"http://www.opengis.net/ogc\">\
         <fes:BBOX xmlns:fes=\"http://www.opengis.net/ogc\">\
         <gml:Envelope xmlns:gml=\"http://www.opengis.net/gml\" srsName=\"EPSG:4326\">\
         <gml:lowerCorner>0 1</gml:lowerCorner><gml:upperCorner>2 3</gml:upperCorner>\
         </gml:Envelope></fes:BBOX>{}</fes:And></fes:Filter>",
        identity_predicate()
    )
}

fn feature_id_filter(ids: &[&str]) -> String {
    let predicates: String = ids
        .iter()
        .map(|id| {
            format!(
                "<fes:FeatureId xmlns:fes=\"http://www.opengis.net/ogc\" fid=\"{}\"/>",
                id
            )
        })
        .collect();

    format!(
        "<fes:Filter xmlns:fes=\"http://www.opengis.net/ogc\">\
         <fes:And xmlns:fes=\"http://www.opengis.net/ogc\">{}{}</fes:And></fes:Filter>",
        predicates,
        identity_predicate()
    )
}

// ============================================================================
// Simple GetFeature
// ============================================================================

#[tokio::test]
async fn test_single_type_name() {
    let app = TestApp::new();

    let response = app.get(&get_feature_uri(&[("typeName", "A")])).await;
    response.assert_status(StatusCode::OK);

    assert_eq!(
        response.text(),
        format!("{};typeName=A;FILTER=({})", PREFIX, identity_filter())
    );
}

#[tokio::test]
async fn test_multiple_type_names() {
    let app = TestApp::new();

    let response = app.get(&get_feature_uri(&[("typeName", "A,B")])).await;
    response.assert_status(StatusCode::OK);

    assert_eq!(
        response.text(),
        format!(
            "{};typeName=A,B;FILTER=({}),({})",
            PREFIX,
            identity_filter(),
            identity_filter()
        )
    );
}

#[tokio::test]
async fn test_survey_type_names() {
    let app = TestApp::new();
    let surveys = "cobweb:sid-78cd6e23-583a-4ba7-ac52-9c56e492d59c,\
                   cobweb:sid-f629c133-d4af-45ce-9e8b-97545abd61cc";

    let response = app.get(&get_feature_uri(&[("typeName", surveys)])).await;
    response.assert_success();

    let body = response.text();
    assert!(body.contains(&format!("typeName={}", surveys)));
    assert_eq!(body.matches("<fes:Literal>Joe</fes:Literal>").count(), 2);
}

// ============================================================================
// Filtered GetFeature
// ============================================================================

#[tokio::test]
async fn test_single_type_name_filter() {
    let app = TestApp::new();

    let response = app
        .get(&get_feature_uri(&[
            ("typeName", "A"),
            ("filter", "<Filter><F1/></Filter>"),
        ]))
        .await;
    response.assert_status(StatusCode::OK);

    assert_eq!(
        response.text(),
        format!(
            "{};typeName=A;FILTER=(<Filter><And>{}<F1/></And></Filter>)",
            PREFIX,
            identity_predicate()
        )
    );
}

#[tokio::test]
async fn test_multiple_name_filter() {
    let app = TestApp::new();

    let response = app
        .get(&get_feature_uri(&[
            ("typeName", "A,B"),
            ("filter", "(<Filter><F1/></Filter>),(<Filter><F2/></Filter>)"),
        ]))
        .await;
    response.assert_status(StatusCode::OK);

    assert_eq!(
        response.text(),
        format!(
            "{};typeName=A,B;FILTER=(<Filter><And>{}<F1/></And></Filter>),\
             (<Filter><And>{}<F2/></And></Filter>)",
            PREFIX,
            identity_predicate(),
            identity_predicate()
        )
    );
}

#[tokio::test]
async fn test_equality_filter_keeps_client_predicate() {
    let app = TestApp::new();
    let filter = "<Filter><PropertyIsEqualTo><PropertyName>cobweb:pos_acc</PropertyName>\
                  <Literal>-1.0</Literal></PropertyIsEqualTo></Filter>";

    let response = app
        .get(&get_feature_uri(&[("typeName", "A"), ("Filter", filter)]))
        .await;
    response.assert_success();

    assert_eq!(
        response.text(),
        format!(
            "{};typeName=A;FILTER=(<Filter><And>{}<PropertyIsEqualTo>\
             <PropertyName>cobweb:pos_acc</PropertyName><Literal>-1.0</Literal>\
             </PropertyIsEqualTo></And></Filter>)",
            PREFIX,
            identity_predicate()
        )
    );
}

#[tokio::test]
async fn test_filter_count_must_match_type_names() {
    let app = TestApp::new();

    let response = app
        .get(&get_feature_uri(&[
            ("typeName", "A,B"),
            ("filter", "<Filter><F1/></Filter>"),
        ]))
        .await;
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_exception("InvalidParameterValue");
}

#[tokio::test]
async fn test_malformed_filter_rejected() {
    let app = TestApp::new();

    let response = app
        .get(&get_feature_uri(&[
            ("typeName", "A"),
            ("filter", "<Filter><F1></Filter>"),
        ]))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// Bounded GetFeature
// ============================================================================

#[tokio::test]
async fn test_bbox_single_type_name() {
    let app = TestApp::new();

    let response = app
        .get(&get_feature_uri(&[("typeName", "A"), ("bbox", "0,1,2,3")]))
        .await;
    response.assert_status(StatusCode::OK);

    assert_eq!(
        response.text(),
        format!("{};typeName=A;FILTER=({})", PREFIX, bbox_filter())
    );
}

#[tokio::test]
async fn test_bbox_multiple_type_names() {
    let app = TestApp::new();

    let response = app
        .get(&get_feature_uri(&[("typeName", "A,B"), ("bbox", "0,1,2,3")]))
        .await;
    response.assert_status(StatusCode::OK);

    assert_eq!(
        response.text(),
        format!(
            "{};typeName=A,B;FILTER=({}),({})",
            PREFIX,
            bbox_filter(),
            bbox_filter()
        )
    );
}

#[tokio::test]
async fn test_invalid_bbox_rejected() {
    let app = TestApp::new();

    let response = app
        .get(&get_feature_uri(&[("typeName", "A"), ("bbox", "0,1,2")]))
        .await;
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_exception("InvalidParameterValue");
}

// ============================================================================
// FeatureId GetFeature
// ============================================================================

#[tokio::test]
async fn test_single_feature() {
    let app = TestApp::new();

    let response = app
        .get(&get_feature_uri(&[("typeName", "A"), ("featureid", "id_4711")]))
        .await;
    response.assert_status(StatusCode::OK);

    assert_eq!(
        response.text(),
        format!(
            "{};typeName=A;FILTER=({})",
            PREFIX,
            feature_id_filter(&["id_4711"])
        )
    );
}

#[tokio::test]
async fn test_multiple_features() {
    let app = TestApp::new();

    let response = app
        .get(&get_feature_uri(&[
            ("typeName", "A"),
            ("featureid", "id_4711,id_4712"),
        ]))
        .await;
    response.assert_status(StatusCode::OK);

    assert_eq!(
        response.text(),
        format!(
            "{};typeName=A;FILTER=({})",
            PREFIX,
            feature_id_filter(&["id_4711", "id_4712"])
        )
    );
}

#[tokio::test]
async fn test_featureid_and_bbox_are_exclusive() {
    let app = TestApp::new();

    let response = app
        .get(&get_feature_uri(&[
            ("typeName", "A"),
            ("featureid", "id_4711"),
            ("bbox", "0,1,2,3"),
        ]))
        .await;
    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_exception("InvalidParameterValue");
}

// ============================================================================
// Form encoded POST
// ============================================================================

#[tokio::test]
async fn test_form_encoded_post_is_rewritten_like_get() {
    let app = TestApp::new();

    let response = app
        .post_with_content_type(
            "request=GetFeature&service=WFS&version=1.1.0&typeName=A",
            "application/x-www-form-urlencoded",
        )
        .await;
    response.assert_status(StatusCode::OK);

    assert_eq!(
        response.text(),
        format!("{};typeName=A;FILTER=({})", PREFIX, identity_filter())
    );
}
