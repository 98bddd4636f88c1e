use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

/// Rewrite rejections the router produces on its own (unknown path,
/// wrong method) into the `{"error": code}` envelope the handlers
/// speak, so clients parse exactly one error shape.
///
/// Handler-built responses with these statuses already carry the
/// envelope; rewriting them again yields the identical body.
pub async fn error_envelope(response: Response) -> Response {
    match response.status() {
        StatusCode::NOT_FOUND => {
            (StatusCode::NOT_FOUND, Json(json!({"error": "not_found"}))).into_response()
        }
        StatusCode::METHOD_NOT_ALLOWED => (
            StatusCode::METHOD_NOT_ALLOWED,
            Json(json!({"error": "method_not_allowed"})),
        )
            .into_response(),
        _ => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn router_rejections_gain_the_envelope() {
        let rewritten = error_envelope(StatusCode::NOT_FOUND.into_response()).await;
        assert_eq!(rewritten.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(rewritten).await, json!({"error": "not_found"}));

        let rewritten = error_envelope(StatusCode::METHOD_NOT_ALLOWED.into_response()).await;
        assert_eq!(rewritten.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(rewritten).await, json!({"error": "method_not_allowed"}));
    }

    #[tokio::test]
    async fn other_responses_pass_through_untouched() {
        let original = (StatusCode::OK, Json(json!({"ok": true}))).into_response();
        let passed = error_envelope(original).await;
        assert_eq!(passed.status(), StatusCode::OK);
        assert_eq!(body_json(passed).await, json!({"ok": true}));
    }
}
