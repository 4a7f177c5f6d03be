//! Translation of rejections into JSON error responses
//!
//! Only `EcoshareError::public_message` text reaches the client.

use log::{debug, error};
use serde::Serialize;
use std::convert::Infallible;
use warp::http::header::{HeaderValue, WWW_AUTHENTICATE};
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::error::EcoshareError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(e) = err.find::<EcoshareError>() {
        let status = e.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", e);
        } else {
            debug!("Request rejected: {}", e);
        }
        (status, e.public_message())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if err
        .find::<warp::filters::body::BodyDeserializeError>()
        .is_some()
    {
        (StatusCode::BAD_REQUEST, "invalid request body".to_string())
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "invalid query string".to_string())
    } else if err.find::<warp::reject::LengthRequired>().is_some() {
        (StatusCode::LENGTH_REQUIRED, "content length required".to_string())
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "request body too large".to_string())
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "expected application/json".to_string(),
        )
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed".to_string())
    } else {
        error!("Unhandled rejection: {:?}", err);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error".to_string(),
        )
    };

    let json = warp::reply::json(&ErrorBody { error: message });
    let mut response = warp::reply::with_status(json, status).into_response();
    if status == StatusCode::UNAUTHORIZED {
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(rejection: Rejection) -> warp::reply::Response {
        match handle_rejection(rejection).await {
            Ok(reply) => reply.into_response(),
            Err(never) => match never {},
        }
    }

    #[tokio::test]
    async fn test_token_errors_are_opaque_401() {
        let response = render(warp::reject::custom(EcoshareError::InvalidSignature)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[WWW_AUTHENTICATE], "Bearer");
    }

    #[tokio::test]
    async fn test_internal_detail_is_hidden() {
        let response = render(warp::reject::custom(EcoshareError::StorageError(
            "connection refused to 10.0.0.3".to_string(),
        )))
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = warp::hyper::body::to_bytes(response.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("10.0.0.3"));
        assert!(text.contains("internal server error"));
    }

    #[tokio::test]
    async fn test_not_found() {
        let response = render(warp::reject::not_found()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
