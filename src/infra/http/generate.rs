use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use cookiepress_api_types::{
    ARCHIVE_CONTENT_TYPE, BASE64_ENCODING, CONTENT_TRANSFER_ENCODING, attachment_disposition,
};

use super::HttpState;
use crate::{
    application::generate::GenerateError, config::ResponseTransport,
    domain::request::parse_generate_request,
};

/// `POST /api/generate`: validate the body, run the pipeline, return the archive.
pub(super) async fn generate(
    State(state): State<HttpState>,
    body: Bytes,
) -> Result<Response, GenerateError> {
    let request = parse_generate_request(&body)?;
    let archive = state.generate.generate(request).await?;
    Ok(archive_response(archive.bytes, state.transport))
}

pub(crate) fn archive_response(archive: Bytes, transport: ResponseTransport) -> Response {
    let body = match transport {
        ResponseTransport::Binary => archive,
        ResponseTransport::Base64 => Bytes::from(STANDARD.encode(&archive)),
    };
    let len = body.len();

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(ARCHIVE_CONTENT_TYPE),
    );
    if let Ok(value) = HeaderValue::from_str(&len.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }
    if let Ok(value) = HeaderValue::from_str(&attachment_disposition()) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if transport == ResponseTransport::Base64 {
        headers.insert(
            CONTENT_TRANSFER_ENCODING,
            HeaderValue::from_static(BASE64_ENCODING),
        );
    }

    response
}
