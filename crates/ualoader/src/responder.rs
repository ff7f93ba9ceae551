use crate::{
    cache::CachedResource,
    error::RangeError,
    request::{ContentInformation, LoadingRequest, LoadingResponse},
};

/// Computes the answer to `request` from a fully fetched `resource`.
///
/// Byte-range access is never advertised: the resource is held as one
/// buffer, not streamed.
pub fn respond(
    request: &LoadingRequest,
    resource: &CachedResource,
) -> Result<LoadingResponse, RangeError> {
    let total = resource.total_length();
    let content_information = request.wants_content_info().then(|| ContentInformation {
        content_type: resource.content_type().to_string(),
        content_length: total,
        byte_range_access_supported: false,
    });

    let range = request.range().resolve(total)?;
    let data = resource.body().slice(range);

    Ok(LoadingResponse {
        content_information,
        data,
    })
}

/// Responds to `request` and signals that loading finished.
pub(crate) fn complete(request: LoadingRequest, resource: &CachedResource) {
    if request.is_canceled() {
        tracing::debug!(
            "Request #{} for {} was canceled, skipping.",
            request.id(),
            resource.identifier()
        );
        return;
    }

    let result = respond(&request, resource);
    if let Err(e) = &result {
        tracing::warn!("Request #{} for {}: {e}", request.id(), resource.identifier());
    }
    request.finish(result.map_err(Into::into));
}
