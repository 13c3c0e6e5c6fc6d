use crate::models::{
    FieldMapping, Image, Rating, RequestConfig, Source, SourceCode, SourceDefaults, SourceMapping, SourceRegistration,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::create_source,
        crate::routes::get_source,
        crate::routes::get_images,
    ),
    components(schemas(
        Source, SourceCode, SourceRegistration, RequestConfig, SourceMapping, FieldMapping,
        SourceDefaults, Image, Rating
    )),
    tags(
        (name = "sources", description = "Source registration"),
        (name = "images", description = "Canonical image fetch"),
    )
)]
pub struct ApiDoc;
