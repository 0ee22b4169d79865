/// Formula computation route.
pub(crate) mod compute;

/// Smart contract listing, detail, and event routes.
pub(crate) mod contracts;

/// OpenAPI documentation routes.
pub(crate) mod docs;
