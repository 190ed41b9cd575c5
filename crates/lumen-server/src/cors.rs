use http::{Method, header::HeaderName};
use lumen_config::{AnyOrList, CorsConfig};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Build a Tower CORS layer from configuration
///
/// Entries that fail to parse are skipped.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new()
        .allow_origin(match &config.origins {
            AnyOrList::Any => AllowOrigin::any(),
            AnyOrList::List(origins) => AllowOrigin::list(parsed(origins)),
        })
        .allow_methods(match &config.methods {
            AnyOrList::Any => AllowMethods::any(),
            AnyOrList::List(methods) => AllowMethods::list(parsed::<Method>(methods)),
        })
        .allow_headers(match &config.headers {
            AnyOrList::Any => AllowHeaders::any(),
            AnyOrList::List(headers) => AllowHeaders::list(parsed::<HeaderName>(headers)),
        });

    if config.credentials {
        layer = layer.allow_credentials(true);
    }

    if let Some(max_age) = config.max_age_duration() {
        layer = layer.max_age(max_age);
    }

    layer
}

fn parsed<T: std::str::FromStr>(values: &[String]) -> Vec<T> {
    values.iter().filter_map(|value| value.parse().ok()).collect()
}
