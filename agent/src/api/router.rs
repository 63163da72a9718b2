use crate::api::schemas::{API_GROUP, API_VERSION};
use crate::api::{handlers, State};
use axum::routing::get;
use axum::Router;

pub fn new(state: State) -> Router {
    let base = format!("/apis/{}/{}", API_GROUP, API_VERSION);
    Router::new()
        .route(
            &format!("{}/namespaces/{{namespace}}/innerservices", base),
            get(handlers::inner_services),
        )
        .route(
            &format!("{}/namespaces/{{namespace}}/outerservices", base),
            get(handlers::outer_services),
        )
        .route(&format!("{}/nodenetworks", base), get(handlers::node_networks))
        .route(&format!("{}/podnetworks", base), get(handlers::pod_networks))
        .route(
            &format!("{}/servicenetworks", base),
            get(handlers::service_networks),
        )
        .with_state(state)
}
