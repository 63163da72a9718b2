use crate::api::schemas::Collection;
use crate::api::State as AppState;
use crate::network::{NodeNetwork, PodNetwork, ServiceNetwork};
use crate::topology::{InnerService, OuterService};
use axum::extract::{Path, State};
use axum::Json;

pub async fn inner_services(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Json<Collection<InnerService>> {
    let data = state.index.read().inner_services(&namespace);
    Json(Collection::new("innerservice", data))
}

pub async fn outer_services(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Json<Collection<OuterService>> {
    let data = state.index.read().outer_services(&namespace);
    Json(Collection::new("outerservice", data))
}

pub async fn node_networks(State(state): State<AppState>) -> Json<Collection<NodeNetwork>> {
    let data = state.network.read().node_networks();
    Json(Collection::new("nodenetwork", data))
}

pub async fn pod_networks(State(state): State<AppState>) -> Json<Collection<PodNetwork>> {
    let data = state.network.read().pod_networks();
    Json(Collection::new("podnetwork", data))
}

pub async fn service_networks(State(state): State<AppState>) -> Json<Collection<ServiceNetwork>> {
    let data = state.network.read().service_networks();
    Json(Collection::new("servicenetwork", data))
}
