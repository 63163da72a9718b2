use serde::Serialize;

pub const API_GROUP: &str = "agent.zcloud.cn";
pub const API_VERSION: &str = "v1";

/// List response envelope.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection<T> {
    #[serde(rename = "type")]
    pub type_: &'static str,
    pub resource_type: &'static str,
    pub data: Vec<T>,
}

impl<T> Collection<T> {
    pub fn new(resource_type: &'static str, data: Vec<T>) -> Self {
        Self {
            type_: "collection",
            resource_type,
            data,
        }
    }
}
