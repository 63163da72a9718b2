use kube::Resource;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

pub mod cache;
pub mod event;
pub mod ingress;
pub mod pod;
pub mod resync;
pub mod watcher;

pub trait Object:
    Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static
{
}

impl<T> Object for T where
    T: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug + Send + Sync + 'static
{
}
