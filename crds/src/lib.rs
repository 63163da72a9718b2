mod transportingress;

pub use transportingress::{
    TransportIngress, TransportIngressRule, TransportIngressService, TransportIngressSpec,
    TransportProtocol,
};
