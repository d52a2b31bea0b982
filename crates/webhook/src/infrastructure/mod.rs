pub mod capacity;
pub mod codec;
pub mod kube_client;
pub mod logging;
pub mod server;
