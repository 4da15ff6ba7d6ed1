pub mod balanced;
pub mod client;
pub mod endpoint;
pub mod metrics;
pub mod pooled;
pub mod recycled;
pub mod serialization;
pub mod transmission;
pub mod version;

pub use balanced::BalancedTransport;
pub use client::{
    ClientError, HttpTransport, TransportRequest, TransportResponse, build_transport,
};
pub use endpoint::{destination_transform_url, get_endpoint_from_url, is_warehouse_destination};
pub use metrics::TransformerMetricLabels;
pub use pooled::PooledTransport;
pub use recycled::RecycledTransport;
pub use serialization::{BatchSerializer, SerializationError, SerializationFormat};
pub use transmission::{BatchTransmitter, CallContext};
pub use version::{API_VERSION_HEADER, SUPPORTED_TRANSFORMER_API_VERSION, check_api_version};
