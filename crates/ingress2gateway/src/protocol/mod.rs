//! Specializations of the plain HTTP conversion for gRPC and layer 4 backends.

pub mod grpc;
pub mod tcp_udp;

pub use grpc::{convert_to_grpc_routes, create_grpc_route, into_grpc_routes, is_grpc_backend};
pub use tcp_udp::{
    BackendDetection, DetectionSource, StreamProtocol, StreamService, StreamServices,
    create_tcp_listener, create_tcp_route, create_udp_listener, create_udp_route,
    detect_tcp_backend, detect_tcp_udp_services, detect_udp_backend, is_tcp_backend,
    is_udp_backend,
};
