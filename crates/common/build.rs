//! Generates the `operation.v1.DeviceService` tonic server and client.
//!
//! Messages are declared by hand with `prost` derives in `src/proto/operation.rs`
//! (mirroring `proto/operation/v1/operation.proto`), so no `protoc` is needed at build time.

fn main() {
    let send_data = tonic_build::manual::Method::builder()
        .name("send_data")
        .route_name("SendData")
        .input_type("crate::proto::DeviceDataRequest")
        .output_type("crate::proto::DeviceDataResponse")
        .codec_path("tonic::codec::ProstCodec")
        .build();

    let device_service = tonic_build::manual::Service::builder()
        .name("DeviceService")
        .package("operation.v1")
        .method(send_data)
        .build();

    tonic_build::manual::Builder::new().compile(&[device_service]);
}
