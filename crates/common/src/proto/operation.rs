//! Wire messages for `operation.v1.DeviceService`.
//!
//! Field numbers must stay in sync with `proto/operation/v1/operation.proto`.

/// A single recorded action.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Operation {
    #[prost(string, tag = "1")]
    pub r#type: ::prost::alloc::string::String,
    #[prost(bool, tag = "2")]
    pub has_succeeded: bool,
}

/// A named device and its batch of operations.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Device {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub operations: ::prost::alloc::vec::Vec<Operation>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceDataRequest {
    #[prost(message, optional, tag = "1")]
    pub device: ::core::option::Option<Device>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceDataResponse {
    #[prost(bool, tag = "1")]
    pub success: bool,
}

include!(concat!(env!("OUT_DIR"), "/operation.v1.DeviceService.rs"));
