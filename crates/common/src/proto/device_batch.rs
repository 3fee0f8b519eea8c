use crate::domain::{DeviceBatch, DomainError, DomainResult, OperationRecord};

use super::{Device, DeviceDataRequest, Operation};

/// Convert domain OperationRecord to protobuf Operation
pub fn to_proto_operation(record: &OperationRecord) -> Operation {
    Operation {
        r#type: record.kind.clone(),
        has_succeeded: record.succeeded,
    }
}

/// Convert protobuf Operation to domain OperationRecord
pub fn from_proto_operation(proto: Operation) -> OperationRecord {
    OperationRecord {
        kind: proto.r#type,
        succeeded: proto.has_succeeded,
    }
}

/// Convert domain DeviceBatch to protobuf Device
pub fn to_proto_device(batch: &DeviceBatch) -> Device {
    Device {
        name: batch.device_name.clone(),
        operations: batch.operations.iter().map(to_proto_operation).collect(),
    }
}

/// Convert protobuf Device to domain DeviceBatch, preserving operation order
pub fn from_proto_device(proto: Device) -> DeviceBatch {
    DeviceBatch {
        device_name: proto.name,
        operations: proto
            .operations
            .into_iter()
            .map(from_proto_operation)
            .collect(),
    }
}

/// Wrap a DeviceBatch into a SendData request
pub fn to_device_data_request(batch: &DeviceBatch) -> DeviceDataRequest {
    DeviceDataRequest {
        device: Some(to_proto_device(batch)),
    }
}

/// Extract the DeviceBatch from a SendData request.
/// A request without a device is malformed.
pub fn from_device_data_request(request: DeviceDataRequest) -> DomainResult<DeviceBatch> {
    request
        .device
        .map(from_proto_device)
        .ok_or_else(|| DomainError::ValidationError("device: missing from request".to_string()))
}
