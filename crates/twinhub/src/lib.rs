//! `twinhub` defines the property conventions shared by devices and the
//! device registry of a cloud IoT device-management service.
//!
//! A device mirrors its state in a twin: the service writes desired
//! properties, the device writes reported properties. Properties may belong
//! to the root interface of a device or to one of its components, and
//! component properties are grouped under the component name together with
//! a reserved `"__t": "c"` marker.
//!
//! When the service changes a writable property, the device answers with an
//! acknowledgement carrying a status code, the version of the desired
//! properties which triggered it, and an optional description.
//! The receipt is acknowledged first with an in-progress code, and the
//! outcome is reported later with the same version.
//!
//! This crate provides:
//!
//! - [`PropertyPatch`](patch::PropertyPatch), the wire-level patch shape
//! - [`PropertyConvention`](convention::PropertyConvention), which reads
//!   typed values from patches and builds acknowledgement and report patches
//! - [`WritablePropertyExchange`](exchange::WritablePropertyExchange), the
//!   state machine of a single acknowledgement exchange
//! - [`PayloadSerializer`](serializer::PayloadSerializer), the pluggable
//!   serializer capability along with two `JSON` implementations
//!
//! The crate is `no_std` and only requires an allocator.

#![no_std]
#![deny(unsafe_code)]
#![deny(missing_docs)]

extern crate alloc;

/// Writable-property acknowledgements and their wire conventions.
pub mod ack;
/// The property convention engine.
pub mod convention;
/// Desired-property sets delivered to a device.
pub mod desired;
/// Error management.
pub mod error;
/// The writable-property exchange state machine.
pub mod exchange;
/// Property patches.
pub mod patch;
/// Payload serializers.
pub mod serializer;

#[cfg(test)]
pub(crate) fn serialize<T: serde::Serialize>(value: T) -> serde_json::Value {
    serde_json::to_value(value).unwrap()
}

#[cfg(test)]
pub(crate) fn deserialize<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap()
}
