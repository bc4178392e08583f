//! `twinhub-device` implements the device side of a cloud IoT
//! device-management service: writable-property synchronization, command
//! dispatch and telemetry.
//!
//! The service changes the writable properties of a device by sending a
//! desired-property set. A [`PropertyDispatcher`](properties::PropertyDispatcher)
//! routes each desired value to the handler registered for it, acknowledges
//! the receipt right away, and reports the outcome of the handler with the
//! same version once it completes. Values which cannot be converted into
//! the handler type are rejected, so no property is ever left without an
//! answer.
//!
//! Reported properties leave the device through a
//! [`PropertyReporter`](reporter::PropertyReporter), implemented by the
//! transport of the application.
//!
//! Commands are answered by a [`CommandDispatcher`](commands::CommandDispatcher)
//! and telemetry is wrapped into a [`TelemetryMessage`](telemetry::TelemetryMessage)
//! carrying its content type and, when sent by a component, the component
//! name.
//!
//! This crate does not connect to the service.

#![deny(unsafe_code)]
#![deny(missing_docs)]

/// Command dispatch.
pub mod commands;
/// Error management.
pub mod error;
/// Writable-property dispatch.
pub mod properties;
/// Reported-property delivery.
pub mod reporter;
/// Telemetry messages.
pub mod telemetry;
