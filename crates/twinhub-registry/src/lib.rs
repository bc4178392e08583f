//! `twinhub-registry` is a client for the device registry of a cloud IoT
//! device-management service.
//!
//! It manages devices, modules and automatic configurations, submits bulk
//! requests and import/export jobs, and reads the registry statistics.
//!
//! Operations are grouped in the [`DevicesClient`](device::DevicesClient),
//! [`ModulesClient`](module::ModulesClient) and
//! [`ConfigurationsClient`](configuration::ConfigurationsClient) traits,
//! all implemented by [`RegistryClient`](client::RegistryClient). The client
//! sends requests through an [`HttpTransport`](transport::HttpTransport),
//! so applications can substitute a fake of their own in tests.
//!
//! Every failure is reported as a single [`Error`](error::Error) carrying
//! a kind, a service error code, a message, a tracking identifier and
//! whether the operation can be retried as is. Service failures are
//! classified by the [`classifier`] from the response status, body and
//! headers.
//!
//! Any operation can be cancelled with
//! [`cancellable`](request::cancellable).

#![deny(unsafe_code)]
#![deny(missing_docs)]

/// Shared access signatures and other credentials.
pub mod auth;
/// Bulk registry operations.
pub mod bulk;
/// Service failure classification.
pub mod classifier;
/// The registry client.
pub mod client;
/// Client configuration.
pub mod config;
/// Automatic configurations.
pub mod configuration;
/// Device identities.
pub mod device;
/// Error management.
pub mod error;
/// Service error codes.
pub mod error_code;
/// Import/export jobs.
pub mod jobs;
/// Module identities.
pub mod module;
/// Request helpers and cancellation.
pub mod request;
/// Registry statistics.
pub mod statistics;
/// Transport seam.
pub mod transport;
