use serde::{Deserialize, Serialize};

/// Device counters of the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatistics {
    /// Number of devices.
    pub total_device_count: u64,
    /// Number of enabled devices.
    pub enabled_device_count: u64,
    /// Number of disabled devices.
    pub disabled_device_count: u64,
}

/// Connection counters of the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatistics {
    /// Number of connected devices.
    pub connected_device_count: u64,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::client::RegistryClient;
    use crate::device::DevicesClient;
    use crate::transport::tests::FakeTransport;

    use super::{RegistryStatistics, ServiceStatistics};

    #[tokio::test]
    async fn statistics() {
        let client = RegistryClient::new(
            FakeTransport::new()
                .respond(
                    200,
                    json!({
                        "totalDeviceCount": 10,
                        "enabledDeviceCount": 8,
                        "disabledDeviceCount": 2,
                    }),
                )
                .respond(200, json!({"connectedDeviceCount": 5})),
        );

        assert_eq!(
            client.get_registry_statistics().await.unwrap(),
            RegistryStatistics {
                total_device_count: 10,
                enabled_device_count: 8,
                disabled_device_count: 2,
            }
        );
        assert_eq!(
            client.get_service_statistics().await.unwrap(),
            ServiceStatistics {
                connected_device_count: 5
            }
        );

        let paths = client
            .transport()
            .requests()
            .iter()
            .map(|request| request.path())
            .collect::<Vec<_>>();
        assert_eq!(paths, ["/statistics/devices", "/statistics/service"]);
    }
}
