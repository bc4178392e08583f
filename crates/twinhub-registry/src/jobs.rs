use serde::{Deserialize, Serialize};

use tracing::info;

use twinhub::serializer::PayloadSerializer;

use crate::client::RegistryClient;
use crate::error::Result;
use crate::request::check_id;
use crate::transport::{HttpTransport, RestKind};

const JOBS_ROUTE: &str = "jobs";

/// Kind of an import/export job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobType {
    /// Unknown kind.
    #[default]
    Unknown,
    /// Exports the registry into a blob container.
    Export,
    /// Imports the registry from a blob container.
    Import,
}

/// Status of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobStatus {
    /// Unknown status.
    #[default]
    Unknown,
    /// Enqueued.
    Enqueued,
    /// Running.
    Running,
    /// Completed.
    Completed,
    /// Failed.
    Failed,
    /// Cancelled.
    Cancelled,
    /// Scheduled.
    Scheduled,
    /// Queued.
    Queued,
}

impl JobStatus {
    /// Checks whether the job has finished, whatever its outcome.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// How the service authenticates against the blob storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageAuthenticationType {
    /// Keys embedded in the container URIs.
    KeyBased,
    /// The service identity.
    IdentityBased,
}

/// An import/export job.
///
/// The service executes the job, the client only submits and polls it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProperties {
    /// Job identifier, assigned by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    /// Job kind.
    #[serde(rename = "type")]
    pub kind: JobType,
    /// Job status.
    #[serde(default)]
    pub status: JobStatus,
    /// Completion percentage.
    #[serde(default)]
    pub progress: u8,
    /// Container the devices are imported from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_blob_container_uri: Option<String>,
    /// Container the devices are exported to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_blob_container_uri: Option<String>,
    /// Whether keys are omitted from an export.
    #[serde(default)]
    pub exclude_keys_in_export: bool,
    /// Storage authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_authentication_type: Option<StorageAuthenticationType>,
    /// Start time. Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time_utc: Option<String>,
    /// End time. Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time_utc: Option<String>,
    /// Failure reason. Read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl JobProperties {
    /// Creates the properties of an export job.
    #[must_use]
    pub fn export(output_blob_container_uri: impl Into<String>, exclude_keys: bool) -> Self {
        Self {
            kind: JobType::Export,
            output_blob_container_uri: Some(output_blob_container_uri.into()),
            exclude_keys_in_export: exclude_keys,
            ..Default::default()
        }
    }

    /// Creates the properties of an import job.
    #[must_use]
    pub fn import(
        input_blob_container_uri: impl Into<String>,
        output_blob_container_uri: impl Into<String>,
    ) -> Self {
        Self {
            kind: JobType::Import,
            input_blob_container_uri: Some(input_blob_container_uri.into()),
            output_blob_container_uri: Some(output_blob_container_uri.into()),
            ..Default::default()
        }
    }

    /// Sets the storage authentication.
    #[must_use]
    pub const fn storage_authentication(
        mut self,
        storage_authentication_type: StorageAuthenticationType,
    ) -> Self {
        self.storage_authentication_type = Some(storage_authentication_type);
        self
    }
}

impl<T, S> RegistryClient<T, S>
where
    T: HttpTransport,
    S: PayloadSerializer,
{
    /// Submits a job exporting the registry into a blob container.
    ///
    /// # Errors
    ///
    /// The service rejects the request.
    pub async fn export_devices(
        &self,
        output_blob_container_uri: &str,
        exclude_keys: bool,
    ) -> Result<JobProperties> {
        self.create_job(&JobProperties::export(output_blob_container_uri, exclude_keys))
            .await
    }

    /// Submits a job importing the registry from a blob container.
    ///
    /// # Errors
    ///
    /// The service rejects the request.
    pub async fn import_devices(
        &self,
        input_blob_container_uri: &str,
        output_blob_container_uri: &str,
    ) -> Result<JobProperties> {
        self.create_job(&JobProperties::import(
            input_blob_container_uri,
            output_blob_container_uri,
        ))
        .await
    }

    /// Submits a job.
    ///
    /// # Errors
    ///
    /// The service rejects the request.
    pub async fn create_job(&self, job: &JobProperties) -> Result<JobProperties> {
        let request = self.with_body(self.request(RestKind::Post, [JOBS_ROUTE, "create"]), job)?;
        let job: JobProperties = self.execute_parse(request, 200).await?;

        info!(
            "Job `{}` submitted",
            job.job_id.as_deref().unwrap_or_default()
        );
        Ok(job)
    }

    /// Retrieves a job.
    ///
    /// # Errors
    ///
    /// The identifier is empty or the service rejects the request.
    pub async fn get_job(&self, job_id: &str) -> Result<JobProperties> {
        check_id(job_id, "job")?;
        self.execute_parse(self.request(RestKind::Get, [JOBS_ROUTE, job_id]), 200)
            .await
    }

    /// Retrieves the recent jobs.
    ///
    /// # Errors
    ///
    /// The service rejects the request.
    pub async fn get_jobs(&self) -> Result<Vec<JobProperties>> {
        self.execute_parse(self.request(RestKind::Get, [JOBS_ROUTE]), 200)
            .await
    }

    /// Cancels a job.
    ///
    /// # Errors
    ///
    /// The identifier is empty or the service rejects the request.
    pub async fn cancel_job(&self, job_id: &str) -> Result<()> {
        check_id(job_id, "job")?;
        self.execute(self.request(RestKind::Delete, [JOBS_ROUTE, job_id]), 200)
            .await?;

        info!("Job `{job_id}` cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::client::RegistryClient;
    use crate::error::ErrorKind;
    use crate::transport::RestKind;
    use crate::transport::tests::FakeTransport;

    use super::{JobStatus, JobType};

    const OUTPUT: &str = "https://storage.example.net/exports?sv=1";

    #[tokio::test]
    async fn export_job() {
        let client = RegistryClient::new(FakeTransport::new().respond(
            200,
            json!({
                "jobId": "job-1",
                "type": "export",
                "status": "enqueued",
                "progress": 0,
                "outputBlobContainerUri": OUTPUT,
                "excludeKeysInExport": true,
            }),
        ));

        let job = client.export_devices(OUTPUT, true).await.unwrap();

        assert_eq!(job.job_id.as_deref(), Some("job-1"));
        assert_eq!(job.kind, JobType::Export);
        assert_eq!(job.status, JobStatus::Enqueued);

        let request = client.transport().last_request();
        assert_eq!(request.kind(), RestKind::Post);
        assert_eq!(request.path(), "/jobs/create");
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(request.body_value().unwrap()).unwrap(),
            json!({
                "type": "export",
                "status": "unknown",
                "progress": 0,
                "outputBlobContainerUri": OUTPUT,
                "excludeKeysInExport": true,
            })
        );
    }

    #[tokio::test]
    async fn poll_and_cancel() {
        let client = RegistryClient::new(
            FakeTransport::new()
                .respond(200, json!({"jobId": "job-1", "type": "import", "status": "running", "progress": 40}))
                .respond(200, json!([{"jobId": "job-1", "type": "import", "status": "completed", "progress": 100}]))
                .respond(200, json!({"jobId": "job-1", "type": "import", "status": "cancelled"})),
        );

        let job = client.get_job("job-1").await.unwrap();
        assert_eq!(job.progress, 40);
        assert!(!job.status.is_finished());

        let jobs = client.get_jobs().await.unwrap();
        assert!(jobs[0].status.is_finished());

        client.cancel_job("job-1").await.unwrap();

        let requests = client.transport().requests();
        assert_eq!(requests[0].path(), "/jobs/job-1");
        assert_eq!(requests[1].path(), "/jobs");
        assert_eq!(requests[2].kind(), RestKind::Delete);
    }

    #[tokio::test]
    async fn missing_job() {
        let client = RegistryClient::new(
            FakeTransport::new().respond(404, json!({"errorCode": 404002, "message": "No job"})),
        );

        assert_eq!(
            client.get_job("job-9").await.unwrap_err().kind(),
            ErrorKind::JobNotFound
        );
        assert_eq!(
            client.cancel_job("").await.unwrap_err().kind(),
            ErrorKind::ArgumentInvalid
        );
    }
}
