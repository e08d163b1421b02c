//! `RdsApi` backed by the real AWS SDK client.

use async_trait::async_trait;
use aws_sdk_rds::Client;
use aws_sdk_rds::error::DisplayErrorContext;
use aws_sdk_rds::types::Tag;
use tracing::debug;

use super::{DbEngine, InstanceDescriptor, RdsApi};
use crate::errors::{BackupError, Result};

/// Tag key used for cost attribution on every resource this tool creates.
const BILLING_TAG_KEY: &str = "billing";

pub struct AwsRds {
    client: Client,
}

impl AwsRds {
    /// Builds a client from the ambient AWS configuration (environment,
    /// shared config files, instance profile).
    pub async fn connect() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            client: Client::new(&config),
        }
    }
}

fn billing_tag(value: &str) -> Tag {
    Tag::builder().key(BILLING_TAG_KEY).value(value).build()
}

fn api_error(err: impl std::error::Error) -> BackupError {
    BackupError::Api(DisplayErrorContext(err).to_string())
}

#[async_trait]
impl RdsApi for AwsRds {
    async fn list_automated_snapshots(&self, instance: &str) -> Result<Vec<String>> {
        let output = self
            .client
            .describe_db_snapshots()
            .db_instance_identifier(instance)
            .snapshot_type("automated")
            .send()
            .await
            .map_err(api_error)?;
        Ok(output
            .db_snapshots()
            .iter()
            .filter_map(|s| s.db_snapshot_identifier().map(str::to_string))
            .collect())
    }

    async fn create_snapshot(
        &self,
        instance: &str,
        snapshot: &str,
        billing_tag_value: &str,
    ) -> Result<()> {
        debug!("requesting snapshot {} of instance {}", snapshot, instance);
        self.client
            .create_db_snapshot()
            .db_instance_identifier(instance)
            .db_snapshot_identifier(snapshot)
            .tags(billing_tag(billing_tag_value))
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn snapshot_status(&self, snapshot: &str) -> Result<String> {
        let output = self
            .client
            .describe_db_snapshots()
            .db_snapshot_identifier(snapshot)
            .send()
            .await
            .map_err(api_error)?;
        let status = output
            .db_snapshots()
            .first()
            .and_then(|s| s.status())
            .ok_or_else(|| BackupError::Api(format!("snapshot {snapshot} has no status")))?;
        Ok(status.to_string())
    }

    async fn restore_instance_from_snapshot(
        &self,
        snapshot: &str,
        instance: &str,
        billing_tag_value: &str,
    ) -> Result<()> {
        debug!("restoring snapshot {} into instance {}", snapshot, instance);
        let result = self
            .client
            .restore_db_instance_from_db_snapshot()
            .db_instance_identifier(instance)
            .db_snapshot_identifier(snapshot)
            .copy_tags_to_snapshot(true)
            .tags(billing_tag(billing_tag_value))
            .send()
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_db_instance_already_exists_fault() {
                    Err(BackupError::InstanceNameCollision {
                        instance: instance.to_string(),
                    })
                } else {
                    Err(api_error(service_err))
                }
            }
        }
    }

    async fn instance_status(&self, instance: &str) -> Result<String> {
        let output = self
            .client
            .describe_db_instances()
            .db_instance_identifier(instance)
            .send()
            .await
            .map_err(api_error)?;
        let status = output
            .db_instances()
            .first()
            .and_then(|i| i.db_instance_status())
            .ok_or_else(|| BackupError::Api(format!("instance {instance} has no status")))?;
        Ok(status.to_string())
    }

    async fn describe_instance(&self, instance: &str) -> Result<InstanceDescriptor> {
        let output = self
            .client
            .describe_db_instances()
            .db_instance_identifier(instance)
            .send()
            .await
            .map_err(api_error)?;
        let db = output
            .db_instances()
            .first()
            .ok_or_else(|| BackupError::Api(format!("instance {instance} not found")))?;

        let engine_name = db
            .engine()
            .ok_or_else(|| BackupError::Api(format!("instance {instance} reports no engine")))?;
        let engine = DbEngine::from_engine_name(engine_name)
            .ok_or_else(|| BackupError::UnsupportedEngine(engine_name.to_string()))?;

        let endpoint = db
            .endpoint()
            .ok_or_else(|| BackupError::Api(format!("instance {instance} has no endpoint")))?;
        let host = endpoint
            .address()
            .ok_or_else(|| BackupError::Api(format!("instance {instance} has no address")))?
            .to_string();
        let port = endpoint
            .port()
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| BackupError::Api(format!("instance {instance} has no valid port")))?;
        let master_username = db
            .master_username()
            .ok_or_else(|| BackupError::Api(format!("instance {instance} has no master user")))?
            .to_string();

        Ok(InstanceDescriptor {
            engine,
            host,
            port,
            master_username,
        })
    }

    async fn set_security_groups(&self, instance: &str, groups: &[String]) -> Result<()> {
        let mut request = self
            .client
            .modify_db_instance()
            .db_instance_identifier(instance)
            .apply_immediately(true);
        for group in groups {
            request = request.vpc_security_group_ids(group);
        }
        request.send().await.map_err(api_error)?;
        Ok(())
    }

    async fn delete_instance(&self, instance: &str) -> Result<()> {
        debug!("deleting instance {}", instance);
        self.client
            .delete_db_instance()
            .db_instance_identifier(instance)
            .skip_final_snapshot(true)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn delete_snapshot(&self, snapshot: &str) -> Result<()> {
        debug!("deleting snapshot {}", snapshot);
        self.client
            .delete_db_snapshot()
            .db_snapshot_identifier(snapshot)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }
}
