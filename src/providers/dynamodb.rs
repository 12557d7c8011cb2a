// SPDX-FileCopyrightText: 2025 Abe Kohandel <abe@kodebooth.com>
// SPDX-License-Identifier: MIT

use std::{collections::HashMap, sync::Arc};

use aws_sdk_dynamodb::{
    Client,
    error::SdkError,
    operation::{
        delete_item::DeleteItemError, put_item::PutItemError, update_item::UpdateItemError,
    },
    types::{AttributeValue, ReturnValue},
};
use bon::Builder;
use serde::{Deserialize, Serialize};
use serde_dynamo::{aws_sdk_dynamodb_1::from_item, to_attribute_value, to_item};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::DLockError,
    lease::{CONTENT_TYPE, LOCK_FILE_CONTENT, LeaseKey, LeaseMetadata, LeaseRecord, Version},
    providers::Provider,
};

/// [DynamoDB](aws_sdk_dynamodb) provider for [DLock](crate::DLock)
///
/// The container name of a [LeaseKey] is the table and the object key is the
/// value of its `lock_name` hash key. Every write stores a fresh random
/// version that subsequent conditional operations are checked against.
#[derive(Builder, Debug, Clone)]
pub struct DynamodbProvider {
    client: Arc<Client>,
}

impl DynamodbProvider {
    pub const NAME_ATTRIBUTE: &str = "lock_name";
    pub const VERSION_ATTRIBUTE: &str = "version";
    pub const METADATA_ATTRIBUTE: &str = "metadata";

    const VERSION_CONDITION: &str = "#version = :version";
}

#[derive(Serialize, Deserialize, Clone, Debug)]
struct DynamodbLeaseItem {
    #[serde(rename(serialize = "lock_name", deserialize = "lock_name"))]
    name: String,
    version: Uuid,
    content: String,
    content_type: String,
    metadata: HashMap<String, String>,
}

impl DynamodbLeaseItem {
    fn new(key: &LeaseKey, metadata: &LeaseMetadata) -> Self {
        Self {
            name: key.object_key.clone(),
            version: Uuid::new_v4(),
            content: String::from_utf8_lossy(LOCK_FILE_CONTENT).into_owned(),
            content_type: CONTENT_TYPE.to_string(),
            metadata: metadata.to_map(),
        }
    }

    fn into_record(self, key: &LeaseKey) -> LeaseRecord {
        LeaseRecord {
            key: key.clone(),
            version: Version::new(self.version.to_string()),
            metadata: self.metadata,
        }
    }
}

impl Provider for DynamodbProvider {
    async fn create_if_absent(
        &self,
        key: &LeaseKey,
        metadata: &LeaseMetadata,
    ) -> Result<LeaseRecord, DLockError> {
        let lease = DynamodbLeaseItem::new(key, metadata);
        let item = to_item(lease.clone()).map_err(DLockError::provider)?;

        self.client
            .put_item()
            .table_name(&key.container_name)
            .set_item(Some(item))
            .condition_expression(format!("attribute_not_exists({})", Self::NAME_ATTRIBUTE))
            .send()
            .await
            .map_err(|sdk_error| match &sdk_error {
                SdkError::ServiceError(e) => match e.err() {
                    PutItemError::ConditionalCheckFailedException(_) => {
                        debug!("Creating lease {} failed, it already exists", key);
                        DLockError::AlreadyAcquired
                    }
                    _ => DLockError::provider(sdk_error),
                },
                _ => DLockError::provider(sdk_error),
            })?;

        Ok(lease.into_record(key))
    }

    async fn get_conditioned(
        &self,
        key: &LeaseKey,
        expected: &Version,
    ) -> Result<Option<LeaseRecord>, DLockError> {
        Ok(self
            .get(key)
            .await?
            .filter(|record| &record.version == expected))
    }

    async fn get(&self, key: &LeaseKey) -> Result<Option<LeaseRecord>, DLockError> {
        let output = self
            .client
            .get_item()
            .table_name(&key.container_name)
            .key(
                Self::NAME_ATTRIBUTE,
                AttributeValue::S(key.object_key.clone()),
            )
            .consistent_read(true)
            .send()
            .await
            .map_err(DLockError::provider)?;

        output
            .item
            .map(|item| -> Result<LeaseRecord, DLockError> {
                let lease: DynamodbLeaseItem = from_item(item).map_err(DLockError::provider)?;
                Ok(lease.into_record(key))
            })
            .transpose()
    }

    async fn update_conditioned(
        &self,
        key: &LeaseKey,
        metadata: &LeaseMetadata,
        expected: &Version,
    ) -> Result<LeaseRecord, DLockError> {
        let new_version = Uuid::new_v4();
        let metadata: AttributeValue =
            to_attribute_value(metadata.to_map()).map_err(DLockError::provider)?;

        let output = self
            .client
            .update_item()
            .table_name(&key.container_name)
            .key(
                Self::NAME_ATTRIBUTE,
                AttributeValue::S(key.object_key.clone()),
            )
            .condition_expression(Self::VERSION_CONDITION)
            .update_expression("SET #version = :new_version, #metadata = :metadata")
            .expression_attribute_names("#version", Self::VERSION_ATTRIBUTE)
            .expression_attribute_names("#metadata", Self::METADATA_ATTRIBUTE)
            .expression_attribute_values(":version", AttributeValue::S(expected.to_string()))
            .expression_attribute_values(":new_version", AttributeValue::S(new_version.to_string()))
            .expression_attribute_values(":metadata", metadata)
            .return_values(ReturnValue::AllNew)
            .send()
            .await
            .map_err(|sdk_error| match &sdk_error {
                SdkError::ServiceError(e) => match e.err() {
                    UpdateItemError::ConditionalCheckFailedException(_) => {
                        DLockError::AlreadyReleased
                    }
                    _ => DLockError::provider(sdk_error),
                },
                _ => DLockError::provider(sdk_error),
            })?;

        let attributes = output
            .attributes
            .ok_or_else(|| DLockError::provider("update returned no attributes"))?;
        let lease: DynamodbLeaseItem = from_item(attributes).map_err(DLockError::provider)?;

        Ok(lease.into_record(key))
    }

    async fn delete_conditioned(&self, key: &LeaseKey, expected: &Version) -> Result<(), DLockError> {
        self.client
            .delete_item()
            .table_name(&key.container_name)
            .key(
                Self::NAME_ATTRIBUTE,
                AttributeValue::S(key.object_key.clone()),
            )
            .condition_expression(Self::VERSION_CONDITION)
            .expression_attribute_names("#version", Self::VERSION_ATTRIBUTE)
            .expression_attribute_values(":version", AttributeValue::S(expected.to_string()))
            .send()
            .await
            .map_err(|sdk_error| match &sdk_error {
                SdkError::ServiceError(e) => match e.err() {
                    DeleteItemError::ConditionalCheckFailedException(_) => {
                        DLockError::AlreadyReleased
                    }
                    _ => DLockError::provider(sdk_error),
                },
                _ => DLockError::provider(sdk_error),
            })?;
        Ok(())
    }
}
