//! Idempotent table provisioning.
//!
//! `ensure_table` converges the live table onto the declared shape: it
//! creates the table with every secondary index when missing, and adds only
//! the missing indexes to an existing table. DynamoDB accepts a single
//! index creation per `UpdateTable` call, so missing indexes are added one
//! at a time, waiting for the table to settle in between. Index names are
//! resolved through the caller's aliases; the shape itself is fixed.

use std::collections::BTreeSet;
use std::time::Duration;

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode as DynamoBillingMode, CreateGlobalSecondaryIndexAction,
    GlobalSecondaryIndex, GlobalSecondaryIndexUpdate, IndexStatus, KeySchemaElement, KeyType,
    Projection, ProjectionType, ProvisionedThroughput, ScalarAttributeType, TableStatus,
};
use tracing::{debug, warn};

use oxauth_storage::schema::{ATTR_PK, ATTR_SK, INDEXES, IndexDef};
use oxauth_storage::{BillingMode, StorageError, StorageResult, TableOptions};

const ACTIVE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const ACTIVE_POLL_ATTEMPTS: usize = 120;

fn build_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::unavailable(format!("invalid table definition: {e}"))
}

fn key_element(attribute: &str, key_type: KeyType) -> StorageResult<KeySchemaElement> {
    KeySchemaElement::builder()
        .attribute_name(attribute)
        .key_type(key_type)
        .build()
        .map_err(build_error)
}

fn throughput(read_capacity: i64, write_capacity: i64) -> StorageResult<ProvisionedThroughput> {
    ProvisionedThroughput::builder()
        .read_capacity_units(read_capacity)
        .write_capacity_units(write_capacity)
        .build()
        .map_err(build_error)
}

/// Attribute definitions for the primary key and every index key. DynamoDB
/// only wants attributes that appear in some key schema; all of ours are
/// strings.
fn attribute_definitions() -> StorageResult<Vec<AttributeDefinition>> {
    let mut names: BTreeSet<&'static str> = BTreeSet::from([ATTR_PK, ATTR_SK]);
    for def in INDEXES {
        names.insert(def.hash_key);
        if let Some(range_key) = def.range_key {
            names.insert(range_key);
        }
    }
    names
        .into_iter()
        .map(|name| {
            AttributeDefinition::builder()
                .attribute_name(name)
                .attribute_type(ScalarAttributeType::S)
                .build()
                .map_err(build_error)
        })
        .collect()
}

fn secondary_index(
    def: &IndexDef,
    options: &TableOptions,
) -> StorageResult<GlobalSecondaryIndex> {
    let mut builder = GlobalSecondaryIndex::builder()
        .index_name(options.index_name(def.name))
        .key_schema(key_element(def.hash_key, KeyType::Hash)?)
        .projection(
            Projection::builder()
                .projection_type(ProjectionType::All)
                .build(),
        );
    if let Some(range_key) = def.range_key {
        builder = builder.key_schema(key_element(range_key, KeyType::Range)?);
    }
    if let BillingMode::Provisioned {
        read_capacity,
        write_capacity,
    } = options.billing_mode
    {
        builder = builder.provisioned_throughput(throughput(read_capacity, write_capacity)?);
    }
    builder.build().map_err(build_error)
}

fn create_index_action(
    def: &IndexDef,
    options: &TableOptions,
) -> StorageResult<CreateGlobalSecondaryIndexAction> {
    let mut builder = CreateGlobalSecondaryIndexAction::builder()
        .index_name(options.index_name(def.name))
        .key_schema(key_element(def.hash_key, KeyType::Hash)?)
        .projection(
            Projection::builder()
                .projection_type(ProjectionType::All)
                .build(),
        );
    if let Some(range_key) = def.range_key {
        builder = builder.key_schema(key_element(range_key, KeyType::Range)?);
    }
    if let BillingMode::Provisioned {
        read_capacity,
        write_capacity,
    } = options.billing_mode
    {
        builder = builder.provisioned_throughput(throughput(read_capacity, write_capacity)?);
    }
    builder.build().map_err(build_error)
}

async fn create_table(client: &Client, options: &TableOptions) -> StorageResult<()> {
    let mut builder = client
        .create_table()
        .table_name(&options.table_name)
        .set_attribute_definitions(Some(attribute_definitions()?))
        .key_schema(key_element(ATTR_PK, KeyType::Hash)?)
        .key_schema(key_element(ATTR_SK, KeyType::Range)?);
    match options.billing_mode {
        // On-demand tables must not carry provisioned throughput.
        BillingMode::OnDemand => {
            builder = builder.billing_mode(DynamoBillingMode::PayPerRequest);
        }
        BillingMode::Provisioned {
            read_capacity,
            write_capacity,
        } => {
            builder = builder
                .billing_mode(DynamoBillingMode::Provisioned)
                .provisioned_throughput(throughput(read_capacity, write_capacity)?);
        }
    }
    for def in INDEXES {
        builder = builder.global_secondary_indexes(secondary_index(def, options)?);
    }
    builder
        .send()
        .await
        .map_err(|e| StorageError::unavailable(format!("DynamoDB CreateTable failed: {e}")))?;
    debug!(table = options.table_name.as_str(), "table created");
    Ok(())
}

async fn add_missing_indexes(
    client: &Client,
    options: &TableOptions,
    existing: &BTreeSet<String>,
) -> StorageResult<()> {
    for def in INDEXES {
        let physical = options.index_name(def.name);
        if existing.contains(physical) {
            continue;
        }
        warn!(
            table = options.table_name.as_str(),
            index = physical,
            "adding missing secondary index"
        );
        let update = GlobalSecondaryIndexUpdate::builder()
            .create(create_index_action(def, options)?)
            .build();
        client
            .update_table()
            .table_name(&options.table_name)
            .set_attribute_definitions(Some(attribute_definitions()?))
            .global_secondary_index_updates(update)
            .send()
            .await
            .map_err(|e| {
                StorageError::unavailable(format!("DynamoDB UpdateTable failed: {e}"))
            })?;
        // One index creation per UpdateTable; the table must settle before
        // the next one.
        wait_until_active(client, &options.table_name).await?;
    }
    Ok(())
}

async fn wait_until_active(client: &Client, table_name: &str) -> StorageResult<()> {
    for _ in 0..ACTIVE_POLL_ATTEMPTS {
        let response = client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(|e| {
                StorageError::unavailable(format!("DynamoDB DescribeTable failed: {e}"))
            })?;
        let settled = response.table().is_some_and(|table| {
            table.table_status() == Some(&TableStatus::Active)
                && table
                    .global_secondary_indexes()
                    .iter()
                    .all(|idx| idx.index_status() == Some(&IndexStatus::Active))
        });
        if settled {
            return Ok(());
        }
        tokio::time::sleep(ACTIVE_POLL_INTERVAL).await;
    }
    Err(StorageError::unavailable(format!(
        "table `{table_name}` did not become active"
    )))
}

/// Converges the live table onto the declared shape. Safe to call on every
/// startup.
pub(crate) async fn ensure_table(client: &Client, options: &TableOptions) -> StorageResult<()> {
    let described = client
        .describe_table()
        .table_name(&options.table_name)
        .send()
        .await;
    match described {
        Ok(response) => {
            let existing: BTreeSet<String> = response
                .table()
                .map(|table| {
                    table
                        .global_secondary_indexes()
                        .iter()
                        .filter_map(|idx| idx.index_name().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            add_missing_indexes(client, options, &existing).await?;
        }
        Err(err)
            if err
                .as_service_error()
                .is_some_and(DescribeTableError::is_resource_not_found_exception) =>
        {
            create_table(client, options).await?;
        }
        Err(err) => {
            return Err(StorageError::unavailable(format!(
                "DynamoDB DescribeTable failed: {err}"
            )));
        }
    }
    wait_until_active(client, &options.table_name).await
}
