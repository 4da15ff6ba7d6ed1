//! Destination endpoint resolution.
//!
//! Every destination type maps to `/v0/destinations/<lowercased type>` on the
//! transformation service. Warehouse destinations route to their canonical short
//! name and may carry extra query parameters.

use crate::app::config::WarehouseConfig;
use url::Url;

const DESTINATIONS_PATH: &str = "/v0/destinations";

/// Warehouse destination family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Warehouse {
    Redshift,
    BigQuery,
    Snowflake,
    SnowpipeStreaming,
    Postgres,
    ClickHouse,
    MsSql,
    AzureSynapse,
    DeltaLake,
    S3Datalake,
    GcsDatalake,
    AzureDatalake,
}

impl Warehouse {
    pub fn from_destination_type(destination_type: &str) -> Option<Self> {
        let warehouse = match destination_type {
            "RS" => Self::Redshift,
            "BQ" => Self::BigQuery,
            "SNOWFLAKE" => Self::Snowflake,
            "SNOWPIPE_STREAMING" => Self::SnowpipeStreaming,
            "POSTGRES" => Self::Postgres,
            "CLICKHOUSE" => Self::ClickHouse,
            "MSSQL" => Self::MsSql,
            "AZURE_SYNAPSE" => Self::AzureSynapse,
            "DELTALAKE" => Self::DeltaLake,
            "S3_DATALAKE" => Self::S3Datalake,
            "GCS_DATALAKE" => Self::GcsDatalake,
            "AZURE_DATALAKE" => Self::AzureDatalake,
            _ => return None,
        };
        Some(warehouse)
    }

    /// Path segment served by the transformation service.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Redshift => "rs",
            Self::BigQuery => "bq",
            Self::Snowflake => "snowflake",
            Self::SnowpipeStreaming => "snowpipe_streaming",
            Self::Postgres => "postgres",
            Self::ClickHouse => "clickhouse",
            Self::MsSql => "mssql",
            Self::AzureSynapse => "azure_synapse",
            Self::DeltaLake => "deltalake",
            Self::S3Datalake => "s3_datalake",
            Self::GcsDatalake => "gcs_datalake",
            Self::AzureDatalake => "azure_datalake",
        }
    }
}

pub fn is_warehouse_destination(destination_type: &str) -> bool {
    Warehouse::from_destination_type(destination_type).is_some()
}

/// Path segment for `destination_type`.
pub fn destination_path(destination_type: &str) -> String {
    let segment = match Warehouse::from_destination_type(destination_type) {
        Some(warehouse) => warehouse.short_name().to_string(),
        None => destination_type.to_lowercase(),
    };
    format!("{DESTINATIONS_PATH}/{segment}")
}

/// Full transform URL for a destination type.
pub fn destination_transform_url(
    base_url: &str,
    destination_type: &str,
    warehouse: &WarehouseConfig,
) -> String {
    let mut url = format!(
        "{}{}",
        base_url.trim_end_matches('/'),
        destination_path(destination_type)
    );

    if !warehouse.enable_warehouse_transformations {
        return url;
    }
    if let Some(kind) = Warehouse::from_destination_type(destination_type) {
        url.push_str(&format!("?whIDResolve={}", warehouse.enable_id_resolution));
        if kind == Warehouse::ClickHouse {
            url.push_str(&format!(
                "&chEnableArraySupport={}",
                warehouse.clickhouse_enable_array_support
            ));
        }
    }
    url
}

/// `host:port` of a URL, used as the `endpoint` metric tag.
///
/// Falls back to the raw input when it cannot be parsed.
pub fn get_endpoint_from_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(url) => match (url.host_str(), url.port_or_known_default()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            _ => raw.to_string(),
        },
        Err(_) => raw.to_string(),
    }
}
