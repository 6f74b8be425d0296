use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScopeError;
use crate::store::is_valid_segment;

/// Top-level collection group a tenant's data lives under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Partition {
    #[serde(rename = "trial")]
    Trial,
    #[serde(rename = "prod", alias = "production")]
    Production,
}

impl Partition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Trial => "trial",
            Partition::Production => "prod",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Partition {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(Partition::Trial),
            "prod" | "production" => Ok(Partition::Production),
            other => Err(ScopeError(format!(
                "unknown partition `{other}` (expected `trial` or `prod`)"
            ))),
        }
    }
}

/// A validated (partition, tenant) pair. Every collection a tenant owns lives
/// under `<partition>/<tenant>/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantScope {
    partition: Partition,
    tenant: String,
}

impl TenantScope {
    pub fn new(partition: Partition, tenant: impl Into<String>) -> Result<Self, ScopeError> {
        let tenant = tenant.into();
        if tenant.is_empty() {
            return Err(ScopeError("tenant id must not be empty".to_string()));
        }
        if !is_valid_segment(&tenant) {
            return Err(ScopeError(format!(
                "tenant id `{tenant}` may only contain letters, digits, '.', '-' and '_'"
            )));
        }
        Ok(Self { partition, tenant })
    }

    /// Parse a tenant id together with a partition selector such as `"prod"`.
    pub fn parse(tenant: &str, partition: &str) -> Result<Self, ScopeError> {
        Self::new(partition.parse()?, tenant)
    }

    pub fn partition(&self) -> Partition {
        self.partition
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn collection(&self, name: &str) -> String {
        format!("{}/{}/{}", self.partition, self.tenant, name)
    }
}

impl fmt::Display for TenantScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.partition, self.tenant)
    }
}
