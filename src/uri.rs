//! Registered schema URIs
//!
//! Synapse names a registered schema `{organization}-{name}` with an optional
//! `-{semver}` release suffix. The same string is the last path segment of the
//! schema's `$id`.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DictionaryError, Result};

/// `org-name` or `org-name-1.2.3`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaUri {
    pub organization: String,
    pub name: String,
    pub version: Option<Version>,
}

impl SchemaUri {
    /// URI for a generated class schema. Names are lowercased.
    pub fn for_class(organization: &str, class: &str, version: Option<Version>) -> Self {
        Self {
            organization: organization.to_string(),
            name: class.to_lowercase(),
            version,
        }
    }

    /// Parse `org-name`, `org-name-1.2.3` or a full registered URL.
    ///
    /// The organization ends at the first `-`. A trailing `-x.y.z` that is a
    /// valid semantic version becomes the version.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim().trim_end_matches('/');
        let segment = trimmed.rsplit('/').next().unwrap_or(trimmed);

        let (organization, rest) = segment
            .split_once('-')
            .filter(|(org, rest)| !org.is_empty() && !rest.is_empty())
            .ok_or_else(|| DictionaryError::InvalidSchemaUri(input.to_string()))?;

        let (name, version) = match rest.rsplit_once('-') {
            Some((name, tail)) if !name.is_empty() => match Version::parse(tail) {
                Ok(version) => (name, Some(version)),
                Err(_) => (rest, None),
            },
            _ => (rest, None),
        };

        Ok(Self {
            organization: organization.to_string(),
            name: name.to_string(),
            version,
        })
    }

    /// The same schema without a release version (latest)
    pub fn unversioned(&self) -> Self {
        Self {
            version: None,
            ..self.clone()
        }
    }

    /// Full `$id` under a registry base URL
    pub fn to_id(&self, base: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), self)
    }

    /// REST path of the registered schema
    pub fn registered_path(&self) -> String {
        format!("/schema/type/registered/{}", self)
    }
}

impl fmt::Display for SchemaUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.organization, self.name)?;
        if let Some(version) = &self.version {
            write!(f, "-{}", version)?;
        }
        Ok(())
    }
}

impl FromStr for SchemaUri {
    type Err = DictionaryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
