use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use futures::future::BoxFuture;
use futures::FutureExt;
use semver::Version;
use tracing::{debug, instrument};

use crate::error::DeployError;

/// Parses either a plain semver (`1.2.0`) or a tag such as `v1_2_0`.
pub fn parse_version_tag(tag: &str) -> Result<Version, DeployError> {
    let trimmed = tag.trim();
    let normalized = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed)
        .replace('_', ".");

    Version::parse(&normalized).map_err(|err| {
        DeployError::invalid_input(format!(
            "malformed version tag {tag:?}: {err}"
        ))
    })
}

/// Renders a version in tag form, `1.2.0` -> `v1_2_0`.
pub fn version_tag(version: &Version) -> String {
    format!("v{}_{}_{}", version.major, version.minor, version.patch)
}

type ImplFn<A, O> =
    Box<dyn Fn(A) -> BoxFuture<'static, eyre::Result<O>> + Send + Sync>;

/// Deploy implementations of one logical operation, keyed by version.
///
/// Entries are only ever added; an existing version cannot be replaced.
pub struct VersionedImplTable<A, O> {
    operation: String,
    impls: BTreeMap<Version, ImplFn<A, O>>,
}

impl<A, O> fmt::Debug for VersionedImplTable<A, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedImplTable")
            .field("operation", &self.operation)
            .field("versions", &self.impls.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<A, O> VersionedImplTable<A, O>
where
    A: Send + 'static,
    O: Send + 'static,
{
    pub fn new(operation: impl ToString) -> Self {
        Self {
            operation: operation.to_string(),
            impls: BTreeMap::new(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn register<F, Fut>(
        mut self,
        version: &str,
        implementation: F,
    ) -> Result<Self, DeployError>
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = eyre::Result<O>> + Send + 'static,
    {
        let version = parse_version_tag(version)?;

        if self.impls.contains_key(&version) {
            return Err(DeployError::DuplicateVersion {
                operation: self.operation,
                version,
            });
        }

        self.impls.insert(
            version,
            Box::new(move |args| implementation(args).boxed()),
        );

        Ok(self)
    }

    pub fn versions(&self) -> impl Iterator<Item = &Version> {
        self.impls.keys()
    }

    pub fn supports(&self, version: &Version) -> bool {
        self.impls.contains_key(version)
    }

    /// Invokes the implementation registered for `version` with `args`.
    ///
    /// A missing version fails before anything is invoked.
    #[instrument(skip(self, args), fields(operation = %self.operation))]
    pub async fn dispatch(
        &self,
        version: &Version,
        args: A,
    ) -> eyre::Result<O> {
        let implementation = self.impls.get(version).ok_or_else(|| {
            DeployError::UnsupportedVersion {
                operation: self.operation.clone(),
                version: version.clone(),
            }
        })?;

        debug!(%version, "Dispatching");

        implementation(args).await
    }
}
