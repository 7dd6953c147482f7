//! Core traits for Carto extension points.
//!
//! - [`ConfigProvider`] abstracts front-end configuration (CLI, services)
//!   so the engine only ever sees resolved paths.
//! - [`VectorSource`] abstracts "give me the embedding for this paper",
//!   which the Navigator uses to resolve candidate identifiers.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::Result;

/// Trait for front-end configuration.
///
/// # Bounds
///
/// - `Send + Sync`: Configuration must be shareable across threads
/// - `Clone`: Configuration can be duplicated for passing to subsystems
/// - `'static`: Configuration lifetime is not borrowed
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use carto_core::traits::ConfigProvider;
/// use carto_core::Result;
///
/// #[derive(Clone)]
/// struct LabConfig {
///     root: PathBuf,
/// }
///
/// impl ConfigProvider for LabConfig {
///     fn project_name(&self) -> &str {
///         "lab"
///     }
///
///     fn base_path(&self) -> Result<PathBuf> {
///         Ok(self.root.clone())
///     }
///
///     fn data_path(&self) -> Result<PathBuf> {
///         Ok(self.root.join("index"))
///     }
/// }
///
/// let config = LabConfig { root: PathBuf::from("/srv/lab") };
/// assert_eq!(config.data_path().unwrap(), PathBuf::from("/srv/lab/index"));
/// ```
pub trait ConfigProvider: Send + Sync + Clone + 'static {
    /// The project name, used for env var prefixes and default paths.
    fn project_name(&self) -> &str;

    /// Base path for all project data.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be determined.
    fn base_path(&self) -> Result<PathBuf>;

    /// Directory holding the durable store and the index snapshot.
    ///
    /// Defaults to `<base_path>/index`.
    fn data_path(&self) -> Result<PathBuf> {
        Ok(self.base_path()?.join("index"))
    }
}

/// Resolves a paper identifier to its stored embedding.
///
/// Returns `Ok(None)` for identifiers that were never indexed; callers
/// treat that as partial data, not as a failure.
pub trait VectorSource {
    /// Look up the embedding for `external_id`.
    fn vector(&self, external_id: &str) -> Result<Option<Vec<f32>>>;
}

impl VectorSource for HashMap<String, Vec<f32>> {
    fn vector(&self, external_id: &str) -> Result<Option<Vec<f32>>> {
        Ok(self.get(external_id).cloned())
    }
}

impl<T: VectorSource + ?Sized> VectorSource for &T {
    fn vector(&self, external_id: &str) -> Result<Option<Vec<f32>>> {
        (**self).vector(external_id)
    }
}

impl<T: VectorSource + ?Sized> VectorSource for std::sync::Arc<T> {
    fn vector(&self, external_id: &str) -> Result<Option<Vec<f32>>> {
        (**self).vector(external_id)
    }
}
