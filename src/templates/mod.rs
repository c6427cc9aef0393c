//! Embedded templates for sandpipe files.

/// Default `sandpipe.toml` configuration.
pub(crate) const SANDPIPE_TOML: &str = include_str!("sandpipe.toml");
