// SPDX-License-Identifier: Apache-2.0

//! Errors for config-file bootstrap (spec.md section 6.4).

/// Errors that can occur loading or applying a startup config file.
#[derive(thiserror::Error, Debug)]
pub enum BootstrapError {
    /// The file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file's contents were not valid YAML, or did not match the
    /// top-level `resources:` map shape.
    #[error("failed to parse {path} as YAML: {source}")]
    Parse {
        /// Path whose contents failed to parse.
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// A `resources:` key was not of the form `/<module-path>/<id>`.
    #[error("resource key \"{key}\" is not of the form /<module-path>/<id>")]
    InvalidKey {
        /// The offending key.
        key: String,
    },

    /// POSTing a resource to its REST endpoint failed.
    #[error("failed to create resource {key}: {source}")]
    Create {
        /// The resource key that failed to apply.
        key: String,
        #[source]
        source: openperf_rest_client::ClientError,
    },
}
