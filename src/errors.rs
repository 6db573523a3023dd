use std::path::PathBuf;
use thiserror::Error;

use crate::scalar::LeafType;

/// Errors raised by tree addressing, mutation and batch operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("unsupported constructor argument: {0}")]
    UnsupportedConstructorInput(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: isize, len: usize },

    #[error("key {key} is neither an index into the sequence nor a key of its items: {reason}")]
    InvalidBroadcastKey { key: String, reason: String },

    #[error("key {key} cannot address a {variant} node")]
    InvalidKey { key: String, variant: &'static str },

    #[error("cannot index into a {variant} node with key {key}")]
    NotAContainer { key: String, variant: &'static str },

    #[error("trying to add an item of type {found} to a tree of type {expected}")]
    TypeConstraintViolation { expected: LeafType, found: LeafType },

    #[error("shape mismatch at '{path}': {reason}")]
    ShapeMismatch { path: String, reason: String },

    #[error("not a leaf according to the leaf rule but also not a nested tree at '{path}'")]
    LeafRuleMismatch { path: String },

    #[error("a {variant} leaf cannot be sliced")]
    NotSliceable { variant: &'static str },

    #[error("no match for key {0} in tree")]
    SearchExhausted(String),

    #[error("key already exists: {0}")]
    DuplicateKey(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("operation failed at '{path}': {message}")]
    Operation { path: String, message: String },
}

pub type TreeResult<T> = Result<T, TreeError>;

/// Errors raised at the loader and configuration boundary.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("{0}")]
    Tree(#[from] TreeError),

    #[error("can only load from json or yaml: {0}")]
    UnsupportedFileExtension(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("config error: {message}")]
    Config { message: String },
}

pub type LoadResult<T> = Result<T, LoadError>;
