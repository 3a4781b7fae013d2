// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 SpiralTorch Contributors
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::string::FromUtf8Error;

use thiserror::Error;

use crate::tag::Tag;

pub type Result<T> = std::result::Result<T, IValueError>;

/// Failures raised while moving values across the native boundary.
#[derive(Debug, Error)]
pub enum IValueError {
    #[error("unsupported {tag} shape: {reason}")]
    UnsupportedShape { tag: Tag, reason: String },
    #[error("native call `{call}` failed: {message}")]
    BoundaryFailure { call: &'static str, message: String },
    #[error("unknown ivalue tag {0}")]
    UnknownTag(i32),
    #[error("malformed {tag}: {reason}")]
    MalformedCollection { tag: Tag, reason: String },
    #[error("{tag} element {index}: {source}")]
    Element {
        tag: Tag,
        index: usize,
        #[source]
        source: Box<IValueError>,
    },
    #[error("argument {index} of operator `{operator}`: {source}")]
    Argument {
        operator: String,
        index: usize,
        #[source]
        source: Box<IValueError>,
    },
    #[error("nesting depth {depth} exceeds the limit of {max_depth}")]
    DepthExceeded { depth: usize, max_depth: usize },
    #[error("string payload is not valid utf-8: {0}")]
    InvalidString(#[from] FromUtf8Error),
}

impl IValueError {
    pub(crate) fn unsupported(tag: Tag, reason: impl Into<String>) -> Self {
        IValueError::UnsupportedShape {
            tag,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(tag: Tag, reason: impl Into<String>) -> Self {
        IValueError::MalformedCollection {
            tag,
            reason: reason.into(),
        }
    }

    /// Attaches the position of the failing element inside a collection.
    pub(crate) fn at(self, tag: Tag, index: usize) -> Self {
        IValueError::Element {
            tag,
            index,
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping position wrappers.
    pub fn root_cause(&self) -> &IValueError {
        let mut current = self;
        loop {
            match current {
                IValueError::Element { source, .. } | IValueError::Argument { source, .. } => {
                    current = &**source;
                }
                _ => return current,
            }
        }
    }

    /// Collection positions from the outermost wrapper inwards.
    pub fn path(&self) -> Vec<(Tag, usize)> {
        let mut path = Vec::new();
        let mut current = self;
        if let IValueError::Argument { source, .. } = current {
            current = &**source;
        }
        while let IValueError::Element { tag, index, source } = current {
            path.push((*tag, *index));
            current = &**source;
        }
        path
    }

    pub fn is_unsupported_shape(&self) -> bool {
        matches!(self.root_cause(), IValueError::UnsupportedShape { .. })
    }

    pub fn is_boundary_failure(&self) -> bool {
        matches!(self.root_cause(), IValueError::BoundaryFailure { .. })
    }
}
