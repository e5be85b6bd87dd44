//! # Transformation Module
//!
//! Declarative request/response reshaping rules attached to routes.

pub mod transformer;

pub use transformer::{
    transform_request, transform_response, RequestTransformation, ResponseTransformation,
    TransformationConfig,
};
