//! Runtime-free building blocks of the factory test protocol.
//!
//! - [`identity`]: the 32-byte identity block burned into each device
//! - [`serial`]: serial arithmetic for series-mode provisioning
//! - [`codec`] and [`types`]: JSON wire records
//! - [`topic`]: topic layout and inbound classification

#![warn(clippy::pedantic)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod error;
pub mod error_classification;
pub mod identity;
pub mod serial;
pub mod topic;
pub mod types;

pub use codec::{decode, decode_str, encode, encode_pretty, Parameters, WireRecord};
pub use error::{FactoryError, Result};
pub use error_classification::ErrorScope;
pub use identity::{
    is_valid_hw_version, is_valid_model_id, is_valid_random_id, is_valid_serial, Identity,
    IdentityBlock, IDENTITY_BLOCK_LEN,
};
pub use serial::{increment_serial, SerialSeries, SERIAL_SUFFIX_MAX};
pub use topic::{Inbound, TopicKind, TopicRouter, DEFAULT_ROOT_TOPIC};
pub use types::{Device, TestResult, TestSpecification};
