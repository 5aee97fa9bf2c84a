pub mod client;
pub mod error;
pub mod helpers;
pub mod policy;
pub mod store;

pub use client::S3Store;
pub use error::{IngestError, Result};
pub use policy::{PolicyOptions, SignedPolicy, sign_policy, sign_policy_now};
pub use store::{PutBody, PutRequest, Store};
