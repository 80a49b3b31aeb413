//! Domain types and pure logic shared by the certificate server.
//!
//! - `model`: the certificate `Record` and the verification result shape.
//! - `codec`: turns a record into a URL-safe token and back.
//! - `resolution`: decides which record, if any, a verification request shows.
//! - `store`: the `RecordStore` seam plus an in-memory implementation.

pub mod codec;
pub mod jobs;
pub mod model;
pub mod requests;
pub mod resolution;
pub mod store;
