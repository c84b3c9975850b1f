//! Data Transfer Objects
//!
//! Request/response bodies exchanged with the socials publishing service.

pub mod post;
