//! HTTP request handlers

pub mod health;
pub mod national_id;
pub mod usage;
