//! Domain types and models

pub mod governorate;
pub mod national_id;

pub use national_id::{validate, Gender, NationalIdDetails};
