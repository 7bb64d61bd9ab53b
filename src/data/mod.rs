//! Data domain: frames, column roles and backend input preparation.

pub mod domain;
pub mod repo_fs;
pub mod service;

pub use domain::{ClassMap, Column, ColumnRoles, DataFrames, Frame, ModelData, ModelInput, Partition};
