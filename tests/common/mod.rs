#![allow(dead_code)]

pub mod fixtures;
pub mod mock_k8s;
