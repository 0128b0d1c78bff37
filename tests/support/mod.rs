#![allow(dead_code)]

pub mod exporter;
pub mod pointsdesk_env;
