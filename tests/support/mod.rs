#![allow(dead_code)]

pub mod harmoni_env;
pub mod wav;
