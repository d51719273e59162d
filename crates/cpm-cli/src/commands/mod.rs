pub mod clear;
pub mod config;
pub mod demo;
pub mod report;
