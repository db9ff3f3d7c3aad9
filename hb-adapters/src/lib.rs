//! Vehicle client implementations for Hyundai Bridge

pub mod demo;

pub use demo::DemoVehicle;
