//! Concrete sensor sources behind [`crate::sensors`].

pub mod lm_sensor;
pub mod sysfs;
