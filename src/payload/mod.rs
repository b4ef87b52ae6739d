//! Decoding of scalar values from reply payloads: the fixed-point number
//! format the controller uses, and the reading definitions that map payload
//! offsets to named physical quantities.

pub mod fixed_point;
pub mod readings;

pub use fixed_point::fixed_point;
pub use readings::ReadingDef;
