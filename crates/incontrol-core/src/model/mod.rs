// ── Domain model ──
//
// Identity keys, the normalized GPS location and the discovered
// org → group → device tree.

mod hierarchy;
mod key;
mod location;

pub use hierarchy::{Group, Org};
pub use key::DeviceKey;
pub use location::Location;
