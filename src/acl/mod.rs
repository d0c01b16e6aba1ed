//! Access-control rules: allow/deny masks, Locations, and named Policies.

pub mod location;
pub mod mask;
pub mod policy;

pub use location::{
    AuthLevel, AuthType, Encryption, HttpMethod, Location, LocationSet, MethodMask, Order,
    RequiredName, Satisfy,
};
pub use mask::{AuthMask, IpMask, MaskEvaluator, NameMask, NetInterface};
pub use policy::{IppOperation, Policy, PolicySet};
