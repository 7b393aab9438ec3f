pub mod parcel;
pub mod payment;
pub mod rider;
pub mod service_center;
pub mod tracking;
pub mod user;
