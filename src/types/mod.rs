pub(crate) mod api;
pub mod observation;
pub mod station;
