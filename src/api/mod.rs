pub(crate) mod auth;
pub(crate) mod battery;
pub(crate) mod errors;
pub(crate) mod essay;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod responses;
pub(crate) mod router;
