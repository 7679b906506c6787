pub mod bluetooth;
pub mod feed;
pub mod logging;
