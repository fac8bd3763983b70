pub mod approval;
pub mod decide_path;
pub mod delay;
pub mod http;
pub mod transform;
pub mod triggers;
