pub mod access;
pub mod response;

pub use access::{access_policy_middleware, area_guard, resolve_caller, Caller};
pub use response::{ApiResponse, ApiResult};
