//! Remote access: a raw GET primitive and the adapter that classifies its
//! responses.

mod adapter;
mod http;

pub use adapter::{normalize, Param, TransportAdapter};
pub use http::{HttpGet, RawResponse, ReqwestHttp};
