mod multipart;
mod request;
mod response;
mod validation;

pub use multipart::*;
pub use request::*;
pub use response::*;
pub use validation::*;
