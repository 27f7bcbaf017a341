mod addr;
pub use addr::*;

mod response;
pub use response::*;

mod handshake;
pub use handshake::*;
