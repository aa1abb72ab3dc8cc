pub mod acquisition;
pub mod photo;

pub use acquisition::*;
pub use photo::*;
