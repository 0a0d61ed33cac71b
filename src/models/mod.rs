mod category;
mod media;

pub use category::*;
pub use media::*;
