// HTTP routes
pub mod emoji;
pub mod feed;
pub mod health;
pub mod search;
pub mod stream;

pub use emoji::*;
pub use feed::*;
pub use health::*;
pub use search::*;
pub use stream::*;
