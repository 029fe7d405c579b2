pub mod demix;
pub mod files;
pub mod format;
pub mod ls;
pub mod mix;
pub mod prompt;
pub mod stat;

pub use demix::*;
pub use files::default_output_dir;
pub use ls::*;
pub use mix::*;
pub use prompt::*;
pub use stat::*;
