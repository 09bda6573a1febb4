pub mod cat;
pub mod copy;
pub mod delete;
pub mod exists;
pub mod init;
pub mod ls;
pub mod mirror;
pub mod version;

pub use cat::Cat;
pub use copy::CopyObject;
pub use delete::Delete;
pub use exists::Exists;
pub use init::Init;
pub use ls::Ls;
pub use mirror::Mirror;
pub use version::Version;
