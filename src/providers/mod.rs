pub mod focus;
pub mod sgs;
pub mod util;
