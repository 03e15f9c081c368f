mod fs;
mod hash;
mod io;

pub(crate) use fs::*;
pub(crate) use hash::*;
pub(crate) use io::*;
