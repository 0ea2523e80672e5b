mod harness;
mod utils;
