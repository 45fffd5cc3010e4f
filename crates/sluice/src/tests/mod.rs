pub mod utils;

mod test_admission;
mod test_engine;
