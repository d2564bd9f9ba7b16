mod test_state;
pub(crate) mod utils;
