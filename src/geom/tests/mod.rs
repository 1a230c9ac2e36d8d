mod test_generate_basic;
mod test_smoothing_basic;
