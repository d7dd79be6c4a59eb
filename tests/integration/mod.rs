mod access_tests;
mod get_rewriting_tests;
