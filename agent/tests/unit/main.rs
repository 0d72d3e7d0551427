//! Integration tests

mod test_drivers;
mod test_parser;
mod test_platform;
mod test_settings;
