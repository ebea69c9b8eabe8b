mod port_validator_tests;
mod scheme_tests;
