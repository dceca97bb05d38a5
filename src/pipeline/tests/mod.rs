//! Write pipeline tests
