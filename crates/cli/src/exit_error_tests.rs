// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn constructors_carry_the_contracted_codes() {
    let failed = ExitError::failure("run ended in stop_failed");
    assert_eq!(failed.code, EXIT_FAILURE);
    assert_eq!(failed.to_string(), "run ended in stop_failed");

    let usage = ExitError::usage("invalid intensity: extreme");
    assert_eq!(usage.code, EXIT_USAGE);
}

#[test]
fn behaves_as_a_std_error() {
    let err: Box<dyn std::error::Error> = Box::new(ExitError::failure("boom"));
    assert_eq!(err.to_string(), "boom");
}
