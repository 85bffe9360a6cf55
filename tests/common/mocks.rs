//! Mock strategies used by the property tests, built the same way the
//! library's own test suite mocks external traits: `mockall::mock!` against
//! the trait signature rather than `#[automock]` on the trait itself, since
//! these mocks are consumed from outside the crate.
use mockall::mock;

use parabatch_core::core::record::Record;
use parabatch_core::core::strategy::{Filter, ValidationFailure, Validator};

mock! {
    pub CountingFilter {}
    impl Filter for CountingFilter {
        fn keep(&self, record: &Record) -> bool;
    }
}

mock! {
    pub CountingValidator {}
    impl Validator for CountingValidator {
        fn validate(&self, record: &Record) -> Option<ValidationFailure>;
    }
}
