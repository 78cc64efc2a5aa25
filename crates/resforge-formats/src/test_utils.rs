//! Shared assertions for format unit tests

use crate::ResourceFormat;
use std::fmt::Debug;

/// Build `original`, parse the bytes back and compare both the value and a
/// second build of it
pub fn check_round_trip<T>(original: &T) -> Result<(), Box<dyn std::error::Error>>
where
    T: ResourceFormat + PartialEq + Debug,
{
    let data = original.build()?;
    let parsed = T::parse(&data)?;
    if original != &parsed {
        return Err(format!("value changed across build/parse:\n{original:?}\n{parsed:?}").into());
    }
    T::verify_round_trip(&data)
}

/// Parsing `data` must fail
pub fn check_rejected<T: ResourceFormat>(data: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
    match T::parse(data) {
        Ok(_) => Err(format!("{} bytes parsed but should have been rejected", data.len()).into()),
        Err(_) => Ok(()),
    }
}

/// Assert that a value survives build then parse unchanged
#[macro_export]
macro_rules! assert_round_trip {
    ($value:expr) => {
        $crate::test_utils::check_round_trip(&$value).expect("round trip")
    };
}

/// Assert that a byte slice is rejected by the parser of `$type`
#[macro_export]
macro_rules! assert_invalid_data_rejected {
    ($type:ty, $data:expr) => {
        $crate::test_utils::check_rejected::<$type>($data).expect("rejected")
    };
}
