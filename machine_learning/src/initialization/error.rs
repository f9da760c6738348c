use std::{
    error::Error,
    fmt::{self, Display},
};

pub type Result<T> = std::result::Result<T, RandErr>;

/// The distribution a `RandParamGen` was asked for can't be sampled from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RandErr {
    /// The bounds of a uniform distribution are not finite or are out of order.
    BadRange { low: f32, high: f32 },
    /// The mean of a normal distribution is not finite, or its deviation is negative or not
    /// finite.
    BadNormal { mean: f32, std_dev: f32 },
    /// A fan scaled distribution was asked for a layer without units on that side.
    NoFan,
}

impl Display for RandErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RandErr::BadRange { low, high } => {
                write!(f, "can't sample uniformly between {low} and {high}")
            }
            RandErr::BadNormal { mean, std_dev } => {
                write!(f, "can't sample from a normal with mean {mean} and deviation {std_dev}")
            }
            RandErr::NoFan => f.write_str("can't scale a distribution by a fan of 0 units"),
        }
    }
}

impl Error for RandErr {}
