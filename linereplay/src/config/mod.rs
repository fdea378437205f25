mod destination;
mod rate;

pub use self::{
    destination::{Destination, DestinationArgs},
    rate::RateArgs,
};
