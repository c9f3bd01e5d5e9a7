pub use ads_core::{AdsError, AdsResult};
