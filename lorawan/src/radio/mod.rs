/// Radio driver contract and settings types
pub mod traits;

pub use traits::{
    Bandwidth, CodingRate, ModulationParams, Radio, RadioEvent, RxConfig, SpreadingFactor,
    TxConfig,
};
