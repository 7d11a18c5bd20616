pub mod afford;
pub mod config;
pub mod index;
pub mod lookup;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod source;
pub mod states;
