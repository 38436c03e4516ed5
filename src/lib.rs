pub mod chord;
pub mod generation;
pub mod graph;
pub mod history;
pub mod instrument;
pub mod note;
pub mod output;
pub mod play;
pub mod progression;
pub mod sequencer;
pub mod transport;
pub mod tuner;
pub mod tuning;
pub mod wave;

// Signal processing building blocks
pub mod envelope;
pub mod filter;
pub mod noise;
pub mod oscillator;

// Utility modules
pub mod util;
